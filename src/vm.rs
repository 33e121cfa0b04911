//! Decoded program state shared by every code invocation.
//!
//! The [`Vm`] owns what does not change while the game runs: each code entry
//! decoded once, the resolved reference table, and name lookups. Mutable
//! world state lives on [`crate::runtime::Runtime`].

use crate::game_data::GameData;
use crate::instruction::{decode, DecodedCode};
use crate::resolver::{resolve_references, ReferenceTable};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Nested script calls allowed before a call fails with
/// [`crate::error::VmError::CallDepthExceeded`].
///
/// Every nested call recurses through the interpreter on the native stack,
/// so this must stay low enough for a 2 MB thread stack in a debug build.
pub const MAX_CALL_DEPTH: usize = 64;

pub struct Vm {
    /// Indexed by code id.
    pub code: Vec<Rc<DecodedCode>>,
    pub references: ReferenceTable,
    scripts: HashMap<String, i32>,
    /// Unknown function names already reported.
    warned_unknown: HashSet<String>,
    pub call_depth: usize,
}

impl Vm {
    /// Decode every code entry and resolve the reference chains.
    pub fn new(game: &GameData) -> Vm {
        let mut decoded: Vec<DecodedCode> = game.code.iter().map(|c| decode(&c.bytecode)).collect();
        let references = resolve_references(game, &mut decoded);

        let instruction_total: usize = decoded.iter().map(|d| d.len()).sum();
        info!(
            "VM initialized: {} code entries decoded ({} instructions)",
            decoded.len(),
            instruction_total
        );

        Vm {
            code: decoded.into_iter().map(Rc::new).collect(),
            references,
            scripts: game
                .scripts
                .iter()
                .map(|s| (s.name.clone(), s.code_id))
                .collect(),
            warned_unknown: HashSet::new(),
            call_depth: 0,
        }
    }

    pub fn code(&self, code_id: i32) -> Option<Rc<DecodedCode>> {
        usize::try_from(code_id)
            .ok()
            .and_then(|i| self.code.get(i))
            .cloned()
    }

    pub fn script_code(&self, name: &str) -> Option<i32> {
        self.scripts.get(name).copied()
    }

    /// Report an unknown function the first time it is called.
    pub fn warn_unknown(&mut self, name: &str, argc: usize) {
        if self.warned_unknown.insert(name.to_string()) {
            warn!("Unknown function '{}' with {} args", name, argc);
        }
    }
}
