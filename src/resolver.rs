//! Binds variable and function table entries to the instructions that use them.
//!
//! Each table entry names its first occurrence (an absolute file offset) and an
//! occurrence count. Every occurrence carries a 27-bit byte delta to the next
//! one in the word following the instruction. The chain is walked once at
//! startup and kept as plain lists of instruction positions.

use crate::game_data::{CodeEntry, GameData};
use crate::instruction::DecodedCode;
use log::{info, warn};

/// Position of an instruction: (code entry index, instruction index).
pub type CodeLocation = (usize, usize);

/// Resolved occurrence lists, indexed like the VARI and FUNC tables.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    pub variables: Vec<Vec<CodeLocation>>,
    pub functions: Vec<Vec<CodeLocation>>,
}

impl ReferenceTable {
    pub fn resolved_variables(&self) -> usize {
        self.variables.iter().map(|v| v.len()).sum()
    }

    pub fn resolved_functions(&self) -> usize {
        self.functions.iter().map(|f| f.len()).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct CodeRange {
    start: usize,
    end: usize,
    index: usize,
}

/// Sorted bytecode ranges for mapping an absolute address to its code entry.
struct RangeIndex {
    ranges: Vec<CodeRange>,
}

impl RangeIndex {
    fn new(code: &[CodeEntry]) -> Self {
        let mut ranges: Vec<CodeRange> = code
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.bytecode.is_empty())
            .map(|(index, e)| CodeRange {
                start: e.bytecode_offset,
                end: e.bytecode_offset + e.bytecode.len(),
                index,
            })
            .collect();
        ranges.sort_by_key(|r| r.start);
        RangeIndex { ranges }
    }

    fn find(&self, addr: usize) -> Option<CodeRange> {
        let i = self.ranges.partition_point(|r| r.end <= addr);
        self.ranges.get(i).copied().filter(|r| r.start <= addr)
    }
}

#[derive(Clone, Copy)]
enum Target {
    Variable,
    Function,
}

/// Walk one chain, returning the instructions it visits.
fn walk_chain(
    name: &str,
    first: i32,
    count: i32,
    code: &[CodeEntry],
    decoded: &[DecodedCode],
    index: &RangeIndex,
) -> Vec<CodeLocation> {
    let mut found = Vec::new();
    if count <= 0 || first < 0 {
        return found;
    }

    let mut addr = first as usize;
    for n in 0..count {
        let range = match index.find(addr) {
            Some(r) => r,
            None => {
                warn!(
                    "reference chain of '{}' leaves bytecode at {:#x} ({}/{} resolved)",
                    name, addr, n, count
                );
                break;
            }
        };
        let local = addr - range.start;
        let instr = match decoded[range.index].index_of(local) {
            Some(i) => i,
            None => {
                warn!(
                    "reference chain of '{}' lands mid-instruction in {} at {:#x}",
                    name, code[range.index].name, local
                );
                break;
            }
        };
        found.push((range.index, instr));

        if n + 1 < count {
            let bytes = &code[range.index].bytecode;
            match bytes.get(local + 4..local + 8) {
                Some(b) => {
                    let link = u32::from_le_bytes([b[0], b[1], b[2], b[3]]) & 0x07FF_FFFF;
                    addr += link as usize;
                }
                None => {
                    warn!("reference chain of '{}' truncated in {}", name, code[range.index].name);
                    break;
                }
            }
        }
    }
    found
}

fn stamp(decoded: &mut [DecodedCode], locations: &[CodeLocation], target: Target, table_index: usize) {
    for &(entry, instr) in locations {
        let i = &mut decoded[entry].instructions[instr];
        match target {
            Target::Variable => i.variable_index = table_index as i32,
            Target::Function => i.function_index = table_index as i32,
        }
    }
}

/// Resolve every chain in the VARI and FUNC tables and stamp the decoded instructions.
pub fn resolve_references(game: &GameData, decoded: &mut [DecodedCode]) -> ReferenceTable {
    let index = RangeIndex::new(&game.code);
    let mut table = ReferenceTable::default();

    for (i, v) in game.variables.iter().enumerate() {
        let locations = walk_chain(&v.name, v.first_occurrence, v.occurrences, &game.code, decoded, &index);
        stamp(decoded, &locations, Target::Variable, i);
        table.variables.push(locations);
    }
    for (i, f) in game.functions.iter().enumerate() {
        let locations = walk_chain(&f.name, f.first_occurrence, f.occurrences, &game.code, decoded, &index);
        stamp(decoded, &locations, Target::Function, i);
        table.functions.push(locations);
    }

    info!(
        "Resolved {} variable references, {} function references",
        table.resolved_variables(),
        table.resolved_functions()
    );
    table
}
