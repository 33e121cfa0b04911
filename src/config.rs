//! Runtime configuration loaded from an optional TOML file.
//!
//! ```toml
//! start_room = "room_title"
//! max_instructions = 10000000
//! rng_seed = 42
//! frames = 120
//!
//! [trace]
//! calls = ["obj_player"]
//! events = ["*"]
//! instructions = ["gml_Script_scr_init"]
//! ignore_calls = ["draw_sprite"]
//!
//! [input]
//! playback = "inputs.toml"
//! ```

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_INSTRUCTIONS: u64 = 10_000_000;
pub const DEFAULT_FRAMES: u32 = 60;

/// Name lists that switch on targeted debug output. `"*"` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Objects whose builtin and script calls are logged
    pub calls: Vec<String>,
    /// Objects whose fired events are logged
    pub events: Vec<String>,
    /// Code entries traced instruction by instruction
    pub instructions: Vec<String>,
    /// Function names never logged by call tracing
    pub ignore_calls: Vec<String>,
}

impl TraceConfig {
    fn matches(list: &[String], name: &str) -> bool {
        list.iter().any(|n| n == "*" || n == name)
    }

    pub fn traces_calls(&self, object: &str, function: &str) -> bool {
        Self::matches(&self.calls, object) && !self.ignore_calls.iter().any(|n| n == function)
    }

    pub fn traces_events(&self, object: &str) -> bool {
        Self::matches(&self.events, object)
    }

    pub fn traces_instructions(&self, code_name: &str) -> bool {
        Self::matches(&self.instructions, code_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Write held keys per frame to this file on exit
    pub record: Option<PathBuf>,
    /// Drive input from a previous recording
    pub playback: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Room name or index entered at startup instead of the first in room order
    pub start_room: Option<String>,
    /// Per-call instruction fuse
    pub max_instructions: u64,
    pub rng_seed: Option<u64>,
    /// Frames run by the headless CLI
    pub frames: u32,
    pub trace: TraceConfig,
    pub input: InputConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            start_room: None,
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
            rng_seed: None,
            frames: DEFAULT_FRAMES,
            trace: TraceConfig::default(),
            input: InputConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml(text: &str, origin: &str) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }
}
