//! Keyboard state fed by the host, plus optional TOML recording and playback.
//!
//! A recording is a list of frames with the keys held during each:
//!
//! ```toml
//! [[frames]]
//! frame = 3
//! keys = [39, 90]
//! ```
//!
//! Frames with nothing held are omitted.

use crate::error::{ConfigError, ConfigResult};
use indexmap::IndexSet;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const VK_NOKEY: i32 = 0;
pub const VK_ANYKEY: i32 = 1;

#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub held: IndexSet<i32>,
    pub pressed: IndexSet<i32>,
    pub released: IndexSet<i32>,
    /// Most recent key still held, or 0.
    pub current_key: i32,
    pub last_key: i32,
    pub mouse_x: f64,
    pub mouse_y: f64,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key_down(&mut self, key: i32) {
        if !self.held.contains(&key) {
            self.pressed.insert(key);
        }
        self.held.insert(key);
        self.current_key = key;
        self.last_key = key;
    }

    pub fn on_key_up(&mut self, key: i32) {
        if self.held.shift_remove(&key) {
            self.released.insert(key);
        }
        self.current_key = self.held.last().copied().unwrap_or(VK_NOKEY);
    }

    /// Forget the edges of the frame just simulated.
    pub fn clear_per_frame_input(&mut self) {
        self.pressed.clear();
        self.released.clear();
    }

    /// Drop all key state, as `keyboard_clear` does for one key.
    pub fn clear_key(&mut self, key: i32) {
        self.held.shift_remove(&key);
        self.pressed.shift_remove(&key);
        self.released.shift_remove(&key);
        self.current_key = self.held.last().copied().unwrap_or(VK_NOKEY);
    }

    fn check(set: &IndexSet<i32>, key: i32) -> bool {
        match key {
            VK_NOKEY => set.is_empty(),
            VK_ANYKEY => !set.is_empty(),
            k => set.contains(&k),
        }
    }

    pub fn is_held(&self, key: i32) -> bool {
        Self::check(&self.held, key)
    }

    pub fn is_pressed(&self, key: i32) -> bool {
        Self::check(&self.pressed, key)
    }

    pub fn is_released(&self, key: i32) -> bool {
        Self::check(&self.released, key)
    }

    /// Replace the held set with `keys`, deriving edges from the previous frame.
    pub fn apply_held(&mut self, keys: &[i32]) {
        let next: IndexSet<i32> = keys.iter().copied().collect();
        self.pressed = next.difference(&self.held).copied().collect();
        self.released = self.held.difference(&next).copied().collect();
        if let Some(&k) = self.pressed.last() {
            self.last_key = k;
        }
        self.current_key = next.last().copied().unwrap_or(VK_NOKEY);
        self.held = next;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub frame: u64,
    pub keys: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRecording {
    #[serde(default)]
    pub frames: Vec<RecordedFrame>,
}

impl InputRecording {
    pub fn record(&mut self, frame: u64, state: &InputState) {
        if !state.held.is_empty() {
            self.frames.push(RecordedFrame {
                frame,
                keys: state.held.iter().copied().collect(),
            });
        }
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_toml(text: &str, origin: &str) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let recording = Self::from_toml(&text, &path.display().to_string())?;
        info!("Loaded {} recorded input frames from {}", recording.frames.len(), path.display());
        Ok(recording)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let text = self.to_toml()?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("Wrote {} input frames to {}", self.frames.len(), path.display());
        Ok(())
    }
}

/// Frame-indexed view of a recording.
#[derive(Debug, Clone, Default)]
pub struct Playback {
    frames: HashMap<u64, Vec<i32>>,
}

impl Playback {
    pub fn new(recording: InputRecording) -> Self {
        Playback {
            frames: recording.frames.into_iter().map(|f| (f.frame, f.keys)).collect(),
        }
    }

    pub fn apply(&self, frame: u64, state: &mut InputState) {
        let keys = self.frames.get(&frame).map(|k| k.as_slice()).unwrap_or(&[]);
        state.apply_held(keys);
        if !state.pressed.is_empty() {
            debug!("playback frame {}: pressed {:?}", frame, state.pressed);
        }
    }
}
