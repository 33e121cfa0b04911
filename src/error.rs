//! Error types for loading, configuring and running a game archive.
//!
//! Loading failures are fatal and surface as [`FormatError`]. Faults raised while
//! interpreting one code entry surface as [`VmError`] and only abort that entry.

use thiserror::Error;

pub type FormResult<T> = Result<T, FormatError>;
pub type VmResult<T> = Result<T, VmError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("I/O error reading archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid magic: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: String, found: String },

    #[error("unexpected end of data at offset {offset:#x} (need {need} bytes, file is {len} bytes)")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        len: usize,
    },

    #[error("required chunk {0} not found")]
    MissingChunk(&'static str),

    #[error("string at offset {offset:#x} is not valid UTF-8")]
    InvalidString { offset: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    #[error("argument {index} missing ({given} given)")]
    MissingArgument { index: usize, given: usize },

    #[error("code entry {0} does not exist")]
    InvalidCodeEntry(i32),

    #[error("call depth exceeded {0} nested calls")]
    CallDepthExceeded(usize),

    #[error("instance {0} does not exist")]
    NoSuchInstance(i32),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("cannot serialize input recording: {0}")]
    Serialize(#[from] toml::ser::Error),
}
