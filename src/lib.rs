#![crate_name = "gmlrun"]
#![allow(dead_code)]

#[macro_use]
extern crate lazy_static;

pub mod error;
pub mod config;
pub mod value;
pub mod form;
pub mod form_assets;
pub mod form_code;
pub mod form_world;
pub mod game_data;
pub mod instruction;
pub mod assembler;
pub mod resolver;
pub mod vm;
pub mod interpreter;
pub mod opcodes_flow;
pub mod opcodes_math;
pub mod opcodes_variable;
pub mod instance;
pub mod runtime;
pub mod events;
pub mod motion;
pub mod input;
pub mod renderer;
pub mod rng;
pub mod builtins;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod runtime_tests;
