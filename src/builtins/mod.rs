//! Builtin function library.
//!
//! Builtins are plain functions over the runtime and their argument slice,
//! registered by name in one static table. The interpreter looks a name up
//! here first and falls back to user scripts.

pub mod drawing;
pub mod ds;
pub mod instances;
pub mod math;
pub mod misc;
pub mod strings;

use crate::error::{VmError, VmResult};
use crate::runtime::Runtime;
use crate::value::Value;
use std::collections::HashMap;

pub type BuiltinFn = fn(&mut Runtime, &[Value]) -> VmResult<Value>;

lazy_static! {
    static ref BUILTINS: HashMap<&'static str, BuiltinFn> = {
        let mut m = HashMap::new();
        math::register(&mut m);
        strings::register(&mut m);
        drawing::register(&mut m);
        instances::register(&mut m);
        ds::register(&mut m);
        misc::register(&mut m);
        m
    };
}

pub fn lookup(name: &str) -> Option<BuiltinFn> {
    BUILTINS.get(name).copied()
}

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains_key(name)
}

/// Argument `index`, or a fault naming how many were given.
pub fn arg(args: &[Value], index: usize) -> VmResult<&Value> {
    args.get(index).ok_or(VmError::MissingArgument {
        index,
        given: args.len(),
    })
}

pub(crate) fn real(args: &[Value], index: usize) -> VmResult<f64> {
    arg(args, index).map(Value::to_real)
}

pub(crate) fn int(args: &[Value], index: usize) -> VmResult<i32> {
    arg(args, index).map(Value::to_int)
}

/// Optional trailing argument with a default.
pub(crate) fn real_or(args: &[Value], index: usize, default: f64) -> f64 {
    args.get(index).map_or(default, Value::to_real)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_registry_covers_each_family() {
        for name in [
            "random",
            "string_copy",
            "draw_sprite",
            "instance_create",
            "ds_map_create",
            "show_debug_message",
        ] {
            assert!(is_builtin(name), "{} not registered", name);
        }
        assert!(lookup("scr_not_a_builtin").is_none());
    }

    #[test]
    fn test_missing_argument() {
        let args = [Value::ONE];
        assert_eq!(real(&args, 0), Ok(1.0));
        assert_eq!(
            arg(&args, 2),
            Err(VmError::MissingArgument { index: 2, given: 1 })
        );
        assert_eq!(real_or(&args, 3, 7.0), 7.0);
    }
}
