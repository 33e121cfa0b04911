//! String builtins. Positions are 1-based and counted in characters.

use super::{arg, int, BuiltinFn};
use crate::error::VmResult;
use crate::runtime::Runtime;
use crate::value::Value;
use std::collections::HashMap;

pub fn register(m: &mut HashMap<&'static str, BuiltinFn>) {
    m.insert("string", |_, a| Ok(Value::Str(text(a, 0)?)));
    m.insert("real", |_, a| Ok(Value::Real(arg(a, 0)?.to_real())));
    m.insert("string_length", |_, a| Ok(Value::from(text(a, 0)?.chars().count() as i32)));
    m.insert("string_char_at", string_char_at);
    m.insert("string_copy", string_copy);
    m.insert("string_pos", string_pos);
    m.insert("string_delete", string_delete);
    m.insert("string_lower", |_, a| Ok(Value::Str(text(a, 0)?.to_lowercase())));
    m.insert("string_upper", |_, a| Ok(Value::Str(text(a, 0)?.to_uppercase())));
    m.insert("string_replace", |_, a| {
        Ok(Value::Str(text(a, 0)?.replacen(&text(a, 1)?, &text(a, 2)?, 1)))
    });
    m.insert("string_replace_all", string_replace_all);
    m.insert("string_count", string_count);
    m.insert("string_hash_to_newline", |_, a| Ok(Value::Str(text(a, 0)?.replace('#', "\n"))));
    m.insert("string_width", string_width);
    m.insert("string_height", string_height);
    m.insert("chr", chr);
    m.insert("ansi_char", chr);
    m.insert("ord", |_, a| Ok(Value::from(text(a, 0)?.chars().next().map_or(0, |c| c as i32))));
}

fn text(args: &[Value], index: usize) -> VmResult<String> {
    arg(args, index).map(Value::to_str)
}

/// Character range starting at 1-based `pos`, clamped to the string.
fn char_span(s: &str, pos: i32, len: i32) -> (usize, usize) {
    let count = s.chars().count();
    let start = ((pos - 1).max(0) as usize).min(count);
    let end = start.saturating_add(len.max(0) as usize).min(count);
    (start, end)
}

fn string_char_at(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let s = text(args, 0)?;
    let pos = int(args, 1)?;
    let c = usize::try_from(pos - 1).ok().and_then(|i| s.chars().nth(i));
    Ok(Value::Str(c.map(String::from).unwrap_or_default()))
}

fn string_copy(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let s = text(args, 0)?;
    let (start, end) = char_span(&s, int(args, 1)?, int(args, 2)?);
    Ok(Value::Str(s.chars().skip(start).take(end - start).collect()))
}

fn string_delete(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let s = text(args, 0)?;
    let (start, end) = char_span(&s, int(args, 1)?, int(args, 2)?);
    let kept = s
        .chars()
        .enumerate()
        .filter(|(i, _)| *i < start || *i >= end)
        .map(|(_, c)| c)
        .collect();
    Ok(Value::Str(kept))
}

/// 1-based position of the needle (first argument) in the haystack, 0 if absent.
fn string_pos(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let needle = text(args, 0)?;
    let haystack = text(args, 1)?;
    let pos = haystack
        .find(&needle)
        .map_or(0, |byte| haystack[..byte].chars().count() as i32 + 1);
    Ok(Value::from(pos))
}

fn string_replace_all(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let s = text(args, 0)?;
    let from = text(args, 1)?;
    if from.is_empty() {
        return Ok(Value::Str(s));
    }
    Ok(Value::Str(s.replace(&from, &text(args, 2)?)))
}

/// Non-overlapping occurrences of the first argument in the second.
fn string_count(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let needle = text(args, 0)?;
    let haystack = text(args, 1)?;
    if needle.is_empty() {
        return Ok(Value::ZERO);
    }
    Ok(Value::from(haystack.matches(needle.as_str()).count() as i32))
}

fn string_width(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let s = text(args, 0)?;
    Ok(Value::Real(rt.renderer.measure_string(&s, rt.draw_state.font).0))
}

fn string_height(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let s = text(args, 0)?;
    Ok(Value::Real(rt.renderer.measure_string(&s, rt.draw_state.font).1))
}

fn chr(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let code = u32::try_from(int(args, 0)?).ok().and_then(char::from_u32);
    Ok(Value::Str(code.map(String::from).unwrap_or_default()))
}
