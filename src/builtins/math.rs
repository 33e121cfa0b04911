//! Arithmetic, trigonometry, randomness and colour.
//!
//! Angles are in degrees and the y axis points down, so directions measured
//! counter-clockwise on screen negate the y component.

use super::{int, real, BuiltinFn};
use crate::error::VmResult;
use crate::runtime::Runtime;
use crate::value::Value;
use std::collections::HashMap;

pub fn register(m: &mut HashMap<&'static str, BuiltinFn>) {
    m.insert("random", random);
    m.insert("random_range", random_range);
    m.insert("irandom", irandom);
    m.insert("irandom_range", irandom_range);
    m.insert("choose", choose);
    m.insert("randomize", randomize);
    m.insert("random_set_seed", random_set_seed);

    m.insert("round", |_, a| Ok(Value::Real(round_half_up(real(a, 0)?))));
    m.insert("floor", |_, a| Ok(Value::Real(real(a, 0)?.floor())));
    m.insert("ceil", |_, a| Ok(Value::Real(real(a, 0)?.ceil())));
    m.insert("abs", |_, a| Ok(Value::Real(real(a, 0)?.abs())));
    m.insert("sign", sign);
    m.insert("min", min);
    m.insert("max", max);
    m.insert("clamp", clamp);
    m.insert("sqrt", |_, a| Ok(Value::Real(real(a, 0)?.max(0.0).sqrt())));
    m.insert("power", |_, a| Ok(Value::Real(real(a, 0)?.powf(real(a, 1)?))));
    m.insert("sin", |_, a| Ok(Value::Real(real(a, 0)?.to_radians().sin())));
    m.insert("cos", |_, a| Ok(Value::Real(real(a, 0)?.to_radians().cos())));
    m.insert("degtorad", |_, a| Ok(Value::Real(real(a, 0)?.to_radians())));
    m.insert("radtodeg", |_, a| Ok(Value::Real(real(a, 0)?.to_degrees())));
    m.insert("point_direction", point_direction);
    m.insert("point_distance", point_distance);
    m.insert("lengthdir_x", |_, a| Ok(Value::Real(real(a, 0)? * real(a, 1)?.to_radians().cos())));
    m.insert("lengthdir_y", |_, a| Ok(Value::Real(-real(a, 0)? * real(a, 1)?.to_radians().sin())));
    m.insert("lerp", |_, a| {
        let (from, to, t) = (real(a, 0)?, real(a, 1)?, real(a, 2)?);
        Ok(Value::Real(from + (to - from) * t))
    });

    m.insert("make_color_rgb", make_color_rgb);
    m.insert("make_colour_rgb", make_color_rgb);
    m.insert("merge_color", merge_color);
    m.insert("merge_colour", merge_color);
    m.insert("color_get_red", |_, a| Ok(Value::from(int(a, 0)? & 0xFF)));
    m.insert("color_get_green", |_, a| Ok(Value::from((int(a, 0)? >> 8) & 0xFF)));
    m.insert("color_get_blue", |_, a| Ok(Value::from((int(a, 0)? >> 16) & 0xFF)));
}

/// Halves round towards positive infinity.
pub fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

fn random(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let n = real(args, 0)?;
    Ok(Value::Real(rt.rng.real(n)))
}

fn random_range(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (lo, hi) = (real(args, 0)?, real(args, 1)?);
    Ok(Value::Real(lo + rt.rng.real(hi - lo)))
}

fn irandom(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let n = real(args, 0)?.floor() as i64;
    Ok(Value::Real(rt.rng.int_inclusive(0, n) as f64))
}

fn irandom_range(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let lo = real(args, 0)?.floor() as i64;
    let hi = real(args, 1)?.floor() as i64;
    Ok(Value::Real(rt.rng.int_inclusive(lo, hi) as f64))
}

fn choose(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    if args.is_empty() {
        return Ok(Value::ZERO);
    }
    Ok(args[rt.rng.index(args.len())].clone())
}

fn randomize(rt: &mut Runtime, _args: &[Value]) -> VmResult<Value> {
    let seed = rt.rng.int_inclusive(0, u32::MAX as i64) as u64;
    rt.rng.reseed(seed);
    Ok(Value::from(seed as f64))
}

fn random_set_seed(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    rt.rng.reseed(real(args, 0)? as i64 as u64);
    Ok(Value::ZERO)
}

fn sign(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let v = real(args, 0)?;
    let s = if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(Value::Real(s))
}

fn min(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let first = real(args, 0)?;
    Ok(Value::Real(args.iter().map(Value::to_real).fold(first, f64::min)))
}

fn max(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let first = real(args, 0)?;
    Ok(Value::Real(args.iter().map(Value::to_real).fold(first, f64::max)))
}

fn clamp(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (v, lo, hi) = (real(args, 0)?, real(args, 1)?, real(args, 2)?);
    Ok(Value::Real(v.max(lo).min(hi)))
}

/// Direction from the first point to the second, 0..360 counter-clockwise.
fn point_direction(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let dx = real(args, 2)? - real(args, 0)?;
    let dy = real(args, 3)? - real(args, 1)?;
    Ok(Value::Real(((-dy).atan2(dx).to_degrees() + 360.0) % 360.0))
}

fn point_distance(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let dx = real(args, 2)? - real(args, 0)?;
    let dy = real(args, 3)? - real(args, 1)?;
    Ok(Value::Real(dx.hypot(dy)))
}

/// Colours pack as 0xBBGGRR.
fn make_color_rgb(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let r = int(args, 0)? & 0xFF;
    let g = int(args, 1)? & 0xFF;
    let b = int(args, 2)? & 0xFF;
    Ok(Value::from((b << 16) | (g << 8) | r))
}

fn merge_color(_rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (c1, c2) = (int(args, 0)?, int(args, 1)?);
    let t = real(args, 2)?.clamp(0.0, 1.0);
    let mix = |shift: i32| {
        let a = ((c1 >> shift) & 0xFF) as f64;
        let b = ((c2 >> shift) & 0xFF) as f64;
        ((a + (b - a) * t) as i32) << shift
    };
    Ok(Value::from(mix(0) | mix(8) | mix(16)))
}
