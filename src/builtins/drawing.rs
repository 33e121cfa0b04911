//! Immediate-mode drawing through the renderer, and the draw state setters.

use super::{arg, int, real, BuiltinFn};
use crate::error::VmResult;
use crate::renderer::SpriteStyle;
use crate::runtime::Runtime;
use crate::value::Value;
use std::collections::HashMap;

pub fn register(m: &mut HashMap<&'static str, BuiltinFn>) {
    m.insert("draw_sprite", draw_sprite);
    m.insert("draw_sprite_ext", draw_sprite_ext);
    m.insert("draw_text", draw_text);
    m.insert("draw_text_ext", draw_text);
    m.insert("draw_text_transformed", draw_text);
    m.insert("draw_rectangle", draw_rectangle);
    m.insert("draw_background", draw_background);
    m.insert("draw_background_ext", draw_background);

    m.insert("draw_set_color", |rt, a| {
        rt.draw_state.color = int(a, 0)?;
        Ok(Value::ZERO)
    });
    m.insert("draw_set_colour", |rt, a| {
        rt.draw_state.color = int(a, 0)?;
        Ok(Value::ZERO)
    });
    m.insert("draw_get_color", |rt, _| Ok(Value::from(rt.draw_state.color)));
    m.insert("draw_set_alpha", |rt, a| {
        rt.draw_state.alpha = real(a, 0)?;
        Ok(Value::ZERO)
    });
    m.insert("draw_get_alpha", |rt, _| Ok(Value::Real(rt.draw_state.alpha)));
    m.insert("draw_set_font", |rt, a| {
        rt.draw_state.font = int(a, 0)?;
        Ok(Value::ZERO)
    });
    m.insert("draw_set_halign", |rt, a| {
        rt.draw_state.halign = int(a, 0)?;
        Ok(Value::ZERO)
    });
    m.insert("draw_set_valign", |rt, a| {
        rt.draw_state.valign = int(a, 0)?;
        Ok(Value::ZERO)
    });
    m.insert("draw_set_blend_mode", |_, _| Ok(Value::ZERO));
    m.insert("draw_set_blend_mode_ext", |_, _| Ok(Value::ZERO));
}

/// A negative frame means the calling instance's current frame.
fn frame_for(rt: &Runtime, frame: i32) -> i32 {
    if frame >= 0 {
        return frame;
    }
    rt.current_self
        .and_then(|id| rt.instance(id))
        .map_or(0, |i| i.image_index as i32)
}

fn draw_sprite(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let sprite = int(args, 0)?;
    let frame = frame_for(rt, int(args, 1)?);
    let (x, y) = (real(args, 2)?, real(args, 3)?);
    rt.renderer.draw_sprite(sprite, frame, x, y, SpriteStyle::default());
    Ok(Value::ZERO)
}

fn draw_sprite_ext(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let sprite = int(args, 0)?;
    let frame = frame_for(rt, int(args, 1)?);
    let (x, y) = (real(args, 2)?, real(args, 3)?);
    let style = SpriteStyle {
        xscale: real(args, 4)?,
        yscale: real(args, 5)?,
        angle: real(args, 6)?,
        blend: int(args, 7)?,
        alpha: real(args, 8)?,
    };
    rt.renderer.draw_sprite(sprite, frame, x, y, style);
    Ok(Value::ZERO)
}

/// Shared by the `draw_text*` family; separation, width and transforms are not applied.
fn draw_text(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (x, y) = (real(args, 0)?, real(args, 1)?);
    let text = arg(args, 2)?.to_str().replace('#', "\n");
    let state = rt.draw_state;
    rt.renderer.draw_text(x, y, &text, &state);
    Ok(Value::ZERO)
}

fn draw_rectangle(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (x1, y1) = (real(args, 0)?, real(args, 1)?);
    let (x2, y2) = (real(args, 2)?, real(args, 3)?);
    let outline = arg(args, 4)?.to_bool();
    let state = rt.draw_state;
    rt.renderer.draw_rectangle(x1, y1, x2, y2, outline, &state);
    Ok(Value::ZERO)
}

fn draw_background(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let background = int(args, 0)?;
    let (x, y) = (real(args, 1)?, real(args, 2)?);
    let exists = usize::try_from(background)
        .ok()
        .is_some_and(|i| i < rt.game.backgrounds.len());
    if exists {
        rt.renderer.draw_background(background, x, y, false, false);
    }
    Ok(Value::ZERO)
}
