//! Instance lifecycle, room changes, collision queries and path control.

use super::{arg, int, real, BuiltinFn};
use crate::error::VmResult;
use crate::motion::{compute_bbox, BBox};
use crate::runtime::Runtime;
use crate::value::Value;
use log::debug;
use std::collections::HashMap;

pub fn register(m: &mut HashMap<&'static str, BuiltinFn>) {
    m.insert("instance_create", instance_create);
    m.insert("instance_destroy", destroy_self);
    m.insert("action_kill_object", destroy_self);
    m.insert("action_move_to", action_move_to);
    m.insert("instance_exists", instance_exists);
    m.insert("instance_number", instance_number);
    m.insert("instance_find", instance_find);

    m.insert("room_goto", |rt, a| {
        rt.goto_room(int(a, 0)?);
        Ok(Value::ZERO)
    });
    m.insert("room_goto_next", |rt, _| {
        rt.goto_room(rt.room_index + 1);
        Ok(Value::ZERO)
    });
    m.insert("room_goto_previous", |rt, _| {
        rt.goto_room(rt.room_index - 1);
        Ok(Value::ZERO)
    });
    m.insert("room_exists", |rt, a| Ok(Value::from(rt.game.room(int(a, 0)?).is_some())));

    m.insert("collision_point", collision_point);
    m.insert("collision_rectangle", collision_rectangle);

    m.insert("path_start", path_start);
    m.insert("path_end", |rt, _| {
        if let Some(id) = rt.current_self {
            rt.path_end(id);
        }
        Ok(Value::ZERO)
    });
}

fn instance_create(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (x, y) = (real(args, 0)?, real(args, 1)?);
    let object = int(args, 2)?;
    let id = rt.spawn_instance(object, x, y);
    debug!("instance_create({}) -> {}", rt.game.object_name(object), id);
    Ok(Value::from(id))
}

fn destroy_self(rt: &mut Runtime, _args: &[Value]) -> VmResult<Value> {
    if let Some(id) = rt.current_self {
        rt.destroy_instance(id);
    }
    Ok(Value::ZERO)
}

fn action_move_to(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (x, y) = (real(args, 0)?, real(args, 1)?);
    if let Some(inst) = rt.current_self.and_then(|id| rt.instances.get_mut(&id)) {
        inst.x = x;
        inst.y = y;
    }
    Ok(Value::ZERO)
}

fn selector_context(rt: &Runtime) -> (i32, i32) {
    let self_id = rt.current_self.unwrap_or(-1);
    (self_id, rt.current_other.unwrap_or(self_id))
}

fn instance_exists(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (self_id, other_id) = selector_context(rt);
    let found = rt.find_instances(int(args, 0)?, self_id, other_id);
    Ok(Value::from(!found.is_empty()))
}

/// Live instances of exactly this object, in creation order.
fn exact_matches(rt: &Runtime, object: i32) -> Vec<i32> {
    rt.instances
        .values()
        .filter(|i| !i.destroyed && i.object_index == object)
        .map(|i| i.id)
        .collect()
}

fn instance_number(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    Ok(Value::from(exact_matches(rt, int(args, 0)?).len() as i32))
}

fn instance_find(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let matches = exact_matches(rt, int(args, 0)?);
    let n = int(args, 1)?;
    let id = usize::try_from(n).ok().and_then(|i| matches.get(i)).copied();
    Ok(id.map_or(Value::NOONE, Value::from))
}

/// First instance matching `object` whose box satisfies `hit`, or noone.
fn first_colliding(rt: &Runtime, object: i32, notme: bool, hit: impl Fn(&BBox) -> bool) -> Value {
    let (self_id, other_id) = selector_context(rt);
    rt.find_instances(object, self_id, other_id)
        .into_iter()
        .filter(|&id| !(notme && Some(id) == rt.current_self))
        .find(|id| {
            rt.instances
                .get(id)
                .and_then(|inst| compute_bbox(&rt.game, inst))
                .is_some_and(|b| hit(&b))
        })
        .map_or(Value::NOONE, Value::from)
}

fn collision_point(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (x, y) = (real(args, 0)?, real(args, 1)?);
    let object = int(args, 2)?;
    let notme = arg(args, 4)?.to_bool();
    Ok(first_colliding(rt, object, notme, |b| b.contains_point(x, y)))
}

fn collision_rectangle(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (x1, y1) = (real(args, 0)?, real(args, 1)?);
    let (x2, y2) = (real(args, 2)?, real(args, 3)?);
    let object = int(args, 4)?;
    let notme = arg(args, 6)?.to_bool();
    Ok(first_colliding(rt, object, notme, |b| b.touches_rect(x1, y1, x2, y2)))
}

/// `path_start(path, speed, endaction, absolute)`
///
/// A relative path is shifted so that its first point lands on the instance.
fn path_start(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let path_index = int(args, 0)?;
    let speed = real(args, 1)?;
    let end_action = int(args, 2)?;
    let absolute = arg(args, 3)?.to_bool();

    let start = rt.game.path(path_index).and_then(|p| p.points.first()).copied();
    let Some(id) = rt.current_self else {
        return Ok(Value::ZERO);
    };
    let (Some(inst), Some(start)) = (rt.instances.get_mut(&id), start) else {
        debug!("path_start: no path {} or no calling instance", path_index);
        return Ok(Value::ZERO);
    };

    inst.path_index = path_index;
    inst.path_speed = speed;
    inst.path_end_action = end_action;
    inst.path_position = 0.0;
    if absolute {
        inst.path_x_offset = 0.0;
        inst.path_y_offset = 0.0;
        inst.x = start.x as f64;
        inst.y = start.y as f64;
    } else {
        inst.path_x_offset = inst.x - start.x as f64;
        inst.path_y_offset = inst.y - start.y as f64;
    }
    Ok(Value::ZERO)
}
