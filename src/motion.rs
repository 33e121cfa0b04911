//! Collision boxes, path following, physics integration and animation.

use crate::events::{event, other_event};
use crate::game_data::{GameData, PathData, PathPoint};
use crate::instance::Instance;
use crate::runtime::Runtime;
use std::rc::Rc;

/// Axis-aligned box in room coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl BBox {
    /// Strict overlap: boxes that only share an edge do not collide.
    pub fn overlaps(&self, other: &BBox) -> bool {
        self.left < other.right && self.right > other.left && self.top < other.bottom && self.bottom > other.top
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// Inclusive overlap with a rectangle given in any corner order.
    pub fn touches_rect(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (top, bottom) = (y1.min(y2), y1.max(y2));
        self.left <= right && self.right >= left && self.top <= bottom && self.bottom >= top
    }
}

/// Box from the mask sprite (or the visual sprite) margins, origin and scale.
pub fn compute_bbox(game: &GameData, inst: &Instance) -> Option<BBox> {
    let index = if inst.mask_index >= 0 {
        inst.mask_index
    } else {
        inst.sprite_index
    };
    let s = game.sprite(index)?;
    let x1 = inst.x + (s.margin_left - s.origin_x) as f64 * inst.image_xscale;
    let x2 = inst.x + (s.margin_right - s.origin_x) as f64 * inst.image_xscale;
    let y1 = inst.y + (s.margin_top - s.origin_y) as f64 * inst.image_yscale;
    let y2 = inst.y + (s.margin_bottom - s.origin_y) as f64 * inst.image_yscale;
    Some(BBox {
        left: x1.min(x2),
        right: x1.max(x2),
        top: y1.min(y2),
        bottom: y1.max(y2),
    })
}

fn segments(path: &PathData) -> impl Iterator<Item = (PathPoint, PathPoint)> + '_ {
    let pts = &path.points;
    let count = match pts.len() {
        0 | 1 => 0,
        n if path.closed => n,
        n => n - 1,
    };
    (0..count).map(move |i| (pts[i], pts[(i + 1) % pts.len()]))
}

fn segment_length(a: PathPoint, b: PathPoint) -> f64 {
    ((b.x - a.x) as f64).hypot((b.y - a.y) as f64)
}

/// Total length, including the closing segment of a closed path.
pub fn path_length(path: &PathData) -> f64 {
    segments(path).map(|(a, b)| segment_length(a, b)).sum()
}

/// Point at `position` (0..1, clamped) along the path, by distance.
pub fn path_point(path: &PathData, position: f64) -> Option<(f64, f64)> {
    let first = path.points.first()?;
    let total = path_length(path);
    if total == 0.0 {
        return Some((first.x as f64, first.y as f64));
    }

    let target = position.clamp(0.0, 1.0) * total;
    let mut travelled = 0.0;
    let count = segments(path).count();
    for (i, (a, b)) in segments(path).enumerate() {
        let len = segment_length(a, b);
        if travelled + len >= target || i == count - 1 {
            let t = if len > 0.0 { (target - travelled) / len } else { 0.0 };
            return Some((
                a.x as f64 + (b.x - a.x) as f64 * t,
                a.y as f64 + (b.y - a.y) as f64 * t,
            ));
        }
        travelled += len;
    }
    path.points.last().map(|p| (p.x as f64, p.y as f64))
}

fn place_on_path(inst: &mut Instance, path: &PathData, position: f64) {
    if let Some((x, y)) = path_point(path, position) {
        inst.x = x + inst.path_x_offset;
        inst.y = y + inst.path_y_offset;
    }
}

/// Detach an instance from its path.
pub fn stop_path(inst: &mut Instance) {
    inst.path_index = -1;
    inst.path_position = 0.0;
    inst.path_speed = 0.0;
}

/// Move one frame along the path and apply the end action at either end.
///
/// Restart wraps around, reverse bounces and flips the speed. Stop and
/// continue both park the instance on the end point and leave the path.
pub fn advance_path(inst: &mut Instance, path: &PathData) {
    let length = path_length(path);
    if length <= 0.0 {
        return;
    }
    inst.path_position += inst.path_speed / length;

    let pos = inst.path_position;
    if pos >= 1.0 || pos <= 0.0 {
        let at_end = pos >= 1.0;
        match inst.path_end_action {
            1 => inst.path_position = if at_end { pos - 1.0 } else { pos + 1.0 },
            3 => {
                inst.path_position = if at_end { 1.0 - (pos - 1.0) } else { -pos };
                inst.path_speed = -inst.path_speed;
            }
            _ => {
                let end = if at_end { 1.0 } else { 0.0 };
                place_on_path(inst, path, end);
                stop_path(inst);
                return;
            }
        }
    }
    place_on_path(inst, path, inst.path_position);
}

/// Gravity, then friction, then velocity.
pub fn apply_motion(inst: &mut Instance) {
    if inst.gravity != 0.0 {
        let rad = inst.gravity_direction.to_radians();
        inst.hspeed += inst.gravity * rad.cos();
        inst.vspeed -= inst.gravity * rad.sin();
        inst.sync_polar();
    }
    if inst.friction != 0.0 && inst.speed != 0.0 {
        let slowed = inst.speed - inst.friction;
        if slowed <= 0.0 {
            inst.speed = 0.0;
            inst.hspeed = 0.0;
            inst.vspeed = 0.0;
        } else {
            inst.speed = slowed;
            inst.sync_cartesian();
        }
    }
    inst.x += inst.hspeed;
    inst.y += inst.vspeed;
}

impl Runtime {
    pub fn path_end(&mut self, id: i32) {
        if let Some(inst) = self.instances.get_mut(&id) {
            stop_path(inst);
        }
    }

    pub(crate) fn advance_paths(&mut self) {
        let game = Rc::clone(&self.game);
        for inst in self.instances.values_mut().filter(|i| !i.destroyed) {
            if let Some(path) = game.path(inst.path_index) {
                advance_path(inst, path);
            }
        }
    }

    pub(crate) fn apply_physics(&mut self) {
        for inst in self.instances.values_mut().filter(|i| !i.destroyed) {
            apply_motion(inst);
        }
    }

    /// Fire the outside-room event once when an instance fully leaves the room.
    pub(crate) fn check_outside_room(&mut self) {
        let (width, height) = self
            .room()
            .map(|r| (r.width as f64, r.height as f64))
            .unwrap_or((0.0, 0.0));

        for id in self.live_ids() {
            let Some(inst) = self.instances.get(&id).filter(|i| !i.destroyed) else {
                continue;
            };
            let outside = match compute_bbox(&self.game, inst) {
                Some(b) => b.right < 0.0 || b.left > width || b.bottom < 0.0 || b.top > height,
                None => inst.x < 0.0 || inst.x > width || inst.y < 0.0 || inst.y > height,
            };
            let was_outside = inst.outside_room;
            if let Some(inst) = self.instances.get_mut(&id) {
                inst.outside_room = outside;
            }
            if outside && !was_outside {
                self.fire_event(id, event::OTHER, other_event::OUTSIDE_ROOM, None);
            }
        }
    }

    pub(crate) fn advance_animation(&mut self) {
        for id in self.live_ids() {
            let Some(inst) = self.instances.get_mut(&id).filter(|i| !i.destroyed) else {
                continue;
            };
            let frames = self.game.sprite(inst.sprite_index).map_or(0, |s| s.frames.len());
            if frames <= 1 {
                continue;
            }
            inst.image_index += inst.image_speed;
            if inst.image_index >= frames as f64 {
                inst.image_index -= frames as f64;
                self.fire_event(id, event::OTHER, other_event::ANIMATION_END, None);
            }
        }
    }
}
