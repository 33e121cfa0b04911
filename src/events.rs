//! Event lookup along the parent chain, dispatch, alarms and collisions.
//!
//! An object inherits every event it does not define itself. Firing an event
//! walks from the instance's object towards the root and runs the actions of
//! the first object that defines the (type, subtype) pair, and nothing else.
//! `event_inherited` resumes that walk one level above the object whose code
//! is currently running.

use crate::instance::ALARM_COUNT;
use crate::motion::compute_bbox;
use crate::runtime::{Runtime, MAX_PARENT_DEPTH};
use log::debug;
use std::rc::Rc;

/// Event types, the first index of an object's event table.
pub mod event {
    pub const CREATE: usize = 0;
    pub const DESTROY: usize = 1;
    pub const ALARM: usize = 2;
    pub const STEP: usize = 3;
    pub const COLLISION: usize = 4;
    pub const KEYBOARD: usize = 5;
    pub const MOUSE: usize = 6;
    pub const OTHER: usize = 7;
    pub const DRAW: usize = 8;
    pub const KEYPRESS: usize = 9;
    pub const KEYRELEASE: usize = 10;
}

pub mod step_event {
    pub const NORMAL: i32 = 0;
    pub const BEGIN: i32 = 1;
    pub const END: i32 = 2;
}

/// Subtypes of [`event::OTHER`].
pub mod other_event {
    pub const OUTSIDE_ROOM: i32 = 0;
    pub const GAME_START: i32 = 2;
    pub const GAME_END: i32 = 3;
    pub const ROOM_START: i32 = 4;
    pub const ROOM_END: i32 = 5;
    pub const ANIMATION_END: i32 = 7;
}

/// The event whose code is running, and the object in the chain that defined it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventContext {
    pub event_type: usize,
    pub subtype: i32,
    pub object_index: i32,
}

impl Runtime {
    /// Run the nearest definition of an event for one instance.
    pub fn fire_event(&mut self, id: i32, event_type: usize, subtype: i32, other: Option<i32>) {
        let Some(object) = self.instances.get(&id).map(|i| i.object_index) else {
            return;
        };
        let trace = &self.config.trace;
        if !trace.events.is_empty() && trace.traces_events(self.game.object_name(object)) {
            debug!(
                "event ({}, {}) on {} ({}) other={:?} frame={}",
                event_type,
                subtype,
                self.game.object_name(object),
                id,
                other,
                self.frame_count
            );
        }
        self.run_event_from(id, object, event_type, subtype, other);
    }

    /// Run the parent's definition of the event currently executing.
    pub fn fire_event_inherited(&mut self, id: i32, other: Option<i32>) {
        let Some(ctx) = self.event_context else {
            return;
        };
        let Some(parent) = self.game.object(ctx.object_index).map(|o| o.parent) else {
            return;
        };
        self.run_event_from(id, parent, ctx.event_type, ctx.subtype, other);
    }

    /// Walk up from `start` and run the first matching event. Returns whether one ran.
    fn run_event_from(&mut self, id: i32, start: i32, event_type: usize, subtype: i32, other: Option<i32>) -> bool {
        let game = Rc::clone(&self.game);
        let mut object = start;
        for _ in 0..MAX_PARENT_DEPTH {
            let Some(def) = game.object(object) else {
                return false;
            };
            if let Some(entry) = def.find_event(event_type, subtype) {
                let prev = self.event_context.replace(EventContext {
                    event_type,
                    subtype,
                    object_index: object,
                });
                for action in entry.actions.iter().filter(|a| a.code_id >= 0) {
                    self.execute(action.code_id, id, other);
                }
                self.event_context = prev;
                return true;
            }
            object = def.parent;
        }
        false
    }

    /// Fire an event on every instance alive when dispatch starts.
    pub fn dispatch_event(&mut self, event_type: usize, subtype: i32) {
        for id in self.live_ids() {
            if self.is_live(id) {
                self.fire_event(id, event_type, subtype, None);
            }
        }
    }

    /// Count down every active alarm; one reaching zero fires and goes inactive.
    pub(crate) fn run_alarms(&mut self) {
        for id in self.live_ids() {
            for slot in 0..ALARM_COUNT {
                let expired = match self.instances.get_mut(&id) {
                    Some(inst) if !inst.destroyed && inst.alarms[slot] >= 0 => {
                        inst.alarms[slot] -= 1;
                        if inst.alarms[slot] == 0 {
                            inst.alarms[slot] = -1;
                            true
                        } else {
                            false
                        }
                    }
                    _ => false,
                };
                if expired {
                    debug!("alarm[{}] fires for {} at frame {}", slot, id, self.frame_count);
                    self.fire_event(id, event::ALARM, slot as i32, None);
                }
            }
        }
    }

    /// Distinct collision targets declared anywhere in an object's chain, nearest first.
    pub fn collision_targets(&self, object: i32) -> Vec<i32> {
        let mut targets = Vec::new();
        let mut current = object;
        for _ in 0..MAX_PARENT_DEPTH {
            let Some(def) = self.game.object(current) else {
                break;
            };
            if let Some(list) = def.events.get(event::COLLISION) {
                for entry in list {
                    if !targets.contains(&entry.subtype) {
                        targets.push(entry.subtype);
                    }
                }
            }
            current = def.parent;
        }
        targets
    }

    /// Fire at most one collision event per (instance, target object) this frame.
    pub(crate) fn dispatch_collisions(&mut self) {
        let snapshot = self.live_ids();
        for &id in &snapshot {
            let Some(inst) = self.instances.get(&id).filter(|i| !i.destroyed) else {
                continue;
            };
            let Some(bbox) = compute_bbox(&self.game, inst) else {
                continue;
            };
            let targets = self.collision_targets(inst.object_index);

            for target in targets {
                if !self.is_live(id) {
                    break;
                }
                let hit = snapshot.iter().copied().find(|&other| {
                    other != id
                        && self.instances.get(&other).is_some_and(|o| {
                            !o.destroyed
                                && (o.object_index == target || self.is_child_of(o.object_index, target))
                                && compute_bbox(&self.game, o).is_some_and(|b| bbox.overlaps(&b))
                        })
                });
                if let Some(other) = hit {
                    self.fire_event(id, event::COLLISION, target, Some(other));
                }
            }
        }
    }
}
