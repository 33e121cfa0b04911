//! World state and the frame loop.
//!
//! [`Runtime`] owns everything that changes while a game runs: live
//! instances, global variables, the current room and its view copies, input,
//! and the renderer. The interpreter, event dispatch, motion and builtins are
//! all `impl Runtime` blocks in their own modules and receive it by `&mut`.
//!
//! Executed code may create or destroy instances at any point, so every pass
//! over the instance table iterates a snapshot of ids and re-checks liveness
//! before touching each one.

use crate::builtins::ds::DsStore;
use crate::config::RuntimeConfig;
use crate::error::ConfigResult;
use crate::events::{event, other_event, step_event, EventContext};
use crate::game_data::{GameData, Room, RoomView};
use crate::input::{InputRecording, InputState, Playback};
use crate::instance::{Instance, FIRST_INSTANCE_ID};
use crate::instruction::instance_type;
use crate::motion::compute_bbox;
use crate::renderer::{DrawState, Renderer, SpriteStyle, ViewRect};
use crate::rng::GameRng;
use crate::value::Value;
use crate::vm::Vm;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

/// Longest parent chain walked before giving up; also breaks cycles.
pub const MAX_PARENT_DEPTH: usize = 32;

const DEFAULT_ROOM_SPEED: i32 = 30;
const DEFAULT_VIEW_WIDTH: i32 = 640;
const DEFAULT_VIEW_HEIGHT: i32 = 480;

pub struct Runtime {
    pub game: Rc<GameData>,
    pub vm: Vm,
    pub config: RuntimeConfig,

    /// Live and destroyed-but-not-purged instances, in creation order
    pub instances: IndexMap<i32, Instance>,
    pub globals: HashMap<String, Value>,

    pub room_index: i32,
    /// Mutable copy of the current room's views
    pub views: Vec<RoomView>,
    pub pending_room: Option<i32>,
    pub next_instance_id: i32,
    /// Per-room persistence flags, writable through `room_persistent`
    pub room_persistent: Vec<bool>,
    pub current_view: i32,

    pub input: InputState,
    pub recording: Option<InputRecording>,
    pub playback: Option<Playback>,

    pub frame_count: u64,
    pub game_started: bool,
    pub should_quit: bool,
    pub event_context: Option<EventContext>,
    /// Instances a builtin is being called for
    pub current_self: Option<i32>,
    pub current_other: Option<i32>,

    pub renderer: Box<dyn Renderer>,
    pub draw_state: DrawState,
    pub ds: DsStore,
    pub rng: GameRng,
    started: Instant,
}

impl Runtime {
    pub fn new(game: GameData, config: RuntimeConfig, renderer: Box<dyn Renderer>) -> Runtime {
        let vm = Vm::new(&game);
        let room_persistent = game.rooms.iter().map(|r| r.persistent).collect();
        let rng = GameRng::new(config.rng_seed);
        Runtime {
            game: Rc::new(game),
            vm,
            config,
            instances: IndexMap::new(),
            globals: HashMap::new(),
            room_index: -1,
            views: Vec::new(),
            pending_room: None,
            next_instance_id: FIRST_INSTANCE_ID,
            room_persistent,
            current_view: 0,
            input: InputState::new(),
            recording: None,
            playback: None,
            frame_count: 0,
            game_started: false,
            should_quit: false,
            event_context: None,
            current_self: None,
            current_other: None,
            renderer,
            draw_state: DrawState::default(),
            ds: DsStore::default(),
            rng,
            started: Instant::now(),
        }
    }

    /// Select the start room and set up input recording or playback.
    ///
    /// The room is entered at the start of the first [`Runtime::step`].
    pub fn initialize(&mut self) -> ConfigResult<()> {
        let start = match self.config.start_room.as_deref() {
            Some(selector) => self.game.resolve_room(selector).unwrap_or_else(|| {
                warn!("start room '{}' not found, using the room order", selector);
                self.game.first_room()
            }),
            None => self.game.first_room(),
        };

        if let Some(path) = self.config.input.playback.clone() {
            self.playback = Some(Playback::new(InputRecording::load(&path)?));
        }
        if self.config.input.record.is_some() {
            self.recording = Some(InputRecording::default());
        }

        self.goto_room(start);
        Ok(())
    }

    pub fn room(&self) -> Option<&Room> {
        self.game.room(self.room_index)
    }

    pub fn instance(&self, id: i32) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn is_live(&self, id: i32) -> bool {
        self.instances.get(&id).is_some_and(|i| !i.destroyed)
    }

    /// Snapshot of live instance ids in creation order.
    pub fn live_ids(&self) -> Vec<i32> {
        self.instances
            .values()
            .filter(|i| !i.destroyed)
            .map(|i| i.id)
            .collect()
    }

    /// Request a room change. Only the last request before the next step applies.
    pub fn goto_room(&mut self, index: i32) {
        debug!(
            "goto_room({} = {}) at frame {}",
            index,
            self.game.room(index).map_or("<invalid>", |r| r.name.as_str()),
            self.frame_count
        );
        self.pending_room = Some(index);
    }

    /// Advance the simulation by one frame.
    pub fn step(&mut self) {
        self.frame_count += 1;

        if let Some(playback) = &self.playback {
            playback.apply(self.frame_count, &mut self.input);
        }
        if let Some(recording) = &mut self.recording {
            recording.record(self.frame_count, &self.input);
        }
        if let Some(room) = self.pending_room.take() {
            self.perform_room_transition(room);
        }

        for inst in self.instances.values_mut().filter(|i| !i.destroyed) {
            inst.xprevious = inst.x;
            inst.yprevious = inst.y;
        }

        self.dispatch_event(event::STEP, step_event::BEGIN);
        self.run_alarms();
        let pressed: Vec<i32> = self.input.pressed.iter().copied().collect();
        for key in pressed {
            self.dispatch_event(event::KEYPRESS, key);
        }
        self.dispatch_event(event::STEP, step_event::NORMAL);
        self.dispatch_collisions();
        self.dispatch_event(event::STEP, step_event::END);

        self.advance_paths();
        self.apply_physics();
        self.check_outside_room();
        self.advance_animation();

        self.instances.retain(|_, i| !i.destroyed);
    }

    fn perform_room_transition(&mut self, index: i32) {
        let game = Rc::clone(&self.game);
        let Some(room) = game.room(index) else {
            warn!("room transition to {} ignored: no such room", index);
            return;
        };

        self.dispatch_event(event::OTHER, other_event::ROOM_END);
        self.instances.retain(|_, i| i.persistent && !i.destroyed);
        let carried: HashSet<i32> = self.instances.keys().copied().collect();

        self.room_index = index;
        self.views = room.views.clone();
        self.current_view = 0;
        info!(
            "Entering room {} ({}x{}), {} placements, {} carried over",
            room.name,
            room.width,
            room.height,
            room.instances.len(),
            carried.len()
        );

        // Instances made by creation code through instance_create already ran Create.
        let mut placed = Vec::with_capacity(room.instances.len());
        for placement in &room.instances {
            if carried.contains(&placement.instance_id) {
                debug!("placement {} already present as a persistent instance", placement.instance_id);
                continue;
            }
            let forced = (placement.instance_id >= 0).then_some(placement.instance_id);
            let id = self.create_instance(placement.object, placement.x as f64, placement.y as f64, forced);
            placed.push(id);
            if let Some(inst) = self.instances.get_mut(&id) {
                inst.image_xscale = placement.scale_x as f64;
                inst.image_yscale = placement.scale_y as f64;
                inst.image_angle = placement.rotation as f64;
            }
            if placement.creation_code >= 0 {
                self.execute(placement.creation_code, id, None);
            }
        }

        if room.creation_code >= 0 {
            let (host, temporary) = match self.instances.keys().next() {
                Some(&id) => (id, false),
                None => (self.create_instance(-1, 0.0, 0.0, None), true),
            };
            self.execute(room.creation_code, host, None);
            if temporary {
                if let Some(inst) = self.instances.get_mut(&host) {
                    inst.destroyed = true;
                }
            }
        }

        for id in placed {
            if self.is_live(id) {
                self.fire_event(id, event::CREATE, 0, None);
            }
        }
        if !self.game_started {
            self.game_started = true;
            self.dispatch_event(event::OTHER, other_event::GAME_START);
        }
        self.dispatch_event(event::OTHER, other_event::ROOM_START);
    }

    /// Add an instance without running any events. Returns its id.
    pub fn create_instance(&mut self, object: i32, x: f64, y: f64, forced_id: Option<i32>) -> i32 {
        let id = match forced_id {
            Some(id) => {
                if id >= self.next_instance_id {
                    self.next_instance_id = id + 1;
                }
                id
            }
            None => {
                let id = self.next_instance_id;
                self.next_instance_id += 1;
                id
            }
        };

        let mut inst = Instance::new(id, object, x, y);
        if let Some(def) = self.game.object(object) {
            inst.sprite_index = def.sprite;
            inst.visible = def.visible;
            inst.solid = def.solid;
            inst.depth = def.depth;
            inst.persistent = def.persistent;
            inst.mask_index = def.mask;
        }
        self.instances.insert(id, inst);
        id
    }

    /// Create an instance and run its Create event immediately.
    pub fn spawn_instance(&mut self, object: i32, x: f64, y: f64) -> i32 {
        let id = self.create_instance(object, x, y, None);
        self.fire_event(id, event::CREATE, 0, None);
        id
    }

    /// Run the Destroy event, then mark the instance for removal at step end.
    pub fn destroy_instance(&mut self, id: i32) {
        if !self.is_live(id) {
            return;
        }
        self.fire_event(id, event::DESTROY, 0, None);
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.destroyed = true;
        }
    }

    /// Whether `child` descends from `parent` through at least one parent link.
    pub fn is_child_of(&self, child: i32, parent: i32) -> bool {
        let mut current = child;
        for _ in 0..MAX_PARENT_DEPTH {
            let Some(def) = self.game.object(current) else {
                return false;
            };
            if def.parent == parent {
                return true;
            }
            current = def.parent;
        }
        false
    }

    fn live_only(&self, id: i32) -> Vec<i32> {
        if self.is_live(id) {
            vec![id]
        } else {
            Vec::new()
        }
    }

    /// Live instances named by a target selector.
    ///
    /// `-1` self, `-2` other, `-3` all, `-4` none, ids from 100000 up name one
    /// instance, and any other non-negative value names an object together
    /// with its descendants.
    pub fn find_instances(&self, selector: i32, self_id: i32, other_id: i32) -> Vec<i32> {
        match selector {
            instance_type::SELF => self.live_only(self_id),
            instance_type::OTHER => self.live_only(other_id),
            instance_type::ALL => self.live_ids(),
            id if id >= FIRST_INSTANCE_ID => self.live_only(id),
            object if object >= 0 => self
                .instances
                .values()
                .filter(|i| !i.destroyed && (i.object_index == object || self.is_child_of(i.object_index, object)))
                .map(|i| i.id)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Instance a variable access with this instance type reads from, if any.
    pub fn resolve_instance(&self, inst_type: i32, self_id: i32, other_id: i32) -> Option<i32> {
        let id = match inst_type {
            instance_type::SELF | instance_type::BUILTIN => self_id,
            instance_type::OTHER => other_id,
            instance_type::GLOBAL | instance_type::LOCAL => return None,
            object if object >= 0 => return self.find_instances(object, self_id, other_id).first().copied(),
            _ => self_id,
        };
        self.instances.contains_key(&id).then_some(id)
    }

    /// Read a field or variable of an instance, falling back to global builtins.
    pub fn get_instance_var(&self, id: i32, name: &str) -> Value {
        let Some(inst) = self.instances.get(&id) else {
            return Value::ZERO;
        };
        if let Some(v) = inst.get_field(name) {
            return v;
        }

        let sprite = self.game.sprite(inst.sprite_index);
        match name {
            "bbox_left" | "bbox_right" | "bbox_top" | "bbox_bottom" => {
                let Some(b) = compute_bbox(&self.game, inst) else {
                    return Value::ZERO;
                };
                let edge = match name {
                    "bbox_left" => b.left.floor(),
                    "bbox_top" => b.top.floor(),
                    "bbox_right" => (b.right - 1.0).ceil(),
                    _ => (b.bottom - 1.0).ceil(),
                };
                Value::Real(edge)
            }
            "sprite_width" => Value::Real(sprite.map_or(0.0, |s| s.width as f64 * inst.image_xscale.abs())),
            "sprite_height" => Value::Real(sprite.map_or(0.0, |s| s.height as f64 * inst.image_yscale.abs())),
            "image_number" => Value::from(sprite.map_or(0, |s| s.frames.len() as i32)),
            "room_persistent" => Value::from(self.current_room_persistent()),
            _ => inst
                .variables
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.get_global_builtin(name)),
        }
    }

    pub fn set_instance_var(&mut self, id: i32, name: &str, value: &Value) {
        if name == "room_persistent" {
            if let Some(flag) = usize::try_from(self.room_index)
                .ok()
                .and_then(|i| self.room_persistent.get_mut(i))
            {
                *flag = value.to_bool();
            }
            return;
        }
        if let Some(inst) = self.instances.get_mut(&id) {
            if !inst.set_field(name, value) {
                inst.variables.insert(name.to_string(), value.clone());
            }
        }
    }

    fn current_room_persistent(&self) -> bool {
        usize::try_from(self.room_index)
            .ok()
            .and_then(|i| self.room_persistent.get(i))
            .copied()
            .unwrap_or(false)
    }

    /// Engine-wide read-only values, then global variables.
    pub fn get_global_builtin(&self, name: &str) -> Value {
        let room = self.room();
        let gen8 = &self.game.gen8;
        match name {
            "room" => Value::from(self.room_index),
            "room_speed" | "fps" => Value::from(room.map_or(DEFAULT_ROOM_SPEED, |r| r.speed)),
            "room_width" => Value::from(room.map_or(DEFAULT_VIEW_WIDTH, |r| r.width)),
            "room_height" => Value::from(room.map_or(DEFAULT_VIEW_HEIGHT, |r| r.height)),
            "view_current" => Value::from(self.current_view),
            "current_time" => Value::Real(self.started.elapsed().as_millis() as f64),
            "instance_count" => Value::from(self.instances.values().filter(|i| !i.destroyed).count() as i32),
            "keyboard_key" => Value::from(self.input.current_key),
            "keyboard_lastkey" => Value::from(self.input.last_key),
            "mouse_x" => Value::Real(self.input.mouse_x),
            "mouse_y" => Value::Real(self.input.mouse_y),
            "os_type" => Value::ONE,
            "game_id" => Value::from(gen8.game_id),
            "working_directory" | "program_directory" => Value::empty_string(),
            "temp_directory" => Value::from("/tmp/"),
            "browser_width" => Value::from(gen8.window_width),
            "browser_height" => Value::from(gen8.window_height),
            "display_aa" => Value::ZERO,
            "application_surface" => Value::Real(-1.0),
            "path_action_stop" => Value::ZERO,
            "path_action_restart" => Value::ONE,
            "path_action_continue" => Value::Real(2.0),
            "path_action_reverse" => Value::Real(3.0),
            _ => self.globals.get(name).cloned().unwrap_or(Value::ZERO),
        }
    }

    pub fn set_global_builtin(&mut self, name: &str, value: Value) {
        match name {
            "room_speed" => {}
            "keyboard_lastkey" => self.input.last_key = value.to_int(),
            _ => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    /// Element of a `view_*` builtin array, or None when `name` is not one.
    pub fn get_view_array(&self, name: &str, index: i32) -> Option<Value> {
        let view = usize::try_from(index).ok().and_then(|i| self.views.get(i));
        let n = match name {
            "view_xview" => view.map_or(0, |v| v.view_x),
            "view_yview" => view.map_or(0, |v| v.view_y),
            "view_wview" => view.map_or(DEFAULT_VIEW_WIDTH, |v| v.view_w),
            "view_hview" => view.map_or(DEFAULT_VIEW_HEIGHT, |v| v.view_h),
            "view_xport" => view.map_or(0, |v| v.port_x),
            "view_yport" => view.map_or(0, |v| v.port_y),
            "view_wport" => view.map_or(DEFAULT_VIEW_WIDTH, |v| v.port_w),
            "view_hport" => view.map_or(DEFAULT_VIEW_HEIGHT, |v| v.port_h),
            "view_hborder" => view.map_or(0, |v| v.border_h),
            "view_vborder" => view.map_or(0, |v| v.border_v),
            "view_hspeed" => view.map_or(0, |v| v.speed_h),
            "view_vspeed" => view.map_or(0, |v| v.speed_v),
            "view_object" => view.map_or(-1, |v| v.follow_object),
            "view_visible" => return Some(Value::from(view.is_some_and(|v| v.enabled))),
            _ => return None,
        };
        Some(Value::from(n))
    }

    /// Store into a `view_*` array. False when the name or the view does not exist.
    pub fn set_view_array(&mut self, name: &str, index: i32, value: &Value) -> bool {
        let Some(view) = usize::try_from(index).ok().and_then(|i| self.views.get_mut(i)) else {
            return false;
        };
        let n = value.to_int();
        match name {
            "view_xview" => view.view_x = n,
            "view_yview" => view.view_y = n,
            "view_wview" => view.view_w = n,
            "view_hview" => view.view_h = n,
            "view_xport" => view.port_x = n,
            "view_yport" => view.port_y = n,
            "view_wport" => view.port_w = n,
            "view_hport" => view.port_h = n,
            "view_hborder" => view.border_h = n,
            "view_vborder" => view.border_v = n,
            "view_hspeed" => view.speed_h = n,
            "view_vspeed" => view.speed_v = n,
            "view_object" => view.follow_object = n,
            "view_visible" => view.enabled = value.to_real() > 0.5,
            _ => return false,
        }
        true
    }

    pub fn global_array_get(&self, name: &str, index: i32) -> Value {
        self.globals
            .get(name)
            .map(|v| v.array_get(index))
            .unwrap_or(Value::ZERO)
    }

    pub fn global_array_set(&mut self, name: &str, index: i32, value: Value) {
        let slot = self.globals.entry(name.to_string()).or_insert(Value::ZERO);
        Value::array_set(slot, index, value);
    }

    pub fn on_key_down(&mut self, key: i32) {
        self.input.on_key_down(key);
    }

    pub fn on_key_up(&mut self, key: i32) {
        self.input.on_key_up(key);
    }

    pub fn clear_per_frame_input(&mut self) {
        self.input.clear_per_frame_input();
    }

    /// Write the input recording, if one was requested.
    pub fn save_recording(&self) -> ConfigResult<()> {
        match (&self.recording, &self.config.input.record) {
            (Some(recording), Some(path)) => recording.save(path),
            _ => Ok(()),
        }
    }

    /// Draw the current room through the renderer.
    pub fn draw(&mut self) {
        let game = Rc::clone(&self.game);
        let Some(room) = game.room(self.room_index) else {
            return;
        };
        self.renderer.begin_frame();

        let enabled: Vec<usize> = (0..self.views.len()).filter(|&i| self.views[i].enabled).collect();
        if enabled.is_empty() {
            self.current_view = 0;
            self.renderer.set_view(ViewRect {
                view_x: 0,
                view_y: 0,
                view_w: room.width,
                view_h: room.height,
                port_x: 0,
                port_y: 0,
                port_w: game.gen8.window_width,
                port_h: game.gen8.window_height,
            });
            if room.draw_bg_color {
                self.renderer.clear(room.bg_color);
            }
            self.draw_layers(&game, room);
            return;
        }

        for index in enabled {
            self.current_view = index as i32;
            let view = &mut self.views[index];
            view.view_x = view.view_x.clamp(0, (room.width - view.view_w).max(0));
            view.view_y = view.view_y.clamp(0, (room.height - view.view_h).max(0));
            let rect = ViewRect {
                view_x: view.view_x,
                view_y: view.view_y,
                view_w: view.view_w,
                view_h: view.view_h,
                port_x: view.port_x,
                port_y: view.port_y,
                port_w: view.port_w,
                port_h: view.port_h,
            };
            self.renderer.set_view(rect);
            if index == 0 && room.draw_bg_color {
                self.renderer.clear(room.bg_color);
            }
            self.draw_layers(&game, room);
        }
    }

    /// Backgrounds, then tiles and instances from the deepest depth up, then foregrounds.
    fn draw_layers(&mut self, game: &GameData, room: &Room) {
        self.draw_backgrounds(game, room, false);

        let mut depths: BTreeSet<i32> = room.tiles.iter().map(|t| t.depth).collect();
        depths.extend(self.instances.values().filter(|i| !i.destroyed).map(|i| i.depth));

        for depth in depths.into_iter().rev() {
            for tile in room.tiles.iter().filter(|t| t.depth == depth) {
                let drawable = usize::try_from(tile.background)
                    .ok()
                    .and_then(|i| game.backgrounds.get(i))
                    .is_some_and(|b| b.texture_item >= 0);
                if drawable {
                    self.renderer.draw_tile(tile);
                }
            }
            let ids: Vec<i32> = self
                .instances
                .values()
                .filter(|i| !i.destroyed && i.depth == depth)
                .map(|i| i.id)
                .collect();
            for id in ids {
                if self.is_live(id) {
                    self.draw_instance(id);
                }
            }
        }

        self.draw_backgrounds(game, room, true);
    }

    fn draw_backgrounds(&mut self, game: &GameData, room: &Room, foreground: bool) {
        for layer in room.backgrounds.iter().filter(|b| b.enabled && b.foreground == foreground) {
            let drawable = usize::try_from(layer.background)
                .ok()
                .and_then(|i| game.backgrounds.get(i))
                .is_some_and(|b| b.texture_item >= 0);
            if drawable {
                self.renderer.draw_background(
                    layer.background,
                    layer.x as f64,
                    layer.y as f64,
                    layer.tile_x,
                    layer.tile_y,
                );
            }
        }
    }

    /// Run the nearest Draw event in the chain, or draw the current sprite frame.
    fn draw_instance(&mut self, id: i32) {
        let Some(inst) = self.instances.get(&id).filter(|i| i.visible) else {
            return;
        };
        let (sprite, frame, x, y) = (inst.sprite_index, inst.image_index as i32, inst.x, inst.y);
        let style = SpriteStyle {
            xscale: inst.image_xscale,
            yscale: inst.image_yscale,
            angle: inst.image_angle,
            blend: inst.image_blend,
            alpha: inst.image_alpha,
        };

        let game = Rc::clone(&self.game);
        let mut object = inst.object_index;
        for _ in 0..MAX_PARENT_DEPTH {
            let Some(def) = game.object(object) else {
                break;
            };
            if let Some(entry) = def.find_event(event::DRAW, 0).filter(|e| !e.actions.is_empty()) {
                let prev = self.event_context.replace(EventContext {
                    event_type: event::DRAW,
                    subtype: 0,
                    object_index: object,
                });
                let code = entry.actions[0].code_id;
                if code >= 0 {
                    self.execute(code, id, None);
                }
                self.event_context = prev;
                return;
            }
            object = def.parent;
        }

        if sprite >= 0 {
            self.renderer.draw_sprite(sprite, frame, x, y, style);
        }
    }
}
