//! Live instances and their built-in fields.
//!
//! Fields that need the world to answer (bounding box, sprite size, room
//! flags) are resolved by the runtime; this module only knows the instance.

use crate::value::Value;
use std::collections::HashMap;

pub const ALARM_COUNT: usize = 12;
/// Ids handed out by the runtime start here; smaller selectors name objects.
pub const FIRST_INSTANCE_ID: i32 = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: i32,
    pub object_index: i32,
    pub x: f64,
    pub y: f64,

    pub sprite_index: i32,
    pub image_index: f64,
    pub image_speed: f64,
    pub image_xscale: f64,
    pub image_yscale: f64,
    pub image_angle: f64,
    pub image_blend: i32,
    pub image_alpha: f64,

    pub depth: i32,
    pub visible: bool,
    pub solid: bool,
    pub persistent: bool,

    pub xprevious: f64,
    pub yprevious: f64,
    pub xstart: f64,
    pub ystart: f64,

    pub hspeed: f64,
    pub vspeed: f64,
    pub speed: f64,
    pub direction: f64,
    pub friction: f64,
    pub gravity: f64,
    pub gravity_direction: f64,

    pub mask_index: i32,

    pub path_index: i32,
    pub path_position: f64,
    pub path_speed: f64,
    /// 0 stop, 1 restart, 2 continue, 3 reverse
    pub path_end_action: i32,
    pub path_orientation: f64,
    pub path_scale: f64,
    pub path_x_offset: f64,
    pub path_y_offset: f64,

    /// -1 is inactive.
    pub alarms: [i32; ALARM_COUNT],
    pub variables: HashMap<String, Value>,
    /// Slot a script's `ret` writes into.
    pub return_value: Option<Value>,

    pub destroyed: bool,
    /// Set while fully outside the room so the outside event fires once per exit.
    pub outside_room: bool,
}

impl Instance {
    pub fn new(id: i32, object_index: i32, x: f64, y: f64) -> Self {
        Instance {
            id,
            object_index,
            x,
            y,
            sprite_index: -1,
            image_index: 0.0,
            image_speed: 1.0,
            image_xscale: 1.0,
            image_yscale: 1.0,
            image_angle: 0.0,
            image_blend: 0xFF_FFFF,
            image_alpha: 1.0,
            depth: 0,
            visible: true,
            solid: false,
            persistent: false,
            xprevious: x,
            yprevious: y,
            xstart: x,
            ystart: y,
            hspeed: 0.0,
            vspeed: 0.0,
            speed: 0.0,
            direction: 0.0,
            friction: 0.0,
            gravity: 0.0,
            gravity_direction: 270.0,
            mask_index: -1,
            path_index: -1,
            path_position: 0.0,
            path_speed: 0.0,
            path_end_action: 0,
            path_orientation: 0.0,
            path_scale: 1.0,
            path_x_offset: 0.0,
            path_y_offset: 0.0,
            alarms: [-1; ALARM_COUNT],
            variables: HashMap::new(),
            return_value: None,
            destroyed: false,
            outside_room: false,
        }
    }

    /// Recompute speed and direction after a component changed.
    pub fn sync_polar(&mut self) {
        self.speed = self.hspeed.hypot(self.vspeed);
        self.direction = ((-self.vspeed).atan2(self.hspeed).to_degrees() + 360.0) % 360.0;
    }

    /// Recompute components after speed or direction changed. Screen y grows downwards.
    pub fn sync_cartesian(&mut self) {
        let rad = self.direction.to_radians();
        self.hspeed = self.speed * rad.cos();
        self.vspeed = -self.speed * rad.sin();
    }

    /// Read a built-in field. `None` means the name is not a plain field.
    pub fn get_field(&self, name: &str) -> Option<Value> {
        let v = match name {
            "x" => self.x.into(),
            "y" => self.y.into(),
            "xprevious" => self.xprevious.into(),
            "yprevious" => self.yprevious.into(),
            "xstart" => self.xstart.into(),
            "ystart" => self.ystart.into(),
            "hspeed" => self.hspeed.into(),
            "vspeed" => self.vspeed.into(),
            "speed" => self.speed.into(),
            "direction" => self.direction.into(),
            "friction" => self.friction.into(),
            "gravity" => self.gravity.into(),
            "gravity_direction" => self.gravity_direction.into(),
            "sprite_index" => self.sprite_index.into(),
            "image_index" => self.image_index.into(),
            "image_speed" => self.image_speed.into(),
            "image_xscale" => self.image_xscale.into(),
            "image_yscale" => self.image_yscale.into(),
            "image_angle" => self.image_angle.into(),
            "image_blend" => self.image_blend.into(),
            "image_alpha" => self.image_alpha.into(),
            "depth" => self.depth.into(),
            "visible" => self.visible.into(),
            "solid" => self.solid.into(),
            "persistent" => self.persistent.into(),
            "object_index" => self.object_index.into(),
            "id" => self.id.into(),
            "mask_index" => self.mask_index.into(),
            "path_index" => self.path_index.into(),
            "path_position" => self.path_position.into(),
            "path_speed" => self.path_speed.into(),
            "path_endaction" => self.path_end_action.into(),
            "path_orientation" => self.path_orientation.into(),
            "path_scale" => self.path_scale.into(),
            // Whole-array reads of alarm are meaningless.
            "alarm" => Value::ZERO,
            _ => return None,
        };
        Some(v)
    }

    /// Write a built-in field. Returns false when `name` is not one.
    pub fn set_field(&mut self, name: &str, value: &Value) -> bool {
        match name {
            "x" => self.x = value.to_real(),
            "y" => self.y = value.to_real(),
            "xprevious" => self.xprevious = value.to_real(),
            "yprevious" => self.yprevious = value.to_real(),
            "xstart" => self.xstart = value.to_real(),
            "ystart" => self.ystart = value.to_real(),
            "hspeed" => {
                self.hspeed = value.to_real();
                self.sync_polar();
            }
            "vspeed" => {
                self.vspeed = value.to_real();
                self.sync_polar();
            }
            "speed" => {
                self.speed = value.to_real();
                self.sync_cartesian();
            }
            "direction" => {
                self.direction = value.to_real();
                self.sync_cartesian();
            }
            "friction" => self.friction = value.to_real(),
            "gravity" => self.gravity = value.to_real(),
            "gravity_direction" => self.gravity_direction = value.to_real(),
            "sprite_index" => self.sprite_index = value.to_int(),
            "image_index" => self.image_index = value.to_real(),
            "image_speed" => self.image_speed = value.to_real(),
            "image_xscale" => self.image_xscale = value.to_real(),
            "image_yscale" => self.image_yscale = value.to_real(),
            "image_angle" => self.image_angle = value.to_real(),
            "image_blend" => self.image_blend = value.to_int(),
            "image_alpha" => self.image_alpha = value.to_real(),
            "depth" => self.depth = value.to_int(),
            "visible" => self.visible = value.to_bool(),
            "solid" => self.solid = value.to_bool(),
            "persistent" => self.persistent = value.to_bool(),
            "mask_index" => self.mask_index = value.to_int(),
            "path_index" => self.path_index = value.to_int(),
            "path_position" => self.path_position = value.to_real(),
            "path_speed" => self.path_speed = value.to_real(),
            "path_endaction" => self.path_end_action = value.to_int(),
            "path_orientation" => self.path_orientation = value.to_real(),
            "path_scale" => self.path_scale = value.to_real(),
            _ => return false,
        }
        true
    }

    pub fn get_array_element(&self, name: &str, index: i32) -> Value {
        if name == "alarm" {
            return usize::try_from(index)
                .ok()
                .and_then(|i| self.alarms.get(i))
                .map(|&a| Value::from(a))
                .unwrap_or(Value::Real(-1.0));
        }
        self.variables
            .get(name)
            .map(|v| v.array_get(index))
            .unwrap_or(Value::ZERO)
    }

    pub fn set_array_element(&mut self, name: &str, index: i32, value: Value) {
        if name == "alarm" {
            if let Some(slot) = usize::try_from(index).ok().and_then(|i| self.alarms.get_mut(i)) {
                *slot = value.to_int();
            }
            return;
        }
        let slot = self.variables.entry(name.to_string()).or_insert(Value::ZERO);
        Value::array_set(slot, index, value);
    }
}
