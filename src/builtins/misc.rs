//! Keyboard, type checks, scripts, globals, asset queries, messages and
//! the neutral stubs for platform services the runtime does not provide.

use super::{arg, int, BuiltinFn};
use crate::error::VmResult;
use crate::runtime::Runtime;
use crate::value::Value;
use log::{debug, info};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

const UNDEFINED_NAME: &str = "<undefined>";

pub fn register(m: &mut HashMap<&'static str, BuiltinFn>) {
    m.insert("keyboard_check", |rt, a| Ok(Value::from(rt.input.is_held(int(a, 0)?))));
    m.insert("keyboard_check_direct", |rt, a| Ok(Value::from(rt.input.is_held(int(a, 0)?))));
    m.insert("keyboard_check_pressed", |rt, a| Ok(Value::from(rt.input.is_pressed(int(a, 0)?))));
    m.insert("keyboard_check_released", |rt, a| Ok(Value::from(rt.input.is_released(int(a, 0)?))));
    m.insert("keyboard_clear", |rt, a| {
        rt.input.clear_key(int(a, 0)?);
        Ok(Value::ZERO)
    });

    m.insert("is_undefined", |_, a| Ok(Value::from(matches!(a.first(), Some(Value::Undefined) | None))));
    m.insert("is_string", |_, a| Ok(Value::from(matches!(a.first(), Some(Value::Str(_))))));
    m.insert("is_real", |_, a| Ok(Value::from(matches!(a.first(), Some(Value::Real(_))))));
    m.insert("is_array", |_, a| Ok(Value::from(matches!(a.first(), Some(Value::Array(_))))));
    m.insert("typeof", |_, a| Ok(Value::from(a.first().map_or("undefined", Value::type_name))));

    m.insert("script_execute", script_execute);
    m.insert("event_inherited", |rt, _| {
        if let Some(id) = rt.current_self {
            let other = rt.current_other;
            rt.fire_event_inherited(id, other);
        }
        Ok(Value::ZERO)
    });
    m.insert("variable_global_exists", |rt, a| {
        Ok(Value::from(rt.globals.contains_key(&arg(a, 0)?.to_str())))
    });
    m.insert("variable_global_get", |rt, a| {
        Ok(rt.globals.get(&arg(a, 0)?.to_str()).cloned().unwrap_or(Value::ZERO))
    });
    m.insert("variable_global_set", |rt, a| {
        let name = arg(a, 0)?.to_str();
        rt.globals.insert(name, arg(a, 1)?.clone());
        Ok(Value::ZERO)
    });

    m.insert("object_get_name", |rt, a| {
        Ok(Value::from(rt.game.object(int(a, 0)?).map_or(UNDEFINED_NAME, |o| o.name.as_str())))
    });
    m.insert("sprite_get_name", |rt, a| {
        Ok(Value::from(rt.game.sprite(int(a, 0)?).map_or(UNDEFINED_NAME, |s| s.name.as_str())))
    });
    m.insert("sprite_get_number", |rt, a| {
        Ok(Value::from(rt.game.sprite(int(a, 0)?).map_or(0, |s| s.frames.len() as i32)))
    });
    m.insert("sprite_get_width", |rt, a| {
        Ok(Value::from(rt.game.sprite(int(a, 0)?).map_or(0, |s| s.width)))
    });
    m.insert("sprite_get_height", |rt, a| {
        Ok(Value::from(rt.game.sprite(int(a, 0)?).map_or(0, |s| s.height)))
    });
    m.insert("array_length_1d", |_, a| {
        Ok(Value::from(arg(a, 0)?.as_array().map_or(0, |x| x.len_1d() as i32)))
    });
    m.insert("array_length_2d", |_, a| {
        Ok(Value::from(arg(a, 0)?.as_array().map_or(0, |x| x.len_2d() as i32)))
    });

    m.insert("show_debug_message", |_, a| {
        info!("[debug] {}", a.first().map(Value::to_str).unwrap_or_default());
        Ok(Value::ZERO)
    });
    m.insert("show_message", |_, a| {
        info!("[message] {}", a.first().map(Value::to_str).unwrap_or_default());
        Ok(Value::ZERO)
    });
    m.insert("game_end", |rt, _| {
        info!("game_end() at frame {}", rt.frame_count);
        rt.should_quit = true;
        Ok(Value::ZERO)
    });

    register_platform(m);
}

/// `script_execute(index, args...)` runs a script by its table index.
fn script_execute(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let index = int(args, 0)?;
    let name = usize::try_from(index)
        .ok()
        .and_then(|i| rt.game.scripts.get(i))
        .map(|s| s.name.clone());
    let self_id = rt.current_self.or_else(|| rt.instances.keys().next().copied());
    match (name, self_id) {
        (Some(name), Some(id)) => rt.call_function(&name, &args[1..], id, id),
        _ => {
            debug!("script_execute({}) with no script or no instance", index);
            Ok(Value::ZERO)
        }
    }
}

fn unix_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_millis() as f64)
}

/// Audio, files, OS, window, surface and controller services.
fn register_platform(m: &mut HashMap<&'static str, BuiltinFn>) {
    fn zero(_: &mut Runtime, _: &[Value]) -> VmResult<Value> {
        Ok(Value::ZERO)
    }
    fn no(_: &mut Runtime, _: &[Value]) -> VmResult<Value> {
        Ok(Value::from(false))
    }

    for name in [
        "audio_play_sound",
        "audio_stop_sound",
        "audio_stop_all",
        "audio_is_playing",
        "audio_sound_gain",
        "audio_sound_pitch",
        "audio_group_load",
        "audio_group_is_loaded",
        "audio_create_stream",
        "audio_destroy_stream",
        "audio_master_gain",
        "audio_channel_num",
        "sound_play",
        "sound_stop",
        "sound_stop_all",
        "sound_is_playing",
        "sound_volume",
        "sound_loop",
        "caster_load",
        "caster_play",
        "caster_stop",
        "caster_is_playing",
        "caster_loop",
        "caster_volume",
        "caster_position",
        "caster_free",
        "caster_set_volume",
        "caster_create",
        "ini_open",
        "ini_close",
        "ini_write_real",
        "ini_write_string",
        "os_get_info",
        "parameter_count",
        "sprite_prefetch",
        "sprite_prefetch_multi",
        "background_prefetch",
        "window_set_caption",
        "window_set_fullscreen",
        "window_set_size",
        "window_set_position",
        "window_center",
        "display_set_gui_size",
        "view_set_visible",
        "surface_free",
        "surface_set_target",
        "surface_reset_target",
        "application_surface_enable",
        "application_surface_draw_enable",
        "gamepad_get_device_count",
        "keyboard_key_press",
        "keyboard_key_release",
        "game_restart",
    ] {
        m.insert(name, zero);
    }
    for name in [
        "file_exists",
        "window_get_fullscreen",
        "surface_exists",
        "steam_initialised",
        "steam_stats_ready",
        "joystick_exists",
        "gamepad_is_connected",
    ] {
        m.insert(name, no);
    }

    m.insert("ini_read_real", |_, a| Ok(a.get(2).cloned().unwrap_or(Value::ZERO)));
    m.insert("ini_read_string", |_, a| Ok(a.get(2).cloned().unwrap_or_else(Value::empty_string)));
    m.insert("os_get_language", |_, _| Ok(Value::from("en")));
    m.insert("os_get_region", |_, _| Ok(Value::from("US")));
    m.insert("os_get_config", |_, _| Ok(Value::from("default")));
    m.insert("environment_get_variable", |_, _| Ok(Value::empty_string()));
    m.insert("parameter_string", |_, _| Ok(Value::empty_string()));
    m.insert("get_timer", |_, _| Ok(Value::Real(unix_millis() * 1000.0)));
    m.insert("date_current_datetime", |_, _| Ok(Value::Real(unix_millis() / 86_400_000.0 + 25_569.0)));
    m.insert("window_get_caption", |rt, _| Ok(Value::from(rt.game.gen8.display_name.as_str())));
    m.insert("display_get_width", |_, _| Ok(Value::Real(1920.0)));
    m.insert("display_get_height", |_, _| Ok(Value::Real(1080.0)));
    m.insert("surface_create", |_, _| Ok(Value::Real(-1.0)));
    m.insert("surface_get_width", |rt, _| Ok(Value::from(rt.game.gen8.window_width)));
    m.insert("surface_get_height", |rt, _| Ok(Value::from(rt.game.gen8.window_height)));
}
