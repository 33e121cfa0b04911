// Frame-loop tests: event order, inheritance, room changes and the builtins
// that act on the instance table.
use crate::assembler::Assembler;
use crate::events::{event, other_event, step_event};
use crate::game_data::RoomView;
use crate::instruction::{instance_type, opcode};
use crate::renderer::DrawCommand;
use crate::runtime::Runtime;
use crate::test_utils::GameBuilder;
use crate::value::Value;
use test_log::test;

/// Code entry that adds one to a global counter.
fn bump(b: &mut GameBuilder, counter: &str) -> i32 {
    let g = b.global(counter);
    let mut asm = Assembler::new();
    asm.pushglb(g)
        .pushi(1)
        .op(opcode::ADD)
        .pop_var(instance_type::GLOBAL, g);
    b.code(&format!("bump_{}", counter), &mut asm)
}

fn count(rt: &Runtime, counter: &str) -> f64 {
    rt.globals.get(counter).map_or(0.0, |v| v.to_real())
}

fn call(rt: &mut Runtime, name: &str, args: &[i32], self_id: i32) -> Value {
    let args: Vec<Value> = args.iter().map(|&a| Value::from(a)).collect();
    rt.call_function(name, &args, self_id, self_id).unwrap()
}

#[test]
fn test_event_inherited_runs_the_parent_definition() {
    let mut b = GameBuilder::new();
    let base = b.object("obj_base");
    let middle = b.object("obj_middle");
    let leaf = b.object("obj_leaf");
    b.object_mut(middle).parent = base;
    b.object_mut(leaf).parent = middle;

    let base_create = bump(&mut b, "base_create");
    b.event(base, event::CREATE, 0, base_create);

    let inherited = b.func("event_inherited");
    let g = b.global("middle_create");
    let mut asm = Assembler::new();
    asm.call(inherited, 0)
        .popz()
        .pushglb(g)
        .pushi(1)
        .op(opcode::ADD)
        .pop_var(instance_type::GLOBAL, g);
    let middle_create = b.code("gml_Object_obj_middle_Create_0", &mut asm);
    b.event(middle, event::CREATE, 0, middle_create);

    let mut rt = b.runtime();
    // The leaf defines nothing, so the middle's Create runs and chains to the base.
    rt.spawn_instance(leaf, 0.0, 0.0);
    assert_eq!(count(&rt, "base_create"), 1.0);
    assert_eq!(count(&rt, "middle_create"), 1.0);

    rt.spawn_instance(base, 0.0, 0.0);
    assert_eq!(count(&rt, "base_create"), 2.0);
    assert_eq!(count(&rt, "middle_create"), 1.0);
}

#[test]
fn test_step_from_grandparent_runs_once() {
    let mut b = GameBuilder::new();
    let a = b.object("obj_a");
    let bb = b.object("obj_b");
    let c = b.object("obj_c");
    b.object_mut(bb).parent = a;
    b.object_mut(c).parent = bb;
    let a_step = bump(&mut b, "a_steps");
    b.event(a, event::STEP, step_event::NORMAL, a_step);
    let b_create = bump(&mut b, "b_creates");
    b.event(bb, event::CREATE, 0, b_create);

    let mut rt = b.runtime();
    rt.spawn_instance(c, 0.0, 0.0);
    assert_eq!(count(&rt, "b_creates"), 1.0);
    rt.step();
    assert_eq!(count(&rt, "a_steps"), 1.0);
    rt.step();
    assert_eq!(count(&rt, "a_steps"), 2.0);
}

#[test]
fn test_collision_fires_once_per_target() {
    let mut b = GameBuilder::new();
    let spr = b.sprite("spr_block", 16, 16);
    let player = b.object("obj_player");
    let wall = b.object("obj_wall");
    let brick = b.object("obj_brick");
    for obj in [player, wall, brick] {
        b.object_mut(obj).sprite = spr;
    }
    b.object_mut(brick).parent = wall;
    let hit = bump(&mut b, "hits");
    b.event(player, event::COLLISION, wall, hit);

    let mut rt = b.runtime();
    rt.create_instance(player, 0.0, 0.0, None);
    rt.create_instance(wall, 4.0, 4.0, None);
    rt.create_instance(brick, 8.0, 8.0, None);
    // A wall far away never counts.
    rt.create_instance(wall, 200.0, 200.0, None);
    rt.step();
    assert_eq!(count(&rt, "hits"), 1.0);
    rt.step();
    assert_eq!(count(&rt, "hits"), 2.0);
}

#[test]
fn test_collision_matches_descendants() {
    let mut b = GameBuilder::new();
    let spr = b.sprite("spr_block", 16, 16);
    let player = b.object("obj_player");
    let wall = b.object("obj_wall");
    let brick = b.object("obj_brick");
    for obj in [player, wall, brick] {
        b.object_mut(obj).sprite = spr;
    }
    b.object_mut(brick).parent = wall;
    let hit = bump(&mut b, "hits");
    b.event(player, event::COLLISION, wall, hit);

    let mut rt = b.runtime();
    rt.create_instance(player, 0.0, 0.0, None);
    // Sharing an edge is not an overlap.
    rt.create_instance(brick, 16.0, 0.0, None);
    rt.step();
    assert_eq!(count(&rt, "hits"), 0.0);

    rt.create_instance(brick, 10.0, 0.0, None);
    rt.step();
    assert_eq!(count(&rt, "hits"), 1.0);
}

#[test]
fn test_persistent_instance_survives_room_change() {
    let mut b = GameBuilder::new();
    let keeper = b.object("obj_keeper");
    let mob = b.object("obj_mob");
    b.object_mut(keeper).persistent = true;
    let created = bump(&mut b, "creates");
    b.event(keeper, event::CREATE, 0, created);

    let first = b.room("rm_first", 100, 100);
    b.place(first, keeper, 10, 10);
    b.place(first, mob, 0, 0);
    b.room_mut(first).instances[0].instance_id = 100_500;
    let second = b.room("rm_second", 100, 100);
    b.place(second, keeper, 10, 10);
    b.room_mut(second).instances[0].instance_id = 100_500;

    let mut rt = b.runtime();
    rt.initialize().unwrap();
    rt.step();
    assert_eq!(rt.room_index, first);
    assert_eq!(rt.live_ids().len(), 2);
    assert_eq!(count(&rt, "creates"), 1.0);
    {
        let keeper = rt.instances.get_mut(&100_500).unwrap();
        keeper.variables.insert("score".to_string(), Value::from(7));
        keeper.variables.insert("name".to_string(), Value::from("hero"));
        keeper.x = 42.0;
    }

    rt.goto_room(second);
    rt.step();
    assert_eq!(rt.room_index, second);
    assert_eq!(rt.live_ids(), vec![100_500]);
    assert_eq!(count(&rt, "creates"), 1.0);
    let keeper = &rt.instances[&100_500];
    assert_eq!(keeper.variables.get("score"), Some(&Value::from(7)));
    assert_eq!(keeper.variables.get("name"), Some(&Value::from("hero")));
    assert_eq!(keeper.x, 42.0);
}

#[test]
fn test_last_room_request_wins() {
    let mut b = GameBuilder::new();
    let driver = b.object("obj_driver");
    let marker = b.object("obj_marker");
    let room_goto = b.func("room_goto");

    b.room("rm_start", 64, 64);
    let skipped = b.room("rm_skipped", 64, 64);
    let target = b.room("rm_target", 64, 64);
    b.place(0, driver, 0, 0);
    b.place(skipped, marker, 0, 0);
    b.place(target, marker, 0, 0);

    // Begin Step asks for rm_skipped, then Step asks for rm_target in the same frame.
    let mut begin = Assembler::new();
    begin.pushi(skipped as i16).call(room_goto, 1).popz();
    let begin = b.code("gml_Object_obj_driver_Step_1", &mut begin);
    b.event(driver, event::STEP, step_event::BEGIN, begin);
    let mut normal = Assembler::new();
    normal.pushi(target as i16).call(room_goto, 1).popz();
    let normal = b.code("gml_Object_obj_driver_Step_0", &mut normal);
    b.event(driver, event::STEP, step_event::NORMAL, normal);

    let room_end = bump(&mut b, "room_ends");
    b.event(driver, event::OTHER, other_event::ROOM_END, room_end);
    let created = bump(&mut b, "marker_creates");
    b.event(marker, event::CREATE, 0, created);
    let room_start = bump(&mut b, "room_starts");
    b.event(marker, event::OTHER, other_event::ROOM_START, room_start);

    let mut rt = b.runtime();
    rt.initialize().unwrap();
    rt.step();
    assert_eq!(rt.room_index, 0);
    assert_eq!(rt.pending_room, Some(target));

    rt.step();
    assert_eq!(rt.room_index, target);
    assert!(rt.pending_room.is_none());
    assert_eq!(count(&rt, "room_ends"), 1.0);
    assert_eq!(count(&rt, "marker_creates"), 1.0);
    assert_eq!(count(&rt, "room_starts"), 1.0);

    rt.step();
    assert_eq!(rt.room_index, target);
    assert_eq!(count(&rt, "marker_creates"), 1.0);
    assert_eq!(count(&rt, "room_starts"), 1.0);
}

#[test]
fn test_creation_code_spawn_runs_create_once() {
    let mut b = GameBuilder::new();
    let spawner = b.object("obj_spawner");
    let bullet = b.object("obj_bullet");
    let created = bump(&mut b, "bullet_creates");
    b.event(bullet, event::CREATE, 0, created);

    // instance_create(0, 0, obj_bullet)
    let instance_create = b.func("instance_create");
    let mut asm = Assembler::new();
    asm.pushi(bullet as i16)
        .pushi(0)
        .pushi(0)
        .call(instance_create, 3)
        .popz();
    let spawn = b.code("gml_RoomCC_rm_main_0_Create", &mut asm);

    let room = b.room("rm_main", 64, 64);
    b.place(room, spawner, 0, 0);
    b.room_mut(room).instances[0].creation_code = spawn;

    let mut rt = b.runtime();
    rt.initialize().unwrap();
    rt.step();
    assert_eq!(rt.live_ids().len(), 2);
    assert_eq!(count(&rt, "bullet_creates"), 1.0);
}

#[test]
fn test_alarm_counts_down_then_fires_once() {
    let mut b = GameBuilder::new();
    let obj = b.object("obj_timer");
    let ring = bump(&mut b, "rings");
    b.event(obj, event::ALARM, 0, ring);

    let mut rt = b.runtime();
    let id = rt.create_instance(obj, 0.0, 0.0, None);
    rt.instances.get_mut(&id).unwrap().alarms[0] = 2;
    rt.step();
    assert_eq!(count(&rt, "rings"), 0.0);
    assert_eq!(rt.instances[&id].alarms[0], 1);
    rt.step();
    assert_eq!(count(&rt, "rings"), 1.0);
    assert_eq!(rt.instances[&id].alarms[0], -1);
    rt.step();
    assert_eq!(count(&rt, "rings"), 1.0);
}

#[test]
fn test_destroy_during_step_is_purged_at_frame_end() {
    let mut b = GameBuilder::new();
    let obj = b.object("obj_fragile");
    let destroy = b.func("instance_destroy");
    let mut asm = Assembler::new();
    asm.call(destroy, 0).popz();
    let step = b.code("gml_Object_obj_fragile_Step_0", &mut asm);
    b.event(obj, event::STEP, step_event::NORMAL, step);
    let on_destroy = bump(&mut b, "destroyed");
    b.event(obj, event::DESTROY, 0, on_destroy);

    let mut rt = b.runtime();
    rt.create_instance(obj, 0.0, 0.0, None);
    rt.create_instance(obj, 0.0, 0.0, None);
    rt.step();
    assert_eq!(count(&rt, "destroyed"), 2.0);
    assert!(rt.instances.is_empty());
    rt.step();
    assert_eq!(count(&rt, "destroyed"), 2.0);
}

#[test]
fn test_outside_room_fires_on_leaving_only() {
    let mut b = GameBuilder::new();
    let spr = b.sprite("spr_ball", 10, 10);
    let ball = b.object("obj_ball");
    b.object_mut(ball).sprite = spr;
    let left = bump(&mut b, "left");
    b.event(ball, event::OTHER, other_event::OUTSIDE_ROOM, left);
    let room = b.room("rm_field", 100, 100);
    b.place(room, ball, 95, 50);

    let mut rt = b.runtime();
    rt.initialize().unwrap();
    rt.step();
    assert_eq!(count(&rt, "left"), 0.0);

    let id = rt.live_ids()[0];
    rt.set_instance_var(id, "hspeed", &Value::Real(10.0));
    rt.step();
    assert_eq!(rt.instances[&id].x, 105.0);
    assert_eq!(count(&rt, "left"), 1.0);
    rt.step();
    assert_eq!(count(&rt, "left"), 1.0);
}

#[test]
fn test_draw_uses_sprite_unless_draw_event_exists() {
    let mut b = GameBuilder::new();
    let spr = b.sprite("spr_hero", 8, 8);
    let plain = b.object("obj_plain");
    let custom = b.object("obj_custom");
    b.object_mut(plain).sprite = spr;
    b.object_mut(custom).sprite = spr;

    let rect = b.func("draw_rectangle");
    let mut asm = Assembler::new();
    asm.pushi(1)
        .pushi(5)
        .pushi(5)
        .pushi(0)
        .pushi(0)
        .call(rect, 5)
        .popz();
    let draw = b.code("gml_Object_obj_custom_Draw_0", &mut asm);
    b.event(custom, event::DRAW, 0, draw);

    let room = b.room("rm_stage", 64, 64);
    b.place(room, plain, 12, 4);
    b.place(room, custom, 30, 4);

    let mut rt = b.runtime();
    rt.initialize().unwrap();
    rt.step();
    rt.draw();

    let commands = rt.renderer.recorded();
    let sprites: Vec<&DrawCommand> = commands
        .iter()
        .filter(|c| matches!(c, DrawCommand::Sprite { .. }))
        .collect();
    assert_eq!(sprites.len(), 1);
    assert!(matches!(sprites[0], DrawCommand::Sprite { x, .. } if *x == 12.0));
    assert!(commands
        .iter()
        .any(|c| matches!(c, DrawCommand::Rectangle { outline: true, .. })));
}

#[test]
fn test_invisible_instances_are_not_drawn() {
    let mut b = GameBuilder::new();
    let spr = b.sprite("spr_hidden", 8, 8);
    let obj = b.object("obj_hidden");
    b.object_mut(obj).sprite = spr;
    b.object_mut(obj).visible = false;
    let room = b.room("rm_stage", 64, 64);
    b.place(room, obj, 0, 0);

    let mut rt = b.runtime();
    rt.initialize().unwrap();
    rt.step();
    rt.draw();
    assert!(!rt
        .renderer
        .recorded()
        .iter()
        .any(|c| matches!(c, DrawCommand::Sprite { .. })));
}

#[test]
fn test_key_press_event_fires_on_the_press_frame() {
    let mut b = GameBuilder::new();
    let obj = b.object("obj_jumper");
    let jump = bump(&mut b, "jumps");
    b.event(obj, event::KEYPRESS, 32, jump);

    let mut rt = b.runtime();
    rt.create_instance(obj, 0.0, 0.0, None);
    rt.on_key_down(32);
    rt.step();
    rt.clear_per_frame_input();
    assert_eq!(count(&rt, "jumps"), 1.0);
    rt.step();
    assert_eq!(count(&rt, "jumps"), 1.0);
}

#[test]
fn test_room_creation_code_runs_without_instances() {
    let mut b = GameBuilder::new();
    let seeded = b.global("seeded");
    let mut asm = Assembler::new();
    asm.pushi(1).pop_var(instance_type::GLOBAL, seeded);
    let code = b.code("gml_Room_rm_empty_Create", &mut asm);
    let room = b.room("rm_empty", 64, 64);
    b.room_mut(room).creation_code = code;

    let mut rt = b.runtime();
    rt.initialize().unwrap();
    rt.step();
    assert_eq!(count(&rt, "seeded"), 1.0);
    assert!(rt.instances.is_empty());
}

#[test]
fn test_instance_create_runs_create_event() {
    let mut b = GameBuilder::new();
    let spawner = b.object("obj_spawner");
    let bullet = b.object("obj_bullet");
    let armed = bump(&mut b, "armed");
    b.event(bullet, event::CREATE, 0, armed);

    let mut rt = b.runtime();
    let me = rt.create_instance(spawner, 0.0, 0.0, None);
    let id = call(&mut rt, "instance_create", &[16, 32, bullet], me).to_int();
    let inst = rt.instance(id).unwrap();
    assert_eq!((inst.x, inst.y), (16.0, 32.0));
    assert_eq!(count(&rt, "armed"), 1.0);
    assert_eq!(call(&mut rt, "instance_number", &[bullet], me), Value::ONE);
    assert_eq!(call(&mut rt, "instance_find", &[bullet, 0], me), Value::from(id));
    assert_eq!(call(&mut rt, "instance_find", &[bullet, 1], me), Value::NOONE);
}

#[test]
fn test_selectors_resolve_instances() {
    let mut b = GameBuilder::new();
    let base = b.object("obj_base");
    let child = b.object("obj_child");
    let other = b.object("obj_other");
    b.object_mut(child).parent = base;

    let mut rt = b.runtime();
    let a = rt.create_instance(base, 0.0, 0.0, None);
    let c = rt.create_instance(child, 0.0, 0.0, None);
    let o = rt.create_instance(other, 0.0, 0.0, None);

    assert_eq!(rt.find_instances(instance_type::SELF, a, o), vec![a]);
    assert_eq!(rt.find_instances(instance_type::OTHER, a, o), vec![o]);
    assert_eq!(rt.find_instances(instance_type::ALL, a, o), vec![a, c, o]);
    assert!(rt.find_instances(instance_type::NOONE, a, o).is_empty());
    assert_eq!(rt.find_instances(c, a, o), vec![c]);
    assert_eq!(rt.find_instances(base, a, o), vec![a, c]);
    assert_eq!(rt.find_instances(child, a, o), vec![c]);

    rt.destroy_instance(o);
    assert_eq!(rt.find_instances(instance_type::ALL, a, o), vec![a, c]);
    assert!(rt.find_instances(instance_type::OTHER, a, o).is_empty());
}

#[test]
fn test_bbox_and_sprite_variables() {
    let mut b = GameBuilder::new();
    let spr = b.sprite("spr_crate", 16, 16);
    let obj = b.object("obj_crate");
    b.object_mut(obj).sprite = spr;

    let mut rt = b.runtime();
    let id = rt.create_instance(obj, 10.0, 20.0, None);
    assert_eq!(rt.get_instance_var(id, "bbox_left"), Value::Real(10.0));
    assert_eq!(rt.get_instance_var(id, "bbox_right"), Value::Real(25.0));
    assert_eq!(rt.get_instance_var(id, "bbox_top"), Value::Real(20.0));
    assert_eq!(rt.get_instance_var(id, "bbox_bottom"), Value::Real(35.0));
    assert_eq!(rt.get_instance_var(id, "sprite_width"), Value::Real(16.0));
    assert_eq!(rt.get_instance_var(id, "image_number"), Value::Real(3.0));
}

#[test]
fn test_view_arrays_and_clamping() {
    let mut b = GameBuilder::new();
    let room = b.room("rm_wide", 400, 300);
    b.room_mut(room).views = vec![RoomView {
        enabled: true,
        view_w: 320,
        view_h: 240,
        port_w: 640,
        port_h: 480,
        follow_object: -1,
        ..Default::default()
    }];

    let mut rt = b.runtime();
    rt.initialize().unwrap();
    rt.step();
    assert_eq!(rt.get_view_array("view_wview", 0), Some(Value::Real(320.0)));
    assert_eq!(rt.get_view_array("view_visible", 0), Some(Value::ONE));
    assert_eq!(rt.get_view_array("not_a_view", 0), None);

    assert!(rt.set_view_array("view_xview", 0, &Value::Real(200.0)));
    assert!(!rt.set_view_array("view_xview", 5, &Value::Real(200.0)));
    rt.draw();
    // 400 wide room, 320 wide view.
    assert_eq!(rt.views[0].view_x, 80);
    assert!(rt
        .renderer
        .recorded()
        .iter()
        .any(|c| matches!(c, DrawCommand::SetView(v) if v.view_x == 80 && v.port_w == 640)));
}

#[test]
fn test_path_start_absolute_and_relative() {
    let mut b = GameBuilder::new();
    let obj = b.object("obj_walker");
    let path = b.path("pth_line", &[(0.0, 0.0), (100.0, 0.0)], false);

    let mut rt = b.runtime();
    let absolute = rt.create_instance(obj, 50.0, 50.0, None);
    let relative = rt.create_instance(obj, 20.0, 30.0, None);
    call(&mut rt, "path_start", &[path, 10, 0, 1], absolute);
    call(&mut rt, "path_start", &[path, 10, 0, 0], relative);
    assert_eq!((rt.instances[&absolute].x, rt.instances[&absolute].y), (0.0, 0.0));
    assert_eq!((rt.instances[&relative].x, rt.instances[&relative].y), (20.0, 30.0));

    rt.step();
    assert!((rt.instances[&absolute].x - 10.0).abs() < 1e-9);
    assert!((rt.instances[&relative].x - 30.0).abs() < 1e-9);
    assert_eq!(rt.instances[&relative].y, 30.0);

    call(&mut rt, "path_end", &[], absolute);
    assert_eq!(rt.instances[&absolute].path_index, -1);
}

#[test]
fn test_collision_queries() {
    let mut b = GameBuilder::new();
    let spr = b.sprite("spr_wall", 16, 16);
    let wall = b.object("obj_wall");
    b.object_mut(wall).sprite = spr;
    let probe = b.object("obj_probe");

    let mut rt = b.runtime();
    let w = rt.create_instance(wall, 0.0, 0.0, None);
    let p = rt.create_instance(probe, 100.0, 100.0, None);

    assert_eq!(call(&mut rt, "collision_point", &[8, 8, wall, 0, 0], p), Value::from(w));
    assert_eq!(call(&mut rt, "collision_point", &[40, 40, wall, 0, 0], p), Value::NOONE);
    assert_eq!(
        call(&mut rt, "collision_rectangle", &[20, 20, 15, 15, wall, 0, 0], p),
        Value::from(w)
    );
    // notme excludes the caller itself.
    assert_eq!(call(&mut rt, "collision_point", &[8, 8, wall, 0, 1], w), Value::NOONE);
}

#[test]
fn test_room_builtins() {
    let mut b = GameBuilder::new();
    let obj = b.object("obj_door");
    b.room("rm_one", 64, 64);
    b.room("rm_two", 64, 64);

    let mut rt = b.runtime();
    rt.initialize().unwrap();
    rt.step();
    let id = rt.create_instance(obj, 0.0, 0.0, None);
    assert_eq!(call(&mut rt, "room_exists", &[1], id), Value::ONE);
    assert_eq!(call(&mut rt, "room_exists", &[9], id), Value::ZERO);
    call(&mut rt, "room_goto_next", &[], id);
    rt.step();
    assert_eq!(rt.room_index, 1);
    assert_eq!(rt.get_global_builtin("room"), Value::ONE);
}
