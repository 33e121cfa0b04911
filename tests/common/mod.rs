//! Writes small but complete FORM archives for the integration tests.
//!
//! Tables are described with the crate's own [`GameData`] types and code is
//! produced by the [`Assembler`]; [`ArchiveBuilder::build`] lays everything
//! out with absolute pointers and threads the variable and function
//! occurrence chains through the bytecode it places.

#![allow(dead_code)]

use gmlrun::assembler::{set_link, Assembled, Assembler};
use gmlrun::game_data::{
    CodeEntry, EventAction, EventEntry, Function, GameData, GameObject, PathData, PathPoint,
    Room, RoomInstance, Script, Sprite, Variable,
};
use gmlrun::instruction::instance_type;
use std::collections::HashMap;

/// Growing output buffer; every position is an absolute file offset.
struct Out {
    bytes: Vec<u8>,
}

impl Out {
    fn pos(&self) -> usize {
        self.bytes.len()
    }

    fn u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.u32(v as u32);
    }

    fn f32(&mut self, v: f32) {
        self.u32(v.to_bits());
    }

    fn bool(&mut self, v: bool) {
        self.u32(v as u32);
    }

    fn zeros(&mut self, n: usize) {
        self.bytes.resize(self.bytes.len() + n, 0);
    }

    fn patch(&mut self, at: usize, v: u32) {
        self.bytes[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Count plus `n` empty pointer slots. Returns the offset of the first slot.
    fn pointer_slots(&mut self, n: usize) -> usize {
        self.u32(n as u32);
        let first = self.pos();
        self.zeros(n * 4);
        first
    }

    /// Point slot `i` of a pointer list at the current position.
    fn fill_slot(&mut self, first: usize, i: usize) {
        let here = self.pos() as u32;
        self.patch(first + i * 4, here);
    }

    fn begin_chunk(&mut self, tag: &[u8; 4]) -> usize {
        self.bytes.extend_from_slice(tag);
        let size_at = self.pos();
        self.u32(0);
        size_at
    }

    fn end_chunk(&mut self, size_at: usize) {
        let size = (self.pos() - size_at - 4) as u32;
        self.patch(size_at, size);
    }

    fn empty_chunk(&mut self, tag: &[u8; 4]) {
        let at = self.begin_chunk(tag);
        self.u32(0);
        self.end_chunk(at);
    }
}

/// Fixed-size record filled by field offset before it is written out.
struct Record(Vec<u8>);

impl Record {
    fn new(size: usize) -> Self {
        Record(vec![0; size])
    }

    fn set(&mut self, offset: usize, v: u32) -> &mut Self {
        self.0[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
        self
    }

    fn set_i32(&mut self, offset: usize, v: i32) -> &mut Self {
        self.set(offset, v as u32)
    }
}

pub struct ArchiveBuilder {
    pub game: GameData,
    code: Vec<Assembled>,
}

impl ArchiveBuilder {
    pub fn new(name: &str) -> Self {
        let mut game = GameData::default();
        game.gen8.bytecode_version = 16;
        game.gen8.game_name = name.to_string();
        game.gen8.display_name = format!("{} (test)", name);
        game.gen8.game_id = 4242;
        game.gen8.window_width = 320;
        game.gen8.window_height = 240;
        ArchiveBuilder {
            game,
            code: Vec::new(),
        }
    }

    pub fn var_typed(&mut self, name: &str, inst_type: i32) -> usize {
        if let Some(i) = self
            .game
            .variables
            .iter()
            .position(|v| v.name == name && v.instance_type == inst_type)
        {
            return i;
        }
        let index = self.game.variables.len();
        self.game.variables.push(Variable {
            name: name.to_string(),
            instance_type: inst_type,
            var_id: index as i32,
            occurrences: 0,
            first_occurrence: -1,
        });
        index
    }

    pub fn var(&mut self, name: &str) -> usize {
        self.var_typed(name, instance_type::SELF)
    }

    pub fn global(&mut self, name: &str) -> usize {
        self.var_typed(name, instance_type::GLOBAL)
    }

    pub fn func(&mut self, name: &str) -> usize {
        if let Some(i) = self.game.functions.iter().position(|f| f.name == name) {
            return i;
        }
        self.game.functions.push(Function {
            name: name.to_string(),
            occurrences: 0,
            first_occurrence: -1,
        });
        self.game.functions.len() - 1
    }

    pub fn string(&mut self, s: &str) -> i32 {
        self.game.strings.push(s.to_string());
        self.game.strings.len() as i32 - 1
    }

    pub fn code(&mut self, name: &str, asm: &mut Assembler) -> i32 {
        self.code.push(asm.assemble());
        self.game.code.push(CodeEntry {
            name: name.to_string(),
            ..Default::default()
        });
        self.game.code.len() as i32 - 1
    }

    pub fn script(&mut self, name: &str, asm: &mut Assembler) -> i32 {
        let code_id = self.code(&format!("gml_Script_{}", name), asm);
        self.game.scripts.push(Script {
            name: name.to_string(),
            code_id,
        });
        code_id
    }

    pub fn sprite(&mut self, name: &str, w: i32, h: i32) -> i32 {
        self.game.sprites.push(Sprite {
            name: name.to_string(),
            width: w,
            height: h,
            margin_right: w,
            margin_bottom: h,
            ..Default::default()
        });
        self.game.sprites.len() as i32 - 1
    }

    pub fn object(&mut self, name: &str, sprite: i32, parent: i32) -> i32 {
        self.game.objects.push(GameObject {
            name: name.to_string(),
            sprite,
            visible: true,
            parent,
            mask: -1,
            ..Default::default()
        });
        self.game.objects.len() as i32 - 1
    }

    pub fn event(&mut self, object: i32, event_type: usize, subtype: i32, code_id: i32) {
        let events = &mut self.game.objects[object as usize].events;
        if events.len() <= event_type {
            events.resize(event_type + 1, Vec::new());
        }
        events[event_type].push(EventEntry {
            subtype,
            actions: vec![EventAction { code_id }],
        });
    }

    pub fn path(&mut self, name: &str, points: &[(f32, f32)], closed: bool) -> i32 {
        self.game.paths.push(PathData {
            name: name.to_string(),
            closed,
            precision: 4,
            points: points
                .iter()
                .map(|&(x, y)| PathPoint { x, y, speed: 100.0 })
                .collect(),
            ..Default::default()
        });
        self.game.paths.len() as i32 - 1
    }

    pub fn room(&mut self, name: &str, w: i32, h: i32) -> i32 {
        self.game.rooms.push(Room {
            name: name.to_string(),
            caption: format!("{} caption", name),
            width: w,
            height: h,
            speed: 30,
            creation_code: -1,
            ..Default::default()
        });
        let index = self.game.rooms.len() as i32 - 1;
        self.game.gen8.room_order.push(index);
        index
    }

    pub fn room_mut(&mut self, index: i32) -> &mut Room {
        &mut self.game.rooms[index as usize]
    }

    pub fn place(&mut self, room: i32, object: i32, x: i32, y: i32, instance_id: i32) {
        self.room_mut(room).instances.push(RoomInstance {
            x,
            y,
            object,
            instance_id,
            creation_code: -1,
            scale_x: 1.0,
            scale_y: 1.0,
            color: -1,
            rotation: 0.0,
        });
    }

    /// Every string the archive needs, user strings first so their indices hold.
    fn string_table(&self) -> Vec<String> {
        let g = &self.game;
        let mut all = g.strings.clone();
        let names = [g.gen8.game_name.clone(), g.gen8.display_name.clone()]
            .into_iter()
            .chain(g.sprites.iter().map(|s| s.name.clone()))
            .chain(g.paths.iter().map(|p| p.name.clone()))
            .chain(g.code.iter().map(|c| c.name.clone()))
            .chain(g.objects.iter().map(|o| o.name.clone()))
            .chain(g.rooms.iter().flat_map(|r| [r.name.clone(), r.caption.clone()]))
            .chain(g.scripts.iter().map(|s| s.name.clone()))
            .chain(g.variables.iter().map(|v| v.name.clone()))
            .chain(g.functions.iter().map(|f| f.name.clone()));
        for name in names {
            if !name.is_empty() && !all.contains(&name) {
                all.push(name);
            }
        }
        all
    }

    pub fn build(mut self) -> Vec<u8> {
        let mut out = Out {
            bytes: b"FORM".to_vec(),
        };
        out.u32(0);

        // STRG: entries are (u32 len, bytes, NUL); references point past the length.
        let table = self.string_table();
        let mut refs: HashMap<String, u32> = HashMap::new();
        let at = out.begin_chunk(b"STRG");
        let slots = out.pointer_slots(table.len());
        for (i, s) in table.iter().enumerate() {
            out.fill_slot(slots, i);
            out.u32(s.len() as u32);
            refs.insert(s.clone(), out.pos() as u32);
            out.bytes.extend_from_slice(s.as_bytes());
            out.u8(0);
        }
        out.end_chunk(at);
        let sref = |s: &str| refs.get(s).copied().unwrap_or(0);

        let gen8 = self.game.gen8.clone();
        let at = out.begin_chunk(b"GEN8");
        let mut rec = Record::new(0x80);
        rec.0[1] = gen8.bytecode_version;
        rec.set_i32(0x14, gen8.game_id)
            .set(0x28, sref(&gen8.game_name))
            .set_i32(0x3C, gen8.window_width)
            .set_i32(0x40, gen8.window_height)
            .set(0x64, sref(&gen8.display_name));
        out.bytes.extend_from_slice(&rec.0);
        out.u32(gen8.room_order.len() as u32);
        for &r in &gen8.room_order {
            out.i32(r);
        }
        out.end_chunk(at);

        out.empty_chunk(b"TPAG");
        out.empty_chunk(b"TXTR");

        let at = out.begin_chunk(b"SPRT");
        let slots = out.pointer_slots(self.game.sprites.len());
        for (i, s) in self.game.sprites.iter().enumerate() {
            out.fill_slot(slots, i);
            let mut rec = Record::new(0x38);
            rec.set(0, sref(&s.name))
                .set_i32(4, s.width)
                .set_i32(8, s.height)
                .set_i32(0x0C, s.margin_left)
                .set_i32(0x10, s.margin_right)
                .set_i32(0x14, s.margin_bottom)
                .set_i32(0x18, s.margin_top)
                .set_i32(0x30, s.origin_x)
                .set_i32(0x34, s.origin_y);
            out.bytes.extend_from_slice(&rec.0);
            // No texture items, so no frames.
            out.u32(0);
        }
        out.end_chunk(at);

        out.empty_chunk(b"BGND");

        let at = out.begin_chunk(b"PATH");
        let slots = out.pointer_slots(self.game.paths.len());
        for (i, p) in self.game.paths.iter().enumerate() {
            out.fill_slot(slots, i);
            out.u32(sref(&p.name));
            out.bool(p.smooth);
            out.bool(p.closed);
            out.i32(p.precision);
            out.u32(p.points.len() as u32);
            for pt in &p.points {
                out.f32(pt.x);
                out.f32(pt.y);
                out.f32(pt.speed);
            }
        }
        out.end_chunk(at);

        out.empty_chunk(b"FONT");

        // CODE: pointer list, 16-byte records, then the bytecode blobs.
        let at = out.begin_chunk(b"CODE");
        let count = self.game.code.len();
        let slots = out.pointer_slots(count);
        let records_at = out.pos();
        let mut blob_at = Vec::with_capacity(count);
        let mut next = records_at + count * 16;
        for asm in &self.code {
            blob_at.push(next);
            next += asm.bytes.len();
        }
        let blobs = self.thread_references(&blob_at);
        let mut code_record = Vec::with_capacity(count);
        for (i, entry) in self.game.code.iter().enumerate() {
            out.fill_slot(slots, i);
            let ptr = out.pos();
            code_record.push(ptr as i32);
            out.u32(sref(&entry.name));
            out.u32(blobs[i].len() as u32);
            out.u16(entry.locals_count);
            out.u16(entry.arguments_count);
            out.i32(blob_at[i] as i32 - (ptr as i32 + 12));
        }
        for blob in &blobs {
            out.bytes.extend_from_slice(blob);
        }
        out.end_chunk(at);

        let at = out.begin_chunk(b"OBJT");
        let slots = out.pointer_slots(self.game.objects.len());
        for (i, o) in self.game.objects.iter().enumerate() {
            out.fill_slot(slots, i);
            let mut rec = Record::new(0x50);
            rec.set(0, sref(&o.name))
                .set_i32(4, o.sprite)
                .set(8, o.visible as u32)
                .set(0x0C, o.solid as u32)
                .set_i32(0x10, o.depth)
                .set(0x14, o.persistent as u32)
                .set_i32(0x18, o.parent)
                .set_i32(0x1C, o.mask);
            out.bytes.extend_from_slice(&rec.0);

            let categories = out.pointer_slots(o.events.len());
            for (c, entries) in o.events.iter().enumerate() {
                out.fill_slot(categories, c);
                let events = out.pointer_slots(entries.len());
                for (e, entry) in entries.iter().enumerate() {
                    out.fill_slot(events, e);
                    out.i32(entry.subtype);
                    let actions = out.pointer_slots(entry.actions.len());
                    for (a, action) in entry.actions.iter().enumerate() {
                        out.fill_slot(actions, a);
                        let mut rec = Record::new(0x24);
                        rec.set_i32(0x20, action.code_id);
                        out.bytes.extend_from_slice(&rec.0);
                    }
                }
            }
        }
        out.end_chunk(at);

        let creation = |id: i32| {
            usize::try_from(id)
                .ok()
                .and_then(|i| code_record.get(i))
                .copied()
                .unwrap_or(-1)
        };
        let at = out.begin_chunk(b"ROOM");
        let slots = out.pointer_slots(self.game.rooms.len());
        for (i, r) in self.game.rooms.iter().enumerate() {
            out.fill_slot(slots, i);
            let ptr = out.pos();
            let mut rec = Record::new(0x38);
            rec.set(0, sref(&r.name))
                .set(4, sref(&r.caption))
                .set_i32(8, r.width)
                .set_i32(0x0C, r.height)
                .set_i32(0x10, r.speed)
                .set(0x14, r.persistent as u32)
                .set_i32(0x18, r.bg_color)
                .set(0x1C, r.draw_bg_color as u32)
                .set_i32(0x20, creation(r.creation_code))
                .set_i32(0x24, r.flags);
            out.bytes.extend_from_slice(&rec.0);

            out.patch(ptr + 0x28, out.pos() as u32);
            out.u32(0);

            out.patch(ptr + 0x2C, out.pos() as u32);
            let views = out.pointer_slots(r.views.len());
            for (v, view) in r.views.iter().enumerate() {
                out.fill_slot(views, v);
                for field in [
                    view.enabled as i32,
                    view.view_x,
                    view.view_y,
                    view.view_w,
                    view.view_h,
                    view.port_x,
                    view.port_y,
                    view.port_w,
                    view.port_h,
                    view.border_h,
                    view.border_v,
                    view.speed_h,
                    view.speed_v,
                    view.follow_object,
                ] {
                    out.i32(field);
                }
            }

            out.patch(ptr + 0x30, out.pos() as u32);
            let placements = out.pointer_slots(r.instances.len());
            for (p, inst) in r.instances.iter().enumerate() {
                out.fill_slot(placements, p);
                out.i32(inst.x);
                out.i32(inst.y);
                out.i32(inst.object);
                out.i32(inst.instance_id);
                out.i32(creation(inst.creation_code));
                out.f32(inst.scale_x);
                out.f32(inst.scale_y);
                out.i32(inst.color);
                out.f32(inst.rotation);
            }

            out.patch(ptr + 0x34, out.pos() as u32);
            out.u32(0);
        }
        out.end_chunk(at);

        let at = out.begin_chunk(b"SCPT");
        let slots = out.pointer_slots(self.game.scripts.len());
        for (i, s) in self.game.scripts.iter().enumerate() {
            out.fill_slot(slots, i);
            out.u32(sref(&s.name));
            out.i32(s.code_id);
        }
        out.end_chunk(at);

        let at = out.begin_chunk(b"VARI");
        out.u32(self.game.variables.len() as u32);
        out.u32(self.game.variables.len() as u32);
        out.u32(0);
        for v in &self.game.variables {
            out.u32(sref(&v.name));
            out.i32(v.instance_type);
            out.i32(v.var_id);
            out.i32(v.occurrences);
            out.i32(v.first_occurrence);
        }
        out.end_chunk(at);

        let at = out.begin_chunk(b"FUNC");
        out.u32(self.game.functions.len() as u32);
        for f in &self.game.functions {
            out.u32(sref(&f.name));
            out.i32(f.occurrences);
            out.i32(f.first_occurrence);
        }
        out.end_chunk(at);

        let total = out.pos() as u32 - 8;
        out.patch(4, total);
        out.bytes
    }

    /// Thread each variable and function chain through the blobs placed at
    /// `blob_at`, recording first occurrences and counts in the tables.
    fn thread_references(&mut self, blob_at: &[usize]) -> Vec<Vec<u8>> {
        let mut blobs: Vec<Vec<u8>> = self.code.iter().map(|a| a.bytes.clone()).collect();
        let mut var_sites: Vec<Vec<(usize, usize)>> = vec![Vec::new(); self.game.variables.len()];
        let mut func_sites: Vec<Vec<(usize, usize)>> = vec![Vec::new(); self.game.functions.len()];
        for (entry, asm) in self.code.iter().enumerate() {
            for &(at, var) in &asm.variable_refs {
                var_sites[var].push((entry, at));
            }
            for &(at, func) in &asm.function_refs {
                func_sites[func].push((entry, at));
            }
        }

        let mut thread = |sites: &[(usize, usize)]| -> (i32, i32) {
            for pair in sites.windows(2) {
                let (e1, a1) = pair[0];
                let (e2, a2) = pair[1];
                let delta = (blob_at[e2] + a2) - (blob_at[e1] + a1);
                set_link(&mut blobs[e1], a1, delta as u32);
            }
            match sites.first() {
                Some(&(e, a)) => ((blob_at[e] + a) as i32, sites.len() as i32),
                None => (-1, 0),
            }
        };
        for (v, sites) in self.game.variables.iter_mut().zip(&var_sites) {
            (v.first_occurrence, v.occurrences) = thread(sites);
        }
        for (f, sites) in self.game.functions.iter_mut().zip(&func_sites) {
            (f.first_occurrence, f.occurrences) = thread(sites);
        }
        blobs
    }
}
