// Builders for synthetic games used by the unit tests.
use crate::assembler::{set_link, Assembled, Assembler};
use crate::config::RuntimeConfig;
use crate::game_data::{
    CodeEntry, EventAction, EventEntry, Function, GameData, GameObject, PathData, PathPoint, Room, RoomInstance,
    Script, Sprite, Variable,
};
use crate::instruction::instance_type;
use crate::renderer::HeadlessRenderer;
use crate::runtime::Runtime;

/// Where the first code entry lands in the fake file.
const CODE_BASE: usize = 0x1000;

/// Assembles a [`GameData`] in memory, threading reference chains the way
/// the archive stores them so decoding and resolution run for real.
pub struct GameBuilder {
    pub game: GameData,
    code: Vec<Assembled>,
}

impl GameBuilder {
    pub fn new() -> Self {
        let mut game = GameData::default();
        game.gen8.game_id = 7;
        game.gen8.window_width = 640;
        game.gen8.window_height = 480;
        game.gen8.display_name = "Test".to_string();
        GameBuilder {
            game,
            code: Vec::new(),
        }
    }

    /// Variable table index for `name`, defaulting to instance scope.
    pub fn var(&mut self, name: &str) -> usize {
        self.var_typed(name, instance_type::SELF)
    }

    pub fn local(&mut self, name: &str) -> usize {
        self.var_typed(name, instance_type::LOCAL)
    }

    pub fn global(&mut self, name: &str) -> usize {
        self.var_typed(name, instance_type::GLOBAL)
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

    /// Add a code entry from whatever the assembler holds.
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

    /// Sprite whose box covers `w` x `h` pixels from the origin at its top-left.
    pub fn sprite(&mut self, name: &str, w: i32, h: i32) -> i32 {
        self.game.sprites.push(Sprite {
            name: name.to_string(),
            width: w,
            height: h,
            margin_right: w,
            margin_bottom: h,
            frames: vec![0, 1, 2],
            ..Default::default()
        });
        self.game.sprites.len() as i32 - 1
    }

    pub fn object(&mut self, name: &str) -> i32 {
        self.game.objects.push(GameObject {
            name: name.to_string(),
            sprite: -1,
            visible: true,
            parent: -1,
            mask: -1,
            ..Default::default()
        });
        self.game.objects.len() as i32 - 1
    }

    pub fn object_mut(&mut self, index: i32) -> &mut GameObject {
        &mut self.game.objects[index as usize]
    }

    pub fn event(&mut self, object: i32, event_type: usize, subtype: i32, code_id: i32) {
        let events = &mut self.object_mut(object).events;
        if events.len() <= event_type {
            events.resize(event_type + 1, Vec::new());
        }
        events[event_type].push(EventEntry {
            subtype,
            actions: vec![EventAction { code_id }],
        });
    }

    pub fn room(&mut self, name: &str, w: i32, h: i32) -> i32 {
        self.game.rooms.push(Room {
            name: name.to_string(),
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

    pub fn place(&mut self, room: i32, object: i32, x: i32, y: i32) {
        self.room_mut(room).instances.push(RoomInstance {
            x,
            y,
            object,
            instance_id: -1,
            creation_code: -1,
            scale_x: 1.0,
            scale_y: 1.0,
            ..Default::default()
        });
    }

    pub fn path(&mut self, name: &str, points: &[(f32, f32)], closed: bool) -> i32 {
        self.game.paths.push(PathData {
            name: name.to_string(),
            closed,
            points: points.iter().map(|&(x, y)| PathPoint { x, y, speed: 100.0 }).collect(),
            ..Default::default()
        });
        self.game.paths.len() as i32 - 1
    }

    /// Lay the bytecode out at increasing offsets and thread every occurrence chain.
    pub fn build(mut self) -> GameData {
        let mut offset = CODE_BASE;
        let mut bases = Vec::new();
        for (entry, asm) in self.game.code.iter_mut().zip(&self.code) {
            entry.bytecode_offset = offset;
            entry.bytecode = asm.bytes.clone();
            bases.push(offset);
            offset += asm.bytes.len() + 0x100;
        }

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

        let code = &mut self.game.code;
        let mut thread = |sites: &[(usize, usize)]| -> (i32, i32) {
            for pair in sites.windows(2) {
                let (e1, a1) = pair[0];
                let (e2, a2) = pair[1];
                let delta = (bases[e2] + a2) - (bases[e1] + a1);
                set_link(&mut code[e1].bytecode, a1, delta as u32);
            }
            match sites.first() {
                Some(&(e, a)) => ((bases[e] + a) as i32, sites.len() as i32),
                None => (-1, 0),
            }
        };
        for (v, sites) in self.game.variables.iter_mut().zip(&var_sites) {
            (v.first_occurrence, v.occurrences) = thread(sites);
        }
        for (f, sites) in self.game.functions.iter_mut().zip(&func_sites) {
            (f.first_occurrence, f.occurrences) = thread(sites);
        }
        self.game
    }

    /// A runtime over the built game with a seeded generator and a headless renderer.
    pub fn runtime(self) -> Runtime {
        let config = RuntimeConfig {
            rng_seed: Some(1),
            ..Default::default()
        };
        Runtime::new(self.build(), config, Box::new(HeadlessRenderer::new()))
    }
}
