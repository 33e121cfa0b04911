//! Immutable snapshot of everything loaded from a game archive.
//!
//! Every cross-table index is either -1 or a valid index into the matching table.

use crate::error::FormResult;
use crate::form::FormReader;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Gen8Info {
    pub bytecode_version: u8,
    pub game_name: String,
    pub display_name: String,
    pub game_id: i32,
    pub window_width: i32,
    pub window_height: i32,
    pub room_order: Vec<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TexturePageItem {
    pub source_x: u16,
    pub source_y: u16,
    pub source_width: u16,
    pub source_height: u16,
    pub target_x: u16,
    pub target_y: u16,
    pub target_width: u16,
    pub target_height: u16,
    pub bounding_width: u16,
    pub bounding_height: u16,
    pub texture_page: u16,
}

/// Location of one embedded PNG inside the backing buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TexturePage {
    pub png_offset: usize,
    pub png_length: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Sprite {
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub margin_left: i32,
    pub margin_right: i32,
    pub margin_top: i32,
    pub margin_bottom: i32,
    pub origin_x: i32,
    pub origin_y: i32,
    /// One texture item per animation frame, -1 where the pointer did not resolve.
    pub frames: Vec<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct Background {
    pub name: String,
    pub texture_item: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathPoint {
    pub x: f32,
    pub y: f32,
    pub speed: f32,
}

#[derive(Debug, Clone, Default)]
pub struct PathData {
    pub name: String,
    pub smooth: bool,
    pub closed: bool,
    pub precision: i32,
    pub points: Vec<PathPoint>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Glyph {
    pub character: u16,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub shift: u16,
    pub offset: u16,
}

#[derive(Debug, Clone, Default)]
pub struct Font {
    pub name: String,
    pub display_name: String,
    pub em_size: i32,
    pub texture_item: i32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub glyphs: Vec<Glyph>,
}

/// One compiled script or event body.
#[derive(Debug, Clone, Default)]
pub struct CodeEntry {
    pub name: String,
    pub locals_count: u16,
    pub arguments_count: u16,
    /// Absolute file offset of the first bytecode byte.
    pub bytecode_offset: usize,
    pub bytecode: Vec<u8>,
}

impl CodeEntry {
    pub fn bytecode_len(&self) -> usize {
        self.bytecode.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventAction {
    pub code_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct EventEntry {
    pub subtype: i32,
    pub actions: Vec<EventAction>,
}

#[derive(Debug, Clone, Default)]
pub struct GameObject {
    pub name: String,
    pub sprite: i32,
    pub visible: bool,
    pub solid: bool,
    pub depth: i32,
    pub persistent: bool,
    /// -1 for a root object.
    pub parent: i32,
    pub mask: i32,
    /// Indexed by event type, each holding the subtypes this object defines.
    pub events: Vec<Vec<EventEntry>>,
}

impl GameObject {
    pub fn find_event(&self, event_type: usize, subtype: i32) -> Option<&EventEntry> {
        self.events
            .get(event_type)
            .and_then(|list| list.iter().find(|e| e.subtype == subtype))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoomBackground {
    pub enabled: bool,
    pub foreground: bool,
    pub background: i32,
    pub x: i32,
    pub y: i32,
    pub tile_x: bool,
    pub tile_y: bool,
    pub speed_x: i32,
    pub speed_y: i32,
    pub stretch: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomView {
    pub enabled: bool,
    pub view_x: i32,
    pub view_y: i32,
    pub view_w: i32,
    pub view_h: i32,
    pub port_x: i32,
    pub port_y: i32,
    pub port_w: i32,
    pub port_h: i32,
    pub border_h: i32,
    pub border_v: i32,
    pub speed_h: i32,
    pub speed_v: i32,
    pub follow_object: i32,
}

#[derive(Debug, Clone, Default)]
pub struct RoomInstance {
    pub x: i32,
    pub y: i32,
    pub object: i32,
    pub instance_id: i32,
    pub creation_code: i32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub color: i32,
    pub rotation: f32,
}

#[derive(Debug, Clone, Default)]
pub struct RoomTile {
    pub x: i32,
    pub y: i32,
    pub background: i32,
    pub source_x: i32,
    pub source_y: i32,
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    pub instance_id: i32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub color: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Room {
    pub name: String,
    pub caption: String,
    pub width: i32,
    pub height: i32,
    pub speed: i32,
    pub persistent: bool,
    pub bg_color: i32,
    pub draw_bg_color: bool,
    pub creation_code: i32,
    pub flags: i32,
    pub backgrounds: Vec<RoomBackground>,
    pub views: Vec<RoomView>,
    pub instances: Vec<RoomInstance>,
    pub tiles: Vec<RoomTile>,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub name: String,
    pub code_id: i32,
}

/// Variable table entry. The occurrence fields seed reference resolution.
#[derive(Debug, Clone, Default)]
pub struct Variable {
    pub name: String,
    pub instance_type: i32,
    pub var_id: i32,
    pub occurrences: i32,
    pub first_occurrence: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Function {
    pub name: String,
    pub occurrences: i32,
    pub first_occurrence: i32,
}

#[derive(Debug, Clone, Default)]
pub struct GameData {
    pub gen8: Gen8Info,
    pub strings: Vec<String>,
    pub texture_items: Vec<TexturePageItem>,
    pub texture_pages: Vec<TexturePage>,
    pub sprites: Vec<Sprite>,
    pub backgrounds: Vec<Background>,
    pub paths: Vec<PathData>,
    pub fonts: Vec<Font>,
    pub code: Vec<CodeEntry>,
    pub objects: Vec<GameObject>,
    pub rooms: Vec<Room>,
    pub scripts: Vec<Script>,
    pub variables: Vec<Variable>,
    pub functions: Vec<Function>,
    /// Raw archive bytes, kept for lazy asset decode.
    pub buffer: Vec<u8>,
}

impl GameData {
    /// Load and parse an archive from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> FormResult<GameData> {
        let mut file = File::open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        GameData::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> FormResult<GameData> {
        FormReader::new(bytes).read()
    }

    /// Raw PNG bytes of a texture page.
    pub fn texture_page_bytes(&self, page: usize) -> Option<&[u8]> {
        let p = self.texture_pages.get(page)?;
        self.buffer.get(p.png_offset..p.png_offset + p.png_length)
    }

    pub fn object(&self, index: i32) -> Option<&GameObject> {
        usize::try_from(index).ok().and_then(|i| self.objects.get(i))
    }

    pub fn sprite(&self, index: i32) -> Option<&Sprite> {
        usize::try_from(index).ok().and_then(|i| self.sprites.get(i))
    }

    pub fn room(&self, index: i32) -> Option<&Room> {
        usize::try_from(index).ok().and_then(|i| self.rooms.get(i))
    }

    pub fn path(&self, index: i32) -> Option<&PathData> {
        usize::try_from(index).ok().and_then(|i| self.paths.get(i))
    }

    pub fn code_name(&self, code_id: i32) -> &str {
        usize::try_from(code_id)
            .ok()
            .and_then(|i| self.code.get(i))
            .map(|c| c.name.as_str())
            .unwrap_or("<invalid>")
    }

    pub fn object_name(&self, index: i32) -> &str {
        self.object(index).map(|o| o.name.as_str()).unwrap_or("<none>")
    }

    pub fn room_by_name(&self, name: &str) -> Option<i32> {
        self.rooms.iter().position(|r| r.name == name).map(|i| i as i32)
    }

    pub fn object_by_name(&self, name: &str) -> Option<i32> {
        self.objects.iter().position(|o| o.name == name).map(|i| i as i32)
    }

    pub fn script_code(&self, name: &str) -> Option<i32> {
        self.scripts.iter().find(|s| s.name == name).map(|s| s.code_id)
    }

    /// Resolve a room selector given as a name or a numeric index.
    pub fn resolve_room(&self, selector: &str) -> Option<i32> {
        match selector.parse::<i32>() {
            Ok(index) if self.room(index).is_some() => Some(index),
            Ok(_) => None,
            Err(_) => self.room_by_name(selector),
        }
    }

    /// Room entered at startup: the first entry of the room order, or room 0.
    pub fn first_room(&self) -> i32 {
        self.gen8.room_order.first().copied().unwrap_or(0)
    }
}
