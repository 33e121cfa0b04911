//! World chunks: object definitions with their event tables, and room templates.
//!
//! Both formats use several levels of pointer indirection. A nested list that
//! cannot be read is replaced with an empty list and a warning; the record
//! headers themselves are required.

use crate::error::FormResult;
use crate::form::{Chunk, FormReader};
use crate::game_data::{
    EventAction, EventEntry, GameObject, Room, RoomBackground, RoomInstance, RoomTile, RoomView,
};
use log::{debug, warn};

impl FormReader {
    /// Code id for an action. The raw value is either a CODE record pointer or
    /// already a code index; anything else becomes -1.
    pub(crate) fn action_code(&self, raw: i32) -> i32 {
        let Ok(p) = usize::try_from(raw) else {
            return -1;
        };
        if let Some(&id) = self.code_by_offset.get(&p) {
            return id;
        }
        if p < self.code_by_offset.len() {
            return raw;
        }
        warn!("event action refers to code {:#x}, which is not a code entry", raw);
        -1
    }

    /// Creation code references must map to a CODE record; anything else is -1.
    fn creation_code(&self, raw: i32) -> i32 {
        if raw < 0 {
            return -1;
        }
        self.code_by_offset.get(&(raw as usize)).copied().unwrap_or(-1)
    }

    pub(crate) fn parse_objt(&self, chunk: Chunk) -> FormResult<Vec<GameObject>> {
        let mut objects = Vec::new();
        for ptr in self.pointer_list(chunk.data_offset)? {
            let name = self.string_ref_at(ptr)?;
            // Physics shape vertices (two f32 each) sit between the header and the events.
            let vertex_count = self.u32_at(ptr + 0x40)? as usize;
            let events_start = ptr + 0x50 + vertex_count.saturating_mul(8);
            let events = self.degrade("event table", &name, self.object_events(events_start));

            objects.push(GameObject {
                sprite: self.i32_at(ptr + 4)?,
                visible: self.bool_at(ptr + 8)?,
                solid: self.bool_at(ptr + 0x0C)?,
                depth: self.i32_at(ptr + 0x10)?,
                persistent: self.bool_at(ptr + 0x14)?,
                parent: self.i32_at(ptr + 0x18)?,
                mask: self.i32_at(ptr + 0x1C)?,
                events,
                name,
            });
        }
        debug!("OBJT: {} objects", objects.len());
        Ok(objects)
    }

    /// category list -> sub-event list -> (subtype, action list) -> action record
    fn object_events(&self, start: usize) -> FormResult<Vec<Vec<EventEntry>>> {
        let mut categories = Vec::new();
        for category in self.pointer_list(start)? {
            let mut entries = Vec::new();
            for event in self.pointer_list(category)? {
                let actions = self
                    .pointer_list(event + 4)?
                    .into_iter()
                    .map(|action| {
                        Ok(EventAction {
                            code_id: self.action_code(self.i32_at(action + 0x20)?),
                        })
                    })
                    .collect::<FormResult<Vec<_>>>()?;
                entries.push(EventEntry {
                    subtype: self.i32_at(event)?,
                    actions,
                });
            }
            categories.push(entries);
        }
        Ok(categories)
    }

    pub(crate) fn parse_room(&self, chunk: Chunk) -> FormResult<Vec<Room>> {
        let mut rooms = Vec::new();
        for ptr in self.pointer_list(chunk.data_offset)? {
            let name = self.string_ref_at(ptr)?;
            let backgrounds = self.degrade(
                "background list",
                &name,
                self.ptr_at(ptr + 0x28).and_then(|l| self.room_backgrounds(l)),
            );
            let views = self.degrade(
                "view list",
                &name,
                self.ptr_at(ptr + 0x2C).and_then(|l| self.room_views(l)),
            );
            let instances = self.degrade(
                "instance list",
                &name,
                self.ptr_at(ptr + 0x30).and_then(|l| self.room_instances(l)),
            );
            let tiles = self.degrade(
                "tile list",
                &name,
                self.ptr_at(ptr + 0x34).and_then(|l| self.room_tiles(l)),
            );

            rooms.push(Room {
                caption: self.string_ref_at(ptr + 4)?,
                width: self.i32_at(ptr + 8)?,
                height: self.i32_at(ptr + 0x0C)?,
                speed: self.i32_at(ptr + 0x10)?,
                persistent: self.bool_at(ptr + 0x14)?,
                bg_color: self.i32_at(ptr + 0x18)?,
                draw_bg_color: self.bool_at(ptr + 0x1C)?,
                creation_code: self.creation_code(self.i32_at(ptr + 0x20)?),
                flags: self.i32_at(ptr + 0x24)?,
                backgrounds,
                views,
                instances,
                tiles,
                name,
            });
        }
        debug!("ROOM: {} rooms", rooms.len());
        Ok(rooms)
    }

    fn room_backgrounds(&self, list: usize) -> FormResult<Vec<RoomBackground>> {
        self.pointer_list(list)?
            .into_iter()
            .map(|p| {
                Ok(RoomBackground {
                    enabled: self.bool_at(p)?,
                    foreground: self.bool_at(p + 4)?,
                    background: self.i32_at(p + 8)?,
                    x: self.i32_at(p + 12)?,
                    y: self.i32_at(p + 16)?,
                    tile_x: self.bool_at(p + 20)?,
                    tile_y: self.bool_at(p + 24)?,
                    speed_x: self.i32_at(p + 28)?,
                    speed_y: self.i32_at(p + 32)?,
                    stretch: self.bool_at(p + 36)?,
                })
            })
            .collect()
    }

    fn room_views(&self, list: usize) -> FormResult<Vec<RoomView>> {
        self.pointer_list(list)?
            .into_iter()
            .map(|p| {
                let f = |n: usize| self.i32_at(p + n * 4);
                Ok(RoomView {
                    enabled: f(0)? != 0,
                    view_x: f(1)?,
                    view_y: f(2)?,
                    view_w: f(3)?,
                    view_h: f(4)?,
                    port_x: f(5)?,
                    port_y: f(6)?,
                    port_w: f(7)?,
                    port_h: f(8)?,
                    border_h: f(9)?,
                    border_v: f(10)?,
                    speed_h: f(11)?,
                    speed_v: f(12)?,
                    follow_object: f(13)?,
                })
            })
            .collect()
    }

    fn room_instances(&self, list: usize) -> FormResult<Vec<RoomInstance>> {
        self.pointer_list(list)?
            .into_iter()
            .map(|p| {
                Ok(RoomInstance {
                    x: self.i32_at(p)?,
                    y: self.i32_at(p + 4)?,
                    object: self.i32_at(p + 8)?,
                    instance_id: self.i32_at(p + 12)?,
                    creation_code: self.creation_code(self.i32_at(p + 16)?),
                    scale_x: self.f32_at(p + 20)?,
                    scale_y: self.f32_at(p + 24)?,
                    color: self.i32_at(p + 28)?,
                    rotation: self.f32_at(p + 32)?,
                })
            })
            .collect()
    }

    fn room_tiles(&self, list: usize) -> FormResult<Vec<RoomTile>> {
        self.pointer_list(list)?
            .into_iter()
            .map(|p| {
                Ok(RoomTile {
                    x: self.i32_at(p)?,
                    y: self.i32_at(p + 4)?,
                    background: self.i32_at(p + 8)?,
                    source_x: self.i32_at(p + 12)?,
                    source_y: self.i32_at(p + 16)?,
                    width: self.i32_at(p + 20)?,
                    height: self.i32_at(p + 24)?,
                    depth: self.i32_at(p + 28)?,
                    instance_id: self.i32_at(p + 32)?,
                    scale_x: self.f32_at(p + 36)?,
                    scale_y: self.f32_at(p + 40)?,
                    color: self.i32_at(p + 44)?,
                })
            })
            .collect()
    }
}
