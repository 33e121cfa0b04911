//! Asset chunks: strings, general info, textures, sprites, backgrounds, paths, fonts.

use crate::error::FormResult;
use crate::form::{Chunk, FormReader};
use crate::game_data::{
    Background, Font, Gen8Info, Glyph, PathData, PathPoint, Sprite, TexturePage,
    TexturePageItem,
};
use log::debug;

impl FormReader {
    pub(crate) fn parse_strg(&mut self, chunk: Chunk) -> FormResult<Vec<String>> {
        let pointers = self.pointer_list(chunk.data_offset)?;
        let mut strings = Vec::with_capacity(pointers.len());
        for (i, ptr) in pointers.into_iter().enumerate() {
            self.strings_by_offset.insert(ptr, i);
            strings.push(self.string_at(ptr)?);
        }
        debug!("STRG: {} strings", strings.len());
        Ok(strings)
    }

    pub(crate) fn parse_gen8(&self, chunk: Chunk) -> FormResult<Gen8Info> {
        let d = chunk.data_offset;
        let room_count = self.u32_at(d + 0x80)? as usize;
        self.bytes_at(d + 0x84, room_count.saturating_mul(4))?;
        let room_order = (0..room_count)
            .map(|i| self.i32_at(d + 0x84 + i * 4))
            .collect::<FormResult<Vec<_>>>()?;

        let info = Gen8Info {
            bytecode_version: self.u8_at(d + 1)?,
            game_name: self.string_ref_at(d + 0x28)?,
            display_name: self.string_ref_at(d + 0x64)?,
            game_id: self.i32_at(d + 0x14)?,
            window_width: self.i32_at(d + 0x3C)?,
            window_height: self.i32_at(d + 0x40)?,
            room_order,
        };
        debug!(
            "GEN8: '{}' bytecode {} window {}x{}, {} rooms in order",
            info.game_name,
            info.bytecode_version,
            info.window_width,
            info.window_height,
            info.room_order.len()
        );
        Ok(info)
    }

    pub(crate) fn parse_tpag(&mut self, chunk: Chunk) -> FormResult<Vec<TexturePageItem>> {
        let pointers = self.pointer_list(chunk.data_offset)?;
        let mut items = Vec::with_capacity(pointers.len());
        for (i, ptr) in pointers.into_iter().enumerate() {
            self.tpag_by_offset.insert(ptr, i as i32);
            let f = |n: usize| self.u16_at(ptr + n * 2);
            items.push(TexturePageItem {
                source_x: f(0)?,
                source_y: f(1)?,
                source_width: f(2)?,
                source_height: f(3)?,
                target_x: f(4)?,
                target_y: f(5)?,
                target_width: f(6)?,
                target_height: f(7)?,
                bounding_width: f(8)?,
                bounding_height: f(9)?,
                texture_page: f(10)?,
            });
        }
        debug!("TPAG: {} items", items.len());
        Ok(items)
    }

    pub(crate) fn parse_txtr(&self, chunk: Chunk) -> FormResult<Vec<TexturePage>> {
        let offsets = self
            .pointer_list(chunk.data_offset)?
            .into_iter()
            .map(|ptr| self.ptr_at(ptr + 4))
            .collect::<FormResult<Vec<_>>>()?;

        let pages = offsets
            .iter()
            .enumerate()
            .map(|(i, &png_offset)| {
                let end = offsets.get(i + 1).copied().unwrap_or_else(|| chunk.end());
                TexturePage {
                    png_offset,
                    png_length: end.saturating_sub(png_offset),
                }
            })
            .collect::<Vec<_>>();
        debug!("TXTR: {} texture pages", pages.len());
        Ok(pages)
    }

    fn tpag_index(&self, ptr: usize) -> i32 {
        self.tpag_by_offset.get(&ptr).copied().unwrap_or(-1)
    }

    pub(crate) fn parse_sprt(&self, chunk: Chunk) -> FormResult<Vec<Sprite>> {
        let mut sprites = Vec::new();
        for ptr in self.pointer_list(chunk.data_offset)? {
            let name = self.string_ref_at(ptr)?;
            let frames = self.degrade("frame list", &name, self.sprite_frames(ptr + 0x38));
            sprites.push(Sprite {
                name,
                width: self.i32_at(ptr + 4)?,
                height: self.i32_at(ptr + 8)?,
                margin_left: self.i32_at(ptr + 0x0C)?,
                margin_right: self.i32_at(ptr + 0x10)?,
                margin_bottom: self.i32_at(ptr + 0x14)?,
                margin_top: self.i32_at(ptr + 0x18)?,
                origin_x: self.i32_at(ptr + 0x30)?,
                origin_y: self.i32_at(ptr + 0x34)?,
                frames,
            });
        }
        debug!("SPRT: {} sprites", sprites.len());
        Ok(sprites)
    }

    fn sprite_frames(&self, list: usize) -> FormResult<Vec<i32>> {
        Ok(self
            .pointer_list(list)?
            .into_iter()
            .map(|p| self.tpag_index(p))
            .collect())
    }

    pub(crate) fn parse_bgnd(&self, chunk: Chunk) -> FormResult<Vec<Background>> {
        let mut backgrounds = Vec::new();
        for ptr in self.pointer_list(chunk.data_offset)? {
            backgrounds.push(Background {
                name: self.string_ref_at(ptr)?,
                texture_item: self.tpag_index(self.ptr_at(ptr + 0x10)?),
            });
        }
        debug!("BGND: {} backgrounds", backgrounds.len());
        Ok(backgrounds)
    }

    pub(crate) fn parse_path(&self, chunk: Chunk) -> FormResult<Vec<PathData>> {
        let mut paths = Vec::new();
        for ptr in self.pointer_list(chunk.data_offset)? {
            let name = self.string_ref_at(ptr)?;
            let points = self.degrade("point list", &name, self.path_points(ptr + 16));
            paths.push(PathData {
                name,
                smooth: self.bool_at(ptr + 4)?,
                closed: self.bool_at(ptr + 8)?,
                precision: self.i32_at(ptr + 12)?,
                points,
            });
        }
        debug!("PATH: {} paths", paths.len());
        Ok(paths)
    }

    /// Inline list: count, then 12-byte (x, y, speed) records.
    fn path_points(&self, list: usize) -> FormResult<Vec<PathPoint>> {
        let count = self.u32_at(list)? as usize;
        self.bytes_at(list + 4, count.saturating_mul(12))?;
        (0..count)
            .map(|j| {
                let p = list + 4 + j * 12;
                Ok(PathPoint {
                    x: self.f32_at(p)?,
                    y: self.f32_at(p + 4)?,
                    speed: self.f32_at(p + 8)?,
                })
            })
            .collect()
    }

    pub(crate) fn parse_font(&self, chunk: Chunk) -> FormResult<Vec<Font>> {
        let mut fonts = Vec::new();
        for ptr in self.pointer_list(chunk.data_offset)? {
            let name = self.string_ref_at(ptr)?;
            let glyphs = self.degrade("glyph list", &name, self.font_glyphs(ptr + 40));
            fonts.push(Font {
                display_name: self.string_ref_at(ptr + 4)?,
                em_size: self.i32_at(ptr + 8)?,
                texture_item: self.tpag_index(self.ptr_at(ptr + 28)?),
                scale_x: self.f32_at(ptr + 32)?,
                scale_y: self.f32_at(ptr + 36)?,
                glyphs,
                name,
            });
        }
        debug!("FONT: {} fonts", fonts.len());
        Ok(fonts)
    }

    fn font_glyphs(&self, list: usize) -> FormResult<Vec<Glyph>> {
        self.pointer_list(list)?
            .into_iter()
            .map(|g| {
                Ok(Glyph {
                    character: self.u16_at(g)?,
                    x: self.u16_at(g + 2)?,
                    y: self.u16_at(g + 4)?,
                    width: self.u16_at(g + 6)?,
                    height: self.u16_at(g + 8)?,
                    shift: self.u16_at(g + 10)?,
                    offset: self.u16_at(g + 12)?,
                })
            })
            .collect()
    }
}
