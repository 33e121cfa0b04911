//! Seam between the simulation and whatever puts pixels on screen.
//!
//! The runtime only ever talks to a [`Renderer`]. Texture decode and batching
//! live behind it; the crate ships [`HeadlessRenderer`], which records every
//! call for tests and for headless runs.

use crate::game_data::RoomTile;
use log::trace;

/// Room-space rectangle mapped onto a window-space port.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewRect {
    pub view_x: i32,
    pub view_y: i32,
    pub view_w: i32,
    pub view_h: i32,
    pub port_x: i32,
    pub port_y: i32,
    pub port_w: i32,
    pub port_h: i32,
}

/// Per-sprite transform and tint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteStyle {
    pub xscale: f64,
    pub yscale: f64,
    pub angle: f64,
    pub blend: i32,
    pub alpha: f64,
}

impl Default for SpriteStyle {
    fn default() -> Self {
        SpriteStyle {
            xscale: 1.0,
            yscale: 1.0,
            angle: 0.0,
            blend: 0xFF_FFFF,
            alpha: 1.0,
        }
    }
}

/// Immediate-mode state set by the `draw_set_*` builtins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawState {
    pub color: i32,
    pub alpha: f64,
    pub font: i32,
    /// 0 left, 1 centre, 2 right
    pub halign: i32,
    /// 0 top, 1 middle, 2 bottom
    pub valign: i32,
}

impl Default for DrawState {
    fn default() -> Self {
        DrawState {
            color: 0,
            alpha: 1.0,
            font: -1,
            halign: 0,
            valign: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SetView(ViewRect),
    Clear(i32),
    Sprite {
        sprite: i32,
        frame: i32,
        x: f64,
        y: f64,
        style: SpriteStyle,
    },
    Background {
        background: i32,
        x: f64,
        y: f64,
        tile_x: bool,
        tile_y: bool,
    },
    Tile {
        background: i32,
        x: i32,
        y: i32,
        depth: i32,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        state: DrawState,
    },
    Rectangle {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        outline: bool,
        color: i32,
    },
}

/// Drawing operations available to the runtime and to draw builtins.
///
/// Calls are fire-and-forget: a backend that fails to draw something logs it
/// and carries on, so none of these return errors.
pub trait Renderer {
    /// Called once before any view of a frame is drawn.
    fn begin_frame(&mut self) {}

    fn set_view(&mut self, view: ViewRect);

    fn clear(&mut self, color: i32);

    fn draw_sprite(&mut self, sprite: i32, frame: i32, x: f64, y: f64, style: SpriteStyle);

    fn draw_background(&mut self, background: i32, x: f64, y: f64, tile_x: bool, tile_y: bool);

    fn draw_tile(&mut self, tile: &RoomTile);

    fn draw_text(&mut self, x: f64, y: f64, text: &str, state: &DrawState);

    fn draw_rectangle(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, outline: bool, state: &DrawState);

    /// Width and height of `text` in pixels with the given font.
    fn measure_string(&self, text: &str, font: i32) -> (f64, f64);

    /// Commands captured since the last `begin_frame`, for backends that keep them.
    fn recorded(&self) -> &[DrawCommand] {
        &[]
    }
}

/// Fixed-cell text metrics used when no font atlas is available.
const CHAR_WIDTH: f64 = 8.0;
const LINE_HEIGHT: f64 = 16.0;

/// Records draw calls without displaying them.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    commands: Vec<DrawCommand>,
    frames: u64,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn push(&mut self, command: DrawCommand) {
        trace!("Headless: {:?}", command);
        self.commands.push(command);
    }
}

impl Renderer for HeadlessRenderer {
    fn begin_frame(&mut self) {
        // Keep only the current frame.
        self.commands.clear();
        self.frames += 1;
    }

    fn set_view(&mut self, view: ViewRect) {
        self.push(DrawCommand::SetView(view));
    }

    fn clear(&mut self, color: i32) {
        self.push(DrawCommand::Clear(color));
    }

    fn draw_sprite(&mut self, sprite: i32, frame: i32, x: f64, y: f64, style: SpriteStyle) {
        self.push(DrawCommand::Sprite {
            sprite,
            frame,
            x,
            y,
            style,
        });
    }

    fn draw_background(&mut self, background: i32, x: f64, y: f64, tile_x: bool, tile_y: bool) {
        self.push(DrawCommand::Background {
            background,
            x,
            y,
            tile_x,
            tile_y,
        });
    }

    fn draw_tile(&mut self, tile: &RoomTile) {
        self.push(DrawCommand::Tile {
            background: tile.background,
            x: tile.x,
            y: tile.y,
            depth: tile.depth,
        });
    }

    fn draw_text(&mut self, x: f64, y: f64, text: &str, state: &DrawState) {
        self.push(DrawCommand::Text {
            x,
            y,
            text: text.to_string(),
            state: *state,
        });
    }

    fn draw_rectangle(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, outline: bool, state: &DrawState) {
        self.push(DrawCommand::Rectangle {
            x1,
            y1,
            x2,
            y2,
            outline,
            color: state.color,
        });
    }

    fn measure_string(&self, text: &str, _font: i32) -> (f64, f64) {
        let lines: Vec<&str> = text.split('\n').collect();
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        (widest as f64 * CHAR_WIDTH, lines.len() as f64 * LINE_HEIGHT)
    }

    fn recorded(&self) -> &[DrawCommand] {
        &self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_headless_records_calls_in_order() {
        let mut r = HeadlessRenderer::new();
        r.clear(0x102030);
        r.draw_sprite(3, 1, 10.0, 20.0, SpriteStyle::default());
        r.draw_text(0.0, 0.0, "hi", &DrawState::default());
        assert_eq!(r.recorded().len(), 3);
        assert_eq!(r.recorded()[0], DrawCommand::Clear(0x102030));
        assert!(matches!(r.recorded()[1], DrawCommand::Sprite { sprite: 3, frame: 1, .. }));
    }

    #[test]
    fn test_begin_frame_drops_previous_frame() {
        let mut r = HeadlessRenderer::new();
        r.begin_frame();
        r.clear(0);
        r.draw_rectangle(0.0, 0.0, 4.0, 4.0, false, &DrawState::default());
        r.begin_frame();
        r.clear(0);
        assert_eq!(r.recorded(), &[DrawCommand::Clear(0)]);
        assert_eq!(r.frames(), 2);
    }

    #[test]
    fn test_measure_string_uses_fixed_cells() {
        let r = HeadlessRenderer::new();
        assert_eq!(r.measure_string("abc", -1), (24.0, 16.0));
        assert_eq!(r.measure_string("ab\nabcd", -1), (32.0, 32.0));
    }
}
