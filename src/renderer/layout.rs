//! Screen layout
//!
//! Maps the percentage playfield onto terminal cells and resolves clicks
//! back to items. Nothing here touches the terminal.

use crate::consts::*;
use crate::sim::{Item, ItemId, ItemKind};

/// Rows reserved above the playfield (HUD + snowman progress)
pub const HUD_ROWS: u16 = 2;
/// Rows reserved below the playfield (controls hint)
pub const FOOTER_ROWS: u16 = 1;
/// Width of an item sprite in cells
pub const SPRITE_WIDTH: u16 = 3;

/// Smallest terminal we lay out properly
pub const MIN_WIDTH: u16 = 40;
pub const MIN_HEIGHT: u16 = 16;

/// Cell rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub fn right(&self) -> u16 {
        self.x + self.w.saturating_sub(1)
    }

    pub fn bottom(&self) -> u16 {
        self.y + self.h.saturating_sub(1)
    }

    pub fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.x && col <= self.right() && row >= self.y && row <= self.bottom()
    }
}

/// Terminal layout for one frame size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u16,
    pub height: u16,
    /// Bordered box around the playfield
    pub frame: Rect,
    /// Interior cells items are drawn in
    pub field: Rect,
}

impl Layout {
    pub fn new(width: u16, height: u16) -> Self {
        let width = width.max(MIN_WIDTH);
        let height = height.max(MIN_HEIGHT);
        let frame = Rect {
            x: 0,
            y: HUD_ROWS,
            w: width,
            h: height - HUD_ROWS - FOOTER_ROWS,
        };
        let field = Rect {
            x: frame.x + 1,
            y: frame.y + 1,
            w: frame.w - 2,
            h: frame.h - 2,
        };
        Self {
            width,
            height,
            frame,
            field,
        }
    }

    /// Row of the footer line
    pub fn footer_row(&self) -> u16 {
        self.height - 1
    }

    fn percent_to_col(&self, x: f32) -> u16 {
        let span = f32::from(self.field.w.saturating_sub(1));
        let offset = (x.clamp(0.0, 100.0) / 100.0 * span).round() as u16;
        self.field.x + offset
    }

    fn percent_to_row(&self, y: f32) -> u16 {
        let span = f32::from(self.field.h.saturating_sub(1));
        let offset = (y.clamp(0.0, 100.0) / 100.0 * span).round() as u16;
        self.field.y + offset
    }

    /// Cell of an item's centre, or None while it is off the field
    pub fn item_cell(&self, item: &Item) -> Option<(u16, u16)> {
        if item.y < 0.0 || item.y > DESPAWN_Y {
            return None;
        }
        Some((self.percent_to_col(item.x), self.percent_to_row(item.y)))
    }

    /// Leftmost column of an item sprite centred on `col`, kept inside the field
    pub fn sprite_col(&self, col: u16) -> u16 {
        let half = SPRITE_WIDTH / 2;
        col.saturating_sub(half)
            .clamp(self.field.x, self.field.right().saturating_sub(SPRITE_WIDTH - 1))
    }

    /// First and last rows of the auto-collect band
    pub fn band_rows(&self) -> (u16, u16) {
        (
            self.percent_to_row(AUTO_COLLECT_TOP),
            self.percent_to_row(AUTO_COLLECT_BOTTOM),
        )
    }

    /// The item under a click, if any.
    ///
    /// A click hits a sprite's cells or the row just above or below it. When
    /// several items qualify the nearest one wins, then the lowest on screen.
    pub fn item_at(&self, items: &[Item], col: u16, row: u16) -> Option<ItemId> {
        if !self.field.contains(col, row) {
            return None;
        }
        items
            .iter()
            .filter_map(|item| {
                let (c, r) = self.item_cell(item)?;
                let left = self.sprite_col(c);
                let right = left + SPRITE_WIDTH - 1;
                let dc = if col < left {
                    left - col
                } else if col > right {
                    col - right
                } else {
                    0
                };
                let dr = r.abs_diff(row);
                (dc == 0 && dr <= 1).then_some((dr, item))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.y.total_cmp(&a.1.y)))
            .map(|(_, item)| item.id)
    }
}

/// Three-cell sprite for an item
pub fn sprite(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Snowball => "(O)",
        ItemKind::Coal => "<@>",
        ItemKind::Carrot => "=->",
        ItemKind::Hat => "_H_",
        ItemKind::Scarf => "~S~",
    }
}

/// Display name for an item
pub fn label(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Snowball => "Snowball",
        ItemKind::Coal => "Coal",
        ItemKind::Carrot => "Carrot",
        ItemKind::Hat => "Hat",
        ItemKind::Scarf => "Scarf",
    }
}

/// Column that centres `text` within `width`
pub fn centered(width: u16, text: &str) -> u16 {
    (width / 2).saturating_sub(text.chars().count() as u16 / 2)
}
