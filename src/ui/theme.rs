use crate::memory::image::RegionKind;
use ratatui::style::Color;

pub struct Theme {
    pub fg: Color,
    pub primary: Color,   // Blue
    pub secondary: Color, // Orange
    pub comment: Color,   // Grey
    pub success: Color,   // Green
    pub error: Color,     // Red
    pub border_focused: Color,
    pub border_normal: Color,
    pub current_line_bg: Color,
    pub buffer: Color,
    pub sentinel: Color,
    pub padding: Color,
    pub frame_pointer: Color,
    pub return_slot: Color,
}

impl Theme {
    /// Color a region is drawn in
    pub fn region(&self, kind: RegionKind) -> Color {
        match kind {
            RegionKind::Buffer => self.buffer,
            RegionKind::Sentinel => self.sentinel,
            RegionKind::Padding => self.padding,
            RegionKind::FramePointer => self.frame_pointer,
            RegionKind::ReturnSlot => self.return_slot,
        }
    }
}

pub const DEFAULT_THEME: Theme = Theme {
    fg: Color::Rgb(205, 214, 244),
    primary: Color::Rgb(137, 180, 250),   // Blue
    secondary: Color::Rgb(250, 179, 135), // Orange
    comment: Color::Rgb(108, 112, 134),
    success: Color::Rgb(166, 227, 161),
    error: Color::Rgb(243, 139, 168),
    border_focused: Color::Rgb(249, 226, 175), // Yellow border for focus
    border_normal: Color::Rgb(108, 112, 134),  // Grey border for normal
    current_line_bg: Color::Rgb(50, 50, 70),
    buffer: Color::Rgb(137, 180, 250),        // Blue
    sentinel: Color::Rgb(243, 139, 168),      // Red
    padding: Color::Rgb(108, 112, 134),       // Grey
    frame_pointer: Color::Rgb(148, 226, 213), // Teal
    return_slot: Color::Rgb(245, 194, 231),   // Pink
};
