//! Regions pane: every named cell of the frame with its current value

use crate::memory::image::{MemoryImage, Region, RegionKind};
use crate::memory::layout::MemoryLayout;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Render the regions pane
pub fn render_regions_pane(
    frame: &mut Frame,
    area: Rect,
    layout: &MemoryLayout,
    image: &MemoryImage,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let border_style = if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    };

    let block = Block::default()
        .title(" Regions ")
        .borders(Borders::ALL)
        .border_style(border_style);

    let items: Vec<ListItem> = layout
        .regions()
        .iter()
        .rev()
        .map(|region| ListItem::new(region_line(layout, image, region)))
        .collect();

    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    if items.len() > visible_height {
        *scroll_offset = (*scroll_offset).min(items.len() - visible_height);
    } else {
        *scroll_offset = 0;
    }

    let visible: Vec<ListItem> = items
        .into_iter()
        .skip(*scroll_offset)
        .take(visible_height)
        .collect();
    frame.render_widget(List::new(visible).block(block), area);
}

fn region_line(layout: &MemoryLayout, image: &MemoryImage, region: &Region) -> Line<'static> {
    let addr = image.address_of(region);
    let color = DEFAULT_THEME.region(region.kind);
    let mut spans = vec![
        Span::styled(
            format!("0x{:012x} ", addr),
            Style::default().fg(DEFAULT_THEME.comment),
        ),
        Span::styled(
            format!("{:<20}", region.name),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{:>3} B  ", region.len),
            Style::default().fg(DEFAULT_THEME.comment),
        ),
    ];

    let value = match region.kind {
        RegionKind::Sentinel => layout.read_sentinel(image).ok().map(|v| v.to_string()),
        RegionKind::FramePointer | RegionKind::ReturnSlot => image
            .read_u64(addr, layout.byte_order())
            .ok()
            .map(|v| format!("0x{:x}", v)),
        RegionKind::Buffer => image
            .read(addr, region.len)
            .ok()
            .map(|bytes| format!("\"{}\"", preview(bytes))),
        RegionKind::Padding => None,
    };
    if let Some(value) = value {
        let intact = layout
            .return_slots()
            .iter()
            .find(|slot| slot.region.offset == region.offset)
            .map(|slot| image.read_u64(addr, layout.byte_order()).ok() == Some(slot.expected));
        let style = match intact {
            Some(false) => Style::default().fg(DEFAULT_THEME.error),
            Some(true) => Style::default().fg(DEFAULT_THEME.success),
            None => Style::default().fg(DEFAULT_THEME.fg),
        };
        spans.push(Span::styled(value, style));
    }
    Line::from(spans)
}

/// Printable prefix of a buffer up to its first nul, escaped
fn preview(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end]
        .iter()
        .flat_map(|&b| std::ascii::escape_default(b))
        .map(char::from)
        .collect()
}
