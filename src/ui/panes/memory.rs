//! Memory pane: hex dump of the activation record
//!
//! One row per 8-byte slot, lowest address at the top. Bytes are colored by
//! the region they belong to; bytes that differ from the previous snapshot are
//! drawn bold on a highlighted background.

use crate::memory::image::MemoryImage;
use crate::memory::POINTER_SIZE;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Render the memory pane
pub fn render_memory_pane(
    frame: &mut Frame,
    area: Rect,
    image: &MemoryImage,
    previous: Option<&MemoryImage>,
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
        .title(" Stack Frame ")
        .borders(Borders::ALL)
        .border_style(border_style);

    let changed = previous.map(|p| p.diff(image)).unwrap_or_default();
    let rows = hex_rows(image, &changed);

    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    if rows.len() > visible_height {
        *scroll_offset = (*scroll_offset).min(rows.len() - visible_height);
    } else {
        *scroll_offset = 0;
    }

    let items: Vec<ListItem> = rows
        .into_iter()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(ListItem::new)
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

/// Build the dump lines. `changed` holds offsets to highlight.
pub fn hex_rows(image: &MemoryImage, changed: &[usize]) -> Vec<Line<'static>> {
    let bytes = image.bytes();
    let mut rows = Vec::with_capacity(bytes.len().div_ceil(POINTER_SIZE));

    for (row, chunk) in bytes.chunks(POINTER_SIZE).enumerate() {
        let start = row * POINTER_SIZE;
        let mut spans = vec![Span::styled(
            format!("0x{:012x}  ", image.base() + start as u64),
            Style::default().fg(DEFAULT_THEME.comment),
        )];

        for (i, byte) in chunk.iter().enumerate() {
            let offset = start + i;
            let mut style = match image.region_at(offset) {
                Some(region) => Style::default().fg(DEFAULT_THEME.region(region.kind)),
                None => Style::default().fg(DEFAULT_THEME.fg),
            };
            if changed.binary_search(&offset).is_ok() {
                style = style
                    .bg(DEFAULT_THEME.current_line_bg)
                    .add_modifier(Modifier::BOLD);
            }
            spans.push(Span::styled(format!("{:02x} ", byte), style));
        }

        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        spans.push(Span::styled(
            format!(" {:<8}", ascii),
            Style::default().fg(DEFAULT_THEME.comment),
        ));

        let labels: Vec<&str> = image
            .regions()
            .iter()
            .filter(|r| r.offset >= start && r.offset < start + chunk.len())
            .map(|r| r.name.as_str())
            .collect();
        if !labels.is_empty() {
            spans.push(Span::styled(
                format!("  ← {}", labels.join(", ")),
                Style::default().fg(DEFAULT_THEME.secondary),
            ));
        }

        rows.push(Line::from(spans));
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::config::ExerciseConfig;
    use crate::memory::layout::MemoryLayout;

    #[test]
    fn test_one_row_per_slot() {
        let layout = MemoryLayout::new(&ExerciseConfig::hw1_level1());
        let image = layout.instantiate();
        let rows = hex_rows(&image, &[]);
        assert_eq!(rows.len(), layout.size() / POINTER_SIZE);

        let first: String = rows[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(first.starts_with(&format!("0x{:012x}", layout.base())));
        assert!(first.ends_with("← buffer"));
    }
}
