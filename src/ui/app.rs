//! Main TUI application state and logic

use crate::exercise::driver::{RunReport, Termination};
use crate::snapshot::Snapshot;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

/// Which pane is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Memory,
    Regions,
    Terminal,
}

impl FocusedPane {
    /// Move focus to the next pane (memory -> regions -> terminal)
    pub fn next(self) -> Self {
        match self {
            FocusedPane::Memory => FocusedPane::Regions,
            FocusedPane::Regions => FocusedPane::Terminal,
            FocusedPane::Terminal => FocusedPane::Memory,
        }
    }

    /// Move focus to the previous pane
    pub fn prev(self) -> Self {
        match self {
            FocusedPane::Memory => FocusedPane::Terminal,
            FocusedPane::Regions => FocusedPane::Memory,
            FocusedPane::Terminal => FocusedPane::Regions,
        }
    }
}

/// The main application state
pub struct App {
    /// The finished run being inspected
    pub report: RunReport,

    /// Index of the snapshot on screen
    pub position: usize,

    pub focused_pane: FocusedPane,

    /// Per-pane scroll offsets
    pub memory_scroll: usize,
    pub regions_scroll: usize,
    pub terminal_scroll: usize,

    pub should_quit: bool,
}

impl App {
    pub fn new(report: RunReport) -> Self {
        App {
            report,
            position: 0,
            focused_pane: FocusedPane::Memory,
            memory_scroll: 0,
            regions_scroll: 0,
            terminal_scroll: 0,
            should_quit: false,
        }
    }

    /// Run the TUI application
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }
        }

        Ok(())
    }

    fn current(&self) -> Option<&Snapshot> {
        self.report.snapshots.get(self.position)
    }

    fn previous(&self) -> Option<&Snapshot> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.report.snapshots.get(i))
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(size);

        // Left: memory dump | Right: regions over terminal
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(main_chunks[0]);

        let right_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(columns[1]);

        let Some(snapshot) = self.current() else {
            return;
        };
        let previous = self.previous().map(|p| &p.image);

        let mut memory_scroll = self.memory_scroll;
        let mut regions_scroll = self.regions_scroll;
        let mut terminal_scroll = self.terminal_scroll;

        super::panes::render_memory_pane(
            frame,
            columns[0],
            &snapshot.image,
            previous,
            self.focused_pane == FocusedPane::Memory,
            &mut memory_scroll,
        );

        super::panes::render_regions_pane(
            frame,
            right_rows[0],
            &self.report.layout,
            &snapshot.image,
            self.focused_pane == FocusedPane::Regions,
            &mut regions_scroll,
        );

        super::panes::render_terminal_pane(
            frame,
            right_rows[1],
            &snapshot.terminal,
            self.focused_pane == FocusedPane::Terminal,
            &mut terminal_scroll,
        );

        super::panes::render_status_bar(
            frame,
            main_chunks[1],
            super::panes::StatusRenderData {
                exercise: &self.report.exercise,
                phase: snapshot.phase,
                note: &snapshot.note,
                current_step: self.position,
                total_steps: self.report.snapshots.len(),
                crashed: matches!(self.report.termination, Termination::Crashed(_)),
            },
        );

        self.memory_scroll = memory_scroll;
        self.regions_scroll = regions_scroll;
        self.terminal_scroll = terminal_scroll;
    }

    /// Handle keyboard events
    fn handle_key_event(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
            }
            KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.prev();
            }
            KeyCode::Left => self.step_backward(),
            KeyCode::Right => self.step_forward(),
            KeyCode::Enter => {
                self.position = self.report.snapshots.len().saturating_sub(1);
                self.terminal_scroll = usize::MAX;
            }
            KeyCode::Backspace => {
                self.position = 0;
                self.terminal_scroll = usize::MAX;
            }
            KeyCode::Up => {
                let scroll = self.focused_scroll();
                *scroll = scroll.saturating_sub(1);
            }
            KeyCode::Down => {
                let scroll = self.focused_scroll();
                *scroll = scroll.saturating_add(1);
            }
            _ => {}
        }
    }

    fn focused_scroll(&mut self) -> &mut usize {
        match self.focused_pane {
            FocusedPane::Memory => &mut self.memory_scroll,
            FocusedPane::Regions => &mut self.regions_scroll,
            FocusedPane::Terminal => &mut self.terminal_scroll,
        }
    }

    /// Step forward through the snapshots
    pub fn step_forward(&mut self) {
        if self.position + 1 < self.report.snapshots.len() {
            self.position += 1;
            // Auto-scroll terminal to bottom
            self.terminal_scroll = usize::MAX;
        }
    }

    /// Step backward through the snapshots
    pub fn step_backward(&mut self) {
        if self.position > 0 {
            self.position -= 1;
            self.terminal_scroll = usize::MAX;
        }
    }
}
