// src/tui/inner.rs  -  ratatui layout
use anyhow::Result;
use crossterm::{execute, terminal::{self, EnterAlternateScreen, LeaveAlternateScreen}};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use crate::AppState;
use std::io::stdout;

pub struct Tui {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
}

impl Tui {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen)?;
        let backend  = CrosstermBackend::new(out);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    pub fn cleanup(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
    }

    pub fn draw(&mut self, s: &AppState) -> Result<()> {
        self.terminal.draw(|f| {
            let area = f.area();
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),  // header / settings
                    Constraint::Min(6),     // scanned tokens
                    Constraint::Length(4),  // live buffer + status
                    Constraint::Length(3),  // footer hints
                ])
                .split(area);

            // ── Header ────────────────────────────────────────────────────
            let header = Paragraph::new(format!(
                " scan-wedge  |  {}  |  {}  window {}ms  phase {}  |  {} scans",
                s.source, s.mode, s.window_ms, s.phase, s.scans
            ))
            .style(Style::default().fg(Color::Black).bg(Color::Cyan)
                   .add_modifier(Modifier::BOLD));
            f.render_widget(header, chunks[0]);

            // ── Tokens (newest at the bottom, clipped to the block) ───────
            let rows = chunks[1].height.saturating_sub(2) as usize;
            let skip = s.tokens.len().saturating_sub(rows);
            let token_lines: Vec<Line> = s.tokens.iter().skip(skip)
                .map(|(at, tok)| Line::from(vec![
                    Span::styled(format!("{at:>9}  "), Style::default().fg(Color::DarkGray)),
                    Span::styled(tok.clone(), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                ]))
                .collect();
            let token_block = Paragraph::new(token_lines)
                .block(Block::default()
                    .title(" SCANNED ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Green)));
            f.render_widget(token_block, chunks[1]);

            // ── Buffer + status ───────────────────────────────────────────
            let live_lines: Vec<Line> = vec![
                Line::from(vec![
                    Span::styled("BUFFER:  ", Style::default().fg(Color::DarkGray)),
                    Span::styled(s.pending.clone(), Style::default().fg(Color::Cyan)),
                ]),
                Line::from(vec![
                    Span::styled("STATUS:  ", Style::default().fg(Color::DarkGray)),
                    Span::styled(s.status.clone(), Style::default().fg(Color::Magenta)),
                ]),
            ];
            let live_block = Paragraph::new(live_lines)
                .block(Block::default()
                    .title(" INPUT ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow)));
            f.render_widget(live_block, chunks[2]);

            // ── Footer ────────────────────────────────────────────────────
            let footer_text = if s.demo {
                " DEMO MODE: a simulated scanner types codes   you can type too   Esc = exit"
            } else if s.text_mode {
                " Scan into this terminal   Esc = quit"
            } else {
                " Scanner device active   Q = quit   Esc = quit"
            };
            let footer = Paragraph::new(footer_text)
                .style(Style::default().fg(Color::DarkGray).bg(Color::Black));
            f.render_widget(footer, chunks[3]);
        })?;
        Ok(())
    }
}
