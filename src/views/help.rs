// Help dialog view showing keybindings

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const HELP: &[(&str, &str)] = &[
    ("", "Global"),
    ("  H,?,F1", "Open in-app help"),
    ("  f", "Toggle fullscreen"),
    ("  Tab", "Switch focus between open views"),
    ("  Q", "Quit the program"),
    ("  q", "Quit the active view"),
    ("", ""),
    ("", "Timeline"),
    ("  k,<Up>,<,,", "Move selection cursor up one commit"),
    ("  j,<Down>,>,.", "Move selection cursor down one commit"),
    ("  C-b,PgUp", "Scroll up one page"),
    ("  C-f,PgDn", "Scroll down one page"),
    ("  gg,Home", "Jump to first line in the current view"),
    ("  G,End", "Jump to last line in the current view"),
    ("  Enter,Space", "Open a diff view of the selected commit"),
    ("  t", "Open a tree view of the selected commit"),
    ("  /", "Open prompt to enter timeline search"),
    ("  n", "Find next commit matching the current search term"),
    ("  N", "Find previous commit matching the current search term"),
    ("", ""),
    ("", "Diff"),
    ("  k,<Up>", "Scroll up one line of diff output"),
    ("  j,<Down>", "Scroll down one line of diff output"),
    ("  c", "Toggle coloured diff output"),
    ("  i", "Toggle inversion of diff output"),
    ("  v", "Toggle verbosity of diff output"),
    ("  w", "Toggle ignore whitespace-only changes in diff"),
    ("  -,_", "Decrease the number of context lines"),
    ("  +,=", "Increase the number of context lines"),
    ("  C-j,J,>,.", "Display diff of next commit in the timeline"),
    ("  C-k,K,<,,", "Display diff of previous commit in the timeline"),
    ("", ""),
    ("", "Tree"),
    ("  l,Enter,<Right>", "Move into the selected directory"),
    ("  h,<BS>,<Left>", "Return to the parent directory"),
    ("  i", "Toggle display of file artifact hashes"),
    ("  t", "Display timeline of all commits modifying the selected entry"),
    ("", ""),
    ("", "Blame"),
    ("  b", "Blame the version of the file in the selected line's commit"),
    ("  p", "Blame the selected line's commit's primary parent"),
    ("  B,<BS>", "Return to the previously blamed version"),
    ("  Enter", "Open a diff view of the selected line's commit"),
    ("", ""),
    ("", "Navigate this dialog with j/k, Space/PgUp/PgDn, Home/End;"),
    ("", "close with q or Esc."),
];

/// Scroll state of the help popup.
#[derive(Debug, Default)]
pub struct HelpOverlay {
    scroll: usize,
}

/// What a keystroke inside the help dialog did.
pub enum HelpOutcome {
    Open,
    Closed,
}

impl HelpOverlay {
    pub fn handle_key(&mut self, key: KeyEvent, page: usize) -> HelpOutcome {
        let max = HELP.len().saturating_sub(1);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return HelpOutcome::Closed,
            KeyCode::Down | KeyCode::Char('j') => self.scroll = (self.scroll + 1).min(max),
            KeyCode::Up | KeyCode::Char('k') => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::PageDown | KeyCode::Char(' ') => {
                self.scroll = (self.scroll + page.max(1)).min(max)
            }
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(page.max(1)),
            KeyCode::Home => self.scroll = 0,
            KeyCode::End => self.scroll = max,
            _ => {}
        }
        HelpOutcome::Open
    }

    /// Render the dialog as a centered overlay.
    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let dialog_width = 64u16.min(area.width.saturating_sub(4));
        let dialog_height = ((HELP.len() as u16) + 2).min(area.height.saturating_sub(2));
        let dialog_x = (area.width.saturating_sub(dialog_width)) / 2;
        let dialog_y = (area.height.saturating_sub(dialog_height)) / 2;
        let dialog_area = Rect {
            x: area.x + dialog_x,
            y: area.y + dialog_y,
            width: dialog_width,
            height: dialog_height,
        };

        let lines: Vec<Line> = HELP
            .iter()
            .skip(self.scroll)
            .map(|(keys, text)| {
                if keys.is_empty() {
                    Line::from(Span::styled(
                        *text,
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(vec![
                        Span::styled(
                            format!("{keys:<18}"),
                            Style::default().fg(Color::Cyan),
                        ),
                        Span::raw(*text),
                    ])
                }
            })
            .collect();

        // Clear the background to hide underlying content
        frame.render_widget(Clear, dialog_area);
        let help_text = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(" Help - Keybindings ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::White))
                    .style(Style::default().bg(Color::Black)),
            )
            .alignment(Alignment::Left);
        frame.render_widget(help_text, dialog_area);
    }
}
