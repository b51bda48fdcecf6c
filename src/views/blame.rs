// Blame view: per-line annotations for one file version, with pivots
// into each line's introducing or parent commit.

use std::any::Any;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use regex::Regex;

use crate::blame::{Blame, BlameCfg};
use crate::repo::{RepoError, Resolved, ScmRepo, SharedRepo};
use crate::search::{Direction, SearchState, SearchStatus};

use super::{page_step, DrawCtx, NewView, Transition, View, ViewKind};

const GG_CHORD_TIMEOUT: Duration = Duration::from_secs(1);
const SPINNER: [char; 4] = ['\\', '|', '/', '-'];

/// Width of the annotation prefix: ten hash characters and a space.
const PREFIX_WIDTH: usize = 11;

pub struct BlameView {
    repo: SharedRepo,
    cfg: BlameCfg,
    blame: Blame,
    /// Previously blamed starting commits (the `B` pop stack).
    stack: Vec<Resolved>,
    first: usize,
    selected: usize,
    height: usize,
    colour: bool,
    search: SearchState,
    matched: Option<usize>,
    matched_once: bool,
    pending_g: Option<Instant>,
    spin: usize,
}

impl BlameView {
    pub fn open(repo: SharedRepo, path: &str, commit_hash: &str) -> Result<BlameView> {
        let origin = repo
            .resolve(commit_hash)
            .with_context(|| format!("resolving {commit_hash}"))?;
        let cfg = BlameCfg {
            path: path.to_string(),
            commit: Some(origin.hash.clone()),
            ..BlameCfg::default()
        };
        Self::with_cfg(repo, cfg, origin)
    }

    /// Open from CLI arguments (depth limit, reverse mode).
    pub fn with_cfg(repo: SharedRepo, cfg: BlameCfg, origin: Resolved) -> Result<BlameView> {
        let blame = Blame::run(repo.clone(), &cfg, origin)
            .with_context(|| format!("blame of {}", cfg.path))?;
        Ok(BlameView {
            repo,
            cfg,
            blame,
            stack: Vec::new(),
            first: 0,
            selected: 0,
            height: 0,
            colour: true,
            search: SearchState::default(),
            matched: None,
            matched_once: false,
            pending_g: None,
            spin: 0,
        })
    }

    /// Restart the session from another commit, keeping the cursor
    /// position when possible.
    fn rerun(&mut self, origin: Resolved) -> Result<()> {
        let blame = Blame::run(self.repo.clone(), &self.cfg, origin)
            .with_context(|| format!("blame of {}", self.cfg.path))?;
        self.blame = blame;
        let max = self.blame.nlines().saturating_sub(1);
        self.selected = self.selected.min(max);
        self.first = self.first.min(max);
        self.matched = None;
        Ok(())
    }

    fn move_selection(&mut self, delta: i64) {
        let total = self.blame.nlines();
        if total == 0 {
            return;
        }
        self.selected = (self.selected as i64 + delta).clamp(0, total as i64 - 1) as usize;
        let height = self.height.max(1);
        if self.selected < self.first {
            self.first = self.selected;
        } else if self.selected >= self.first + height {
            self.first = self.selected + 1 - height;
        }
    }

    /// Pivot to the commit that introduced the selected line.
    fn pivot_to_line(&mut self) -> Result<()> {
        let Some(hash) = self.blame.line_hash(self.selected) else {
            return Ok(());
        };
        if hash == self.blame.origin.hash {
            return Ok(());
        }
        let target = self
            .repo
            .resolve(&hash)
            .with_context(|| format!("resolving {hash}"))?;
        let prev = self.blame.origin.clone();
        match self.rerun(target) {
            Ok(()) => {
                self.stack.push(prev);
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Pivot to the primary parent of the selected line's commit,
    /// cancelled when the file does not exist there.
    fn pivot_to_parent(&mut self) -> Result<()> {
        let Some(hash) = self.blame.line_hash(self.selected) else {
            return Ok(());
        };
        let commit = self
            .repo
            .resolve(&hash)
            .with_context(|| format!("resolving {hash}"))?;
        let Some(parent) = self.repo.parent_of(commit.rid)? else {
            return Ok(());
        };
        let prev = self.blame.origin.clone();
        match self.rerun(parent) {
            Ok(()) => {
                self.stack.push(prev);
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn pop_pivot(&mut self) -> Result<()> {
        if let Some(prev) = self.stack.pop() {
            self.rerun(prev)?;
        }
        Ok(())
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|c| matches!(c.downcast_ref::<RepoError>(), Some(RepoError::NotFound(_))))
}

impl View for BlameView {
    fn kind(&self) -> ViewKind {
        ViewKind::Blame
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, ctx: DrawCtx) {
        self.height = area.height.saturating_sub(2) as usize;
        let total = self.blame.nlines();
        let height = self.height.max(1);
        if total > 0 && self.selected >= total {
            self.selected = total - 1;
        }
        if self.selected < self.first {
            self.first = self.selected;
        } else if self.selected >= self.first + height {
            self.first = self.selected + 1 - height;
        }

        let width = area.width as usize;
        let head_style = if ctx.shared && ctx.focused {
            Style::new().reversed()
        } else {
            Style::new()
        };
        let (annotated, done) = {
            let state = self.blame.state();
            (state.annotated, state.done)
        };
        let status = if done {
            format!("blame of /{}", self.cfg.path)
        } else {
            let spinner = SPINNER[self.spin % SPINNER.len()];
            format!(
                "[{annotated}/{total}] annotating... /{} {spinner}",
                self.cfg.path
            )
        };
        let mut lines = vec![
            Line::from(Span::styled(
                format!("checkin {:<width$}", self.blame.origin.hash, width = width),
                head_style,
            )),
            Line::from(status),
        ];

        let prefix_style = if self.colour {
            Style::new().fg(Color::Cyan)
        } else {
            Style::new()
        };
        let mut prev_hash: Option<String> = None;
        if self.first > 0 {
            prev_hash = self.blame.line_hash(self.first - 1);
        }
        for idx in self.first..total.min(self.first + self.height) {
            let hash = self.blame.line_hash(idx);
            let prefix = match &hash {
                None => format!("{:<width$}", ".".repeat(10), width = PREFIX_WIDTH),
                Some(h) if prev_hash.as_deref() == Some(h.as_str()) => {
                    " ".repeat(PREFIX_WIDTH)
                }
                Some(h) => {
                    let short: String = h.chars().take(10).collect();
                    format!("{short:<width$}", width = PREFIX_WIDTH)
                }
            };
            prev_hash = hash;
            let text = self.blame.line(idx).unwrap_or("");
            let body_width = width.saturating_sub(PREFIX_WIDTH);
            let clipped: String = text.chars().take(body_width).collect();
            let selected = idx == self.selected;
            let line_style = if selected { Style::new().reversed() } else { Style::new() };
            lines.push(Line::from(vec![
                Span::styled(prefix, if selected { line_style } else { prefix_style }),
                Span::styled(clipped, line_style),
            ]));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<Transition> {
        self.search.clear_transient();
        let gg = self.pending_g.take();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(page_step(self.height) as i64),
            KeyCode::PageUp => self.move_selection(-(page_step(self.height) as i64)),
            KeyCode::Char('f') if ctrl => self.move_selection(page_step(self.height) as i64),
            KeyCode::Char('b') if ctrl => self.move_selection(-(page_step(self.height) as i64)),
            KeyCode::Home => {
                self.first = 0;
                self.selected = 0;
            }
            KeyCode::End | KeyCode::Char('G') => self.move_selection(self.blame.nlines() as i64),
            KeyCode::Char('g') => match gg {
                Some(at) if at.elapsed() <= GG_CHORD_TIMEOUT => {
                    self.first = 0;
                    self.selected = 0;
                }
                _ => self.pending_g = Some(Instant::now()),
            },
            KeyCode::Char('b') => self.pivot_to_line()?,
            KeyCode::Char('p') => self.pivot_to_parent()?,
            KeyCode::Char('B') | KeyCode::Backspace => self.pop_pivot()?,
            KeyCode::Enter => {
                if let Some(hash) = self.blame.line_hash(self.selected) {
                    return Ok(Transition::Open(NewView::DiffOfHash { hash }));
                }
            }
            KeyCode::Char('c') => self.colour = !self.colour,
            _ => {}
        }
        Ok(Transition::None)
    }

    fn tick(&mut self) -> Result<()> {
        self.spin = self.spin.wrapping_add(1);
        let error = self.blame.state().error.take();
        if let Some(msg) = error {
            bail!("blame failed: {msg}");
        }
        Ok(())
    }

    fn search_start(&mut self, pattern: Regex) {
        self.search.pattern = Some(pattern);
        self.search.direction = Some(Direction::Forward);
        self.search.status = SearchStatus::Waiting;
        self.matched = None;
        self.matched_once = false;
        self.search_next(Direction::Forward);
    }

    fn search_next(&mut self, dir: Direction) {
        let Some(pattern) = self.search.pattern.clone() else {
            return;
        };
        self.search.clear_transient();
        self.search.direction = Some(dir);
        let total = self.blame.nlines() as i64;
        let step: i64 = match dir {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        };
        let mut idx = match self.matched {
            Some(m) => m as i64 + step,
            None => match dir {
                Direction::Forward => 0,
                Direction::Reverse => total - 1,
            },
        };
        while idx >= 0 && idx < total {
            if let Some(line) = self.blame.line(idx as usize) {
                if pattern.is_match(line) {
                    self.matched = Some(idx as usize);
                    self.matched_once = true;
                    self.selected = idx as usize;
                    self.first = idx as usize;
                    self.search.status = SearchStatus::Continue;
                    return;
                }
            }
            idx += step;
        }
        self.search.status = if self.matched_once {
            SearchStatus::Complete
        } else {
            SearchStatus::NoMatch
        };
    }

    fn search_state(&mut self) -> &mut SearchState {
        &mut self.search
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
