// Diff view: a scrollable window over the engine's line-indexed buffer,
// with runtime toggles that rebuild the diff in place.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use regex::Regex;

use crate::diff::{commit_diff, two_commit_diff, DiffOpts, DiffResult, MAX_CONTEXT};
use crate::repo::SharedRepo;
use crate::search::{Direction, SearchState, SearchStatus};
use crate::Commit;

use super::{diff_rules, match_colour, page_step, ColourRule, DrawCtx, Transition, View, ViewKind};

const GG_CHORD_TIMEOUT: Duration = Duration::from_secs(1);

pub struct DiffView {
    repo: SharedRepo,
    commit: Arc<Commit>,
    /// Old side of an explicit two-commit diff; `None` diffs against the
    /// commit's primary parent.
    base: Option<Arc<Commit>>,
    opts: DiffOpts,
    colour: bool,
    rules: Vec<ColourRule>,
    result: DiffResult,
    first: usize,
    height: usize,
    search: SearchState,
    matched: Option<usize>,
    matched_once: bool,
    pending_g: Option<Instant>,
}

impl DiffView {
    pub fn open(repo: SharedRepo, commit: Arc<Commit>) -> Result<DiffView> {
        Self::new(repo, commit, None)
    }

    /// Diff two explicit commits (`fsk diff old new`).
    pub fn open_two(repo: SharedRepo, old: Arc<Commit>, new: Arc<Commit>) -> Result<DiffView> {
        Self::new(repo, new, Some(old))
    }

    fn new(repo: SharedRepo, commit: Arc<Commit>, base: Option<Arc<Commit>>) -> Result<DiffView> {
        let mut view = DiffView {
            repo,
            commit,
            base,
            opts: DiffOpts::default(),
            colour: true,
            rules: diff_rules(),
            result: DiffResult::default(),
            first: 0,
            height: 0,
            search: SearchState::default(),
            matched: None,
            matched_once: false,
            pending_g: None,
        };
        view.rebuild()?;
        Ok(view)
    }

    pub fn opts(&self) -> &DiffOpts {
        &self.opts
    }

    pub fn set_opts(&mut self, opts: DiffOpts) -> Result<()> {
        self.opts = opts;
        self.rebuild()
    }

    pub fn set_colour(&mut self, on: bool) {
        self.colour = on;
    }

    fn rebuild(&mut self) -> Result<()> {
        self.result = match &self.base {
            Some(base) => two_commit_diff(self.repo.as_ref(), base, &self.commit, &self.opts)
                .with_context(|| format!("diff of {}", self.commit.hash))?,
            None => commit_diff(self.repo.as_ref(), &self.commit, &self.opts)
                .with_context(|| format!("diff of {}", self.commit.hash))?,
        };
        self.first = 0;
        self.matched = None;
        Ok(())
    }

    /// Point the view at another commit (J/K navigation from the parent
    /// timeline).
    pub fn retarget(&mut self, commit: Arc<Commit>) -> Result<()> {
        if commit.hash == self.commit.hash {
            return Ok(());
        }
        self.commit = commit;
        self.base = None;
        self.rebuild()
    }

    pub fn nlines(&self) -> usize {
        self.result.buffer.nlines()
    }

    fn max_first(&self) -> usize {
        self.nlines().saturating_sub(self.height.max(1))
    }

    fn scroll(&mut self, delta: i64) {
        let target = self.first as i64 + delta;
        self.first = target.clamp(0, self.max_first() as i64) as usize;
    }
}

impl View for DiffView {
    fn kind(&self) -> ViewKind {
        ViewKind::Diff
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _ctx: DrawCtx) {
        self.height = area.height as usize;
        if self.first > self.max_first() {
            self.first = self.max_first();
        }
        let width = area.width as usize;
        let mut lines = Vec::with_capacity(self.height);
        for idx in self.first..self.nlines().min(self.first + self.height) {
            let text = self.result.buffer.line(idx).unwrap_or("");
            let mut style = Style::new();
            if self.colour {
                if let Some(colour) = match_colour(&self.rules, text) {
                    style = style.fg(colour);
                }
            }
            if Some(idx) == self.matched && self.search.active() {
                style = style.reversed();
            }
            let clipped: String = text.chars().take(width).collect();
            lines.push(Line::from(Span::styled(clipped, style)));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<Transition> {
        self.search.clear_transient();
        let gg = self.pending_g.take();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Down | KeyCode::Char('j') if !ctrl => self.scroll(1),
            KeyCode::Up | KeyCode::Char('k') if !ctrl => self.scroll(-1),
            KeyCode::PageDown => self.scroll(page_step(self.height) as i64),
            KeyCode::PageUp => self.scroll(-(page_step(self.height) as i64)),
            KeyCode::Char('f') if ctrl => self.scroll(page_step(self.height) as i64),
            KeyCode::Char('b') if ctrl => self.scroll(-(page_step(self.height) as i64)),
            KeyCode::Home => self.first = 0,
            KeyCode::End | KeyCode::Char('G') => self.first = self.max_first(),
            KeyCode::Char('g') => match gg {
                Some(at) if at.elapsed() <= GG_CHORD_TIMEOUT => self.first = 0,
                _ => self.pending_g = Some(Instant::now()),
            },
            KeyCode::Char('-') | KeyCode::Char('_') => {
                if self.opts.context > 0 {
                    self.opts.context -= 1;
                    self.rebuild()?;
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                if self.opts.context < MAX_CONTEXT {
                    self.opts.context += 1;
                    self.rebuild()?;
                }
            }
            KeyCode::Char('c') => self.colour = !self.colour,
            KeyCode::Char('i') => {
                self.opts.invert = !self.opts.invert;
                self.rebuild()?;
            }
            KeyCode::Char('v') => {
                self.opts.verbose = !self.opts.verbose;
                self.rebuild()?;
            }
            KeyCode::Char('w') => {
                self.opts.ignore_ws = !self.opts.ignore_ws;
                self.rebuild()?;
            }
            KeyCode::Char('J') | KeyCode::Char('>') | KeyCode::Char('.') => {
                return Ok(Transition::ParentTimelineNav(1));
            }
            KeyCode::Char('j') if ctrl => return Ok(Transition::ParentTimelineNav(1)),
            KeyCode::Char('K') | KeyCode::Char('<') | KeyCode::Char(',') => {
                return Ok(Transition::ParentTimelineNav(-1));
            }
            KeyCode::Char('k') if ctrl => return Ok(Transition::ParentTimelineNav(-1)),
            _ => {}
        }
        Ok(Transition::None)
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
        let nlines = self.nlines() as i64;
        let step: i64 = match dir {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        };
        let mut idx = match self.matched {
            Some(m) => m as i64 + step,
            None => match dir {
                Direction::Forward => 0,
                Direction::Reverse => nlines - 1,
            },
        };
        while idx >= 0 && idx < nlines {
            if let Some(line) = self.result.buffer.line(idx as usize) {
                if pattern.is_match(line) {
                    self.matched = Some(idx as usize);
                    self.matched_once = true;
                    self.first = (idx as usize).min(self.max_first());
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
