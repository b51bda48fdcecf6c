// Timeline view: renders windows of the commit queue and drives the
// producer on demand.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use regex::Regex;

use crate::repo::{ScmRepo, SharedRepo, TimelineFilter};
use crate::search::{Direction, SearchState, SearchStatus};
use crate::timeline::{commit_matches, Note, Timeline};
use crate::{ArtifactKind, Commit};

use super::{page_step, DrawCtx, NewView, Transition, View, ViewKind};

/// Second keystroke budget for the `gg` chord.
const GG_CHORD_TIMEOUT: Duration = Duration::from_secs(1);

/// Columns at which the abbreviated hash column appears.
const WIDE_LAYOUT_COLS: usize = 110;

/// How long a blocked scroll waits for the producer per round.
const SCROLL_WAIT: Duration = Duration::from_millis(25);
const SCROLL_WAIT_ROUNDS: usize = 20;

pub struct TimelineView {
    timeline: Timeline,
    /// Queue index of the first commit on screen.
    first: usize,
    /// Selected row relative to the viewport.
    selected: usize,
    /// Body rows available, updated during draw.
    height: usize,
    width: usize,
    /// High-water mark of rows requested from the producer.
    requested: usize,
    search: SearchState,
    match_idx: Option<usize>,
    matched_once: bool,
    pending_end_jump: bool,
    pending_g: Option<Instant>,
    path_display: Option<String>,
    checkout_hash: Option<String>,
    /// Producer failure observed while waiting for rows, reported on the
    /// next tick.
    producer_error: Option<String>,
}

impl TimelineView {
    pub fn open(repo: SharedRepo, filter: TimelineFilter) -> TimelineView {
        let checkout_hash = repo.checkout().map(|c| c.hash.clone());
        let path_display = filter.path.clone();
        let timeline = Timeline::spawn(repo, filter, 0);
        TimelineView {
            timeline,
            first: 0,
            selected: 0,
            height: 0,
            width: 0,
            requested: 0,
            search: SearchState::default(),
            match_idx: None,
            matched_once: false,
            pending_end_jump: false,
            pending_g: None,
            path_display,
            checkout_hash,
            producer_error: None,
        }
    }

    fn selected_idx(&self) -> usize {
        self.first + self.selected
    }

    pub fn selected_commit(&self) -> Option<Arc<Commit>> {
        self.timeline.queue().get(self.selected_idx()).cloned()
    }

    /// Make sure at least `n` rows exist (or the timeline has ended),
    /// waiting briefly on the producer and leaving the status line to
    /// repaint between rounds.
    fn ensure_rows(&mut self, n: usize) {
        if self.timeline.queue().len() >= n || self.timeline.ended() {
            return;
        }
        if n > self.requested {
            self.timeline.request(n - self.requested);
            self.requested = n;
        }
        for _ in 0..SCROLL_WAIT_ROUNDS {
            if self.timeline.queue().len() >= n || self.timeline.ended() {
                break;
            }
            if let Some(Note::Failed(msg)) = self.timeline.wait_note(SCROLL_WAIT) {
                self.producer_error = Some(msg);
                break;
            }
        }
    }

    /// Move the selection by `delta` rows, scrolling as needed.
    pub fn move_selection(&mut self, delta: i64) {
        if delta > 0 {
            self.ensure_rows(self.selected_idx() + delta as usize + 1);
        }
        let total = self.timeline.queue().len();
        if total == 0 {
            return;
        }
        let target = (self.selected_idx() as i64 + delta).clamp(0, total as i64 - 1) as usize;
        self.jump(target);
    }

    /// Scroll so that queue index `idx` is visible and selected.
    fn jump(&mut self, idx: usize) {
        let height = self.height.max(1);
        if idx < self.first {
            self.first = idx;
        } else if idx >= self.first + height {
            self.first = idx + 1 - height;
        }
        self.selected = idx - self.first;
    }

    fn jump_home(&mut self) {
        self.first = 0;
        self.selected = 0;
    }

    fn jump_end(&mut self) {
        if self.timeline.ended() {
            let total = self.timeline.queue().len();
            if total > 0 {
                self.jump(total - 1);
            }
            self.pending_end_jump = false;
        } else {
            // FOR_END: drain the producer, then land on the last row.
            self.timeline.request_all();
            self.pending_end_jump = true;
        }
    }

    /// Scan materialised rows for the pattern. Returns the matching
    /// queue index, or None when the scan ran off the queue.
    fn scan(&self, from: i64, dir: Direction) -> Option<usize> {
        let queue = self.timeline.queue();
        let pattern = self.search.pattern.as_ref()?;
        let mut idx = from;
        loop {
            if idx < 0 || idx as usize >= queue.len() {
                return None;
            }
            if let Some(commit) = queue.get(idx as usize) {
                if commit_matches(pattern, commit) {
                    return Some(idx as usize);
                }
            }
            idx += match dir {
                Direction::Forward => 1,
                Direction::Reverse => -1,
            };
        }
    }

    fn finish_search_scan(&mut self, dir: Direction, from: i64) {
        match self.scan(from, dir) {
            Some(idx) => {
                self.match_idx = Some(idx);
                self.matched_once = true;
                self.jump(idx);
                self.search.status = SearchStatus::Continue;
            }
            None => match dir {
                Direction::Forward if !self.timeline.ended() => {
                    // Let the producer look further; the next ticks will
                    // observe the hit.
                    if let Some(pattern) = self.search.pattern.clone() {
                        self.timeline.arm_search(pattern);
                        self.search.status = SearchStatus::Waiting;
                    }
                }
                _ => {
                    self.search.status = if self.matched_once {
                        SearchStatus::Complete
                    } else {
                        SearchStatus::NoMatch
                    };
                }
            },
        }
    }

    fn headline(&self, loading: bool, selected: Option<&Arc<Commit>>, total: usize) -> String {
        let kind = selected.map(|c| c.kind.label()).unwrap_or("");
        let hash = selected.map(|c| c.hash.as_str()).unwrap_or("");
        let position = if total == 0 { 0 } else { self.selected_idx() + 1 };
        let status = if loading || self.search.status == SearchStatus::Waiting {
            if self.search.status == SearchStatus::Waiting {
                "searching..."
            } else {
                "loading..."
            }
            .to_string()
        } else if let Some(s) = self.search.status.display() {
            s.to_string()
        } else {
            selected
                .and_then(|c| c.branch.clone())
                .unwrap_or_default()
        };
        let current = selected
            .filter(|c| Some(c.hash.as_str()) == self.checkout_hash.as_deref())
            .map(|_| " [current]")
            .unwrap_or("");
        let idxstr = format!("{current} [{position}/{total}] {status}");
        let path = self
            .path_display
            .as_deref()
            .map(|p| format!(" /{p}"))
            .unwrap_or_default();
        // Truncate the hash so the fixed components still fit.
        let fixed = kind.len() + 1 + path.len() + idxstr.len();
        let hash_budget = self.width.saturating_sub(fixed).min(hash.len());
        let shown_hash = if hash.is_empty() {
            "........................................"
                .get(..hash_budget.min(40))
                .unwrap_or("")
        } else {
            &hash[..hash_budget]
        };
        format!("{kind} {shown_hash}{path}{idxstr}")
    }
}

impl View for TimelineView {
    fn kind(&self) -> ViewKind {
        ViewKind::Timeline
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, ctx: DrawCtx) {
        self.height = area.height.saturating_sub(1) as usize;
        self.width = area.width as usize;
        let want = self.first + self.height.max(1);
        if want > self.requested && !self.timeline.ended() {
            self.timeline.request(want - self.requested);
            self.requested = want;
        }

        let queue = self.timeline.queue();
        let total = queue.len();
        // A resize may have shrunk the viewport; keep the selection on
        // screen.
        if total > 0 {
            let max_idx = total - 1;
            if self.first > max_idx {
                self.first = max_idx;
            }
            let max_selected = self.height.saturating_sub(1).min(max_idx - self.first);
            if self.selected > max_selected {
                self.selected = max_selected;
            }
        } else {
            self.first = 0;
            self.selected = 0;
        }
        let loading = total < want && !self.timeline.ended();
        let selected_commit = queue.get(self.selected_idx());
        let headline = self.headline(loading, selected_commit, total);

        let mut lines: Vec<Line> = Vec::with_capacity(self.height + 1);
        let head_style = if ctx.shared && ctx.focused {
            Style::new().reversed()
        } else {
            Style::new()
        };
        lines.push(Line::from(Span::styled(
            format!("{headline:<width$}", width = self.width),
            head_style,
        )));

        let visible: Vec<&Arc<Commit>> = (self.first..total.min(self.first + self.height))
            .filter_map(|i| queue.get(i))
            .collect();
        let max_user = visible
            .iter()
            .map(|c| display_user(&c.user).chars().count())
            .max()
            .unwrap_or(0);
        for (row, commit) in visible.iter().enumerate() {
            let text = commit_line(commit, self.width, max_user);
            let style = if row == self.selected {
                Style::new().reversed()
            } else {
                Style::new()
            };
            lines.push(Line::from(Span::styled(text, style)));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<Transition> {
        self.search.clear_transient();
        let gg = self.pending_g.take();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('.') | KeyCode::Char('>') => {
                self.move_selection(1)
            }
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char(',') | KeyCode::Char('<') => {
                self.move_selection(-1)
            }
            KeyCode::PageDown | KeyCode::Char('f') if ctrl => {
                self.move_selection(page_step(self.height) as i64)
            }
            KeyCode::PageDown => self.move_selection(page_step(self.height) as i64),
            KeyCode::PageUp | KeyCode::Char('b') if ctrl => {
                self.move_selection(-(page_step(self.height) as i64))
            }
            KeyCode::PageUp => self.move_selection(-(page_step(self.height) as i64)),
            KeyCode::Home => self.jump_home(),
            KeyCode::End | KeyCode::Char('G') => self.jump_end(),
            KeyCode::Char('g') => {
                match gg {
                    Some(at) if at.elapsed() <= GG_CHORD_TIMEOUT => self.jump_home(),
                    _ => self.pending_g = Some(Instant::now()),
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(commit) = self.selected_commit() {
                    return Ok(Transition::Open(NewView::Diff { commit }));
                }
            }
            KeyCode::Char('t') => {
                if let Some(commit) = self.selected_commit() {
                    if commit.kind == ArtifactKind::Checkin {
                        return Ok(Transition::Open(NewView::Tree {
                            commit_hash: commit.hash.clone(),
                        }));
                    }
                }
            }
            _ => {}
        }
        Ok(Transition::None)
    }

    fn tick(&mut self) -> Result<()> {
        if let Some(msg) = self.producer_error.take() {
            bail!("timeline producer failed: {msg}");
        }
        for note in self.timeline.drain_notes() {
            if let Note::Failed(msg) = note {
                bail!("timeline producer failed: {msg}");
            }
        }
        if self.pending_end_jump && self.timeline.ended() {
            self.jump_end();
        }
        if self.search.status == SearchStatus::Waiting {
            if let Some(idx) = self.timeline.take_search_hit() {
                self.match_idx = Some(idx);
                self.matched_once = true;
                self.jump(idx);
                self.search.status = SearchStatus::Continue;
            } else if self.timeline.ended() {
                self.timeline.disarm_search();
                self.search.status = if self.matched_once {
                    SearchStatus::Complete
                } else {
                    SearchStatus::NoMatch
                };
            }
        }
        Ok(())
    }

    fn search_start(&mut self, pattern: Regex) {
        self.timeline.disarm_search();
        self.match_idx = None;
        self.matched_once = false;
        self.search.pattern = Some(pattern);
        self.search.direction = Some(Direction::Forward);
        self.search.status = SearchStatus::Waiting;
        self.finish_search_scan(Direction::Forward, self.selected_idx() as i64);
    }

    fn search_next(&mut self, dir: Direction) {
        if !self.search.active() {
            return;
        }
        self.search.clear_transient();
        self.search.direction = Some(dir);
        let step = match dir {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        };
        let from = match self.match_idx {
            Some(m) => m as i64 + step,
            None => self.selected_idx() as i64,
        };
        self.finish_search_scan(dir, from);
    }

    fn search_state(&mut self) -> &mut SearchState {
        &mut self.search
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One commit row: `date [hash] user comment`, the user column padded to
/// the widest name on screen plus two.
fn commit_line(commit: &Commit, width: usize, max_user: usize) -> String {
    let mut line = String::new();
    line.push_str(commit.date());
    line.push(' ');
    if width >= WIDE_LAYOUT_COLS {
        let abbrev: String = commit.hash.chars().take(9).collect();
        line.push_str(&format!("{abbrev:<9} "));
    }
    let user = display_user(&commit.user);
    line.push_str(&format!("{user:<pad$}", pad = max_user + 2));
    let comment = commit
        .comment
        .trim_start_matches('\n')
        .split('\n')
        .next()
        .unwrap_or("");
    line.push_str(comment);
    let mut out: String = line.chars().take(width).collect();
    let shown = out.chars().count();
    if shown < width {
        out.extend(std::iter::repeat(' ').take(width - shown));
    }
    out
}

/// Extract a username from an email-address form: the local part of the
/// first address-looking token.
fn display_user(user: &str) -> String {
    if !user.contains(['<', '@', '>']) {
        return user.to_string();
    }
    let inner = match (user.find('<'), user.find('>')) {
        (Some(open), Some(close)) if open < close => &user[open + 1..close],
        _ => user,
    };
    let local = inner.split('@').next().unwrap_or(inner).trim();
    if local.is_empty() {
        user.to_string()
    } else {
        local.to_string()
    }
}
