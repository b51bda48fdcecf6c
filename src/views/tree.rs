// Tree view: browse the directory graph of one checkin, one directory
// per screen, with a parent stack for back-navigation.

use std::any::Any;
use std::path::PathBuf;
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

use crate::repo::{ScmRepo, SharedRepo, TimelineFilter};
use crate::search::{Direction, SearchState, SearchStatus};
use crate::tree::{ParentFrame, RepoTree, TreeObject};

use super::{match_colour, page_step, tree_rules, ColourRule, DrawCtx, NewView, Transition, View, ViewKind};

const GG_CHORD_TIMEOUT: Duration = Duration::from_secs(1);

/// A display row: the synthetic `..` entry or an index into the current
/// tree object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row {
    Up,
    Entry(usize),
}

pub struct TreeView {
    checkout_root: Option<PathBuf>,
    commit_hash: String,
    tree: RepoTree,
    current: TreeObject,
    parents: Vec<ParentFrame>,
    first: usize,
    selected: usize,
    height: usize,
    show_ids: bool,
    colour: bool,
    rules: Vec<ColourRule>,
    search: SearchState,
    matched: Option<usize>,
    pending_g: Option<Instant>,
}

impl TreeView {
    pub fn open(repo: SharedRepo, commit_hash: &str) -> Result<TreeView> {
        let resolved = repo
            .resolve(commit_hash)
            .with_context(|| format!("resolving {commit_hash}"))?;
        let deck = repo
            .deck(resolved.rid)
            .with_context(|| format!("loading checkin {}", resolved.hash))?;
        let checkout_root = repo.checkout().map(|c| c.root.clone());
        let tree = RepoTree::build(&deck.fcards, checkout_root.as_deref())
            .with_context(|| format!("building tree of {}", resolved.hash))?;
        let current = tree.subtree(None);
        Ok(TreeView {
            checkout_root,
            commit_hash: resolved.hash,
            tree,
            current,
            parents: Vec::new(),
            first: 0,
            selected: 0,
            height: 0,
            show_ids: false,
            colour: true,
            rules: tree_rules(),
            search: SearchState::default(),
            matched: None,
            pending_g: None,
        })
    }

    pub fn set_colour(&mut self, on: bool) {
        self.colour = on;
    }

    /// Walk into a repository-relative path at startup, descending
    /// through directories and selecting the final component.
    pub fn walk_to(&mut self, path: &str) -> Result<()> {
        let components: Vec<&str> = path.trim_matches('/').split('/').filter(|c| !c.is_empty()).collect();
        for (i, component) in components.iter().enumerate() {
            let up = usize::from(!self.current.is_root());
            let Some(entry_idx) = self
                .current
                .entries
                .iter()
                .position(|e| e.basename == *component)
            else {
                anyhow::bail!("path '{path}' not found in checkin {}", self.commit_hash);
            };
            self.selected = entry_idx + up;
            let is_dir = self.current.entries[entry_idx].is_dir;
            if is_dir {
                self.descend(entry_idx);
            } else if i + 1 < components.len() {
                anyhow::bail!(
                    "'{}' is not a directory",
                    self.current.entries[entry_idx].path
                );
            }
        }
        Ok(())
    }

    fn nrows(&self) -> usize {
        self.current.entries.len() + usize::from(!self.current.is_root())
    }

    fn row_at(&self, row: usize) -> Option<Row> {
        let up = usize::from(!self.current.is_root());
        if row >= self.nrows() {
            None
        } else if !self.current.is_root() && row == 0 {
            Some(Row::Up)
        } else {
            Some(Row::Entry(row - up))
        }
    }

    fn move_selection(&mut self, delta: i64) {
        let total = self.nrows();
        if total == 0 {
            return;
        }
        let target = (self.selected as i64 + delta).clamp(0, total as i64 - 1) as usize;
        self.selected = target;
        let height = self.height.max(1);
        if self.selected < self.first {
            self.first = self.selected;
        } else if self.selected >= self.first + height {
            self.first = self.selected + 1 - height;
        }
    }

    fn descend(&mut self, entry_idx: usize) {
        let entry = &self.current.entries[entry_idx];
        let subtree = self.tree.subtree(Some(entry.id));
        self.parents.push(ParentFrame {
            tree: self.current.clone(),
            first: self.first,
            selected: self.selected,
        });
        self.current = subtree;
        self.first = 0;
        self.selected = 0;
        self.matched = None;
    }

    fn ascend(&mut self) {
        if let Some(frame) = self.parents.pop() {
            self.current = frame.tree;
            self.first = frame.first;
            self.selected = frame.selected;
            self.matched = None;
        }
    }

    fn activate(&mut self) -> Option<Transition> {
        match self.row_at(self.selected)? {
            Row::Up => {
                self.ascend();
                None
            }
            Row::Entry(idx) => {
                let entry = self.current.entries[idx].clone();
                if entry.is_dir {
                    self.descend(idx);
                    None
                } else {
                    Some(Transition::Open(NewView::Blame {
                        path: entry.path,
                        commit_hash: self.commit_hash.clone(),
                    }))
                }
            }
        }
    }

    fn row_text(&self, row: Row, pad: usize) -> String {
        match row {
            Row::Up => "..".to_string(),
            Row::Entry(idx) => {
                let entry = &self.current.entries[idx];
                let mut text = String::new();
                if self.show_ids && pad > 0 {
                    match &entry.uuid {
                        Some(uuid) => text.push_str(&format!("{uuid:<pad$} ")),
                        None => text.push_str(&format!("{:<pad$} ", ".".repeat(pad))),
                    }
                }
                text.push_str(&entry.basename);
                text.push_str(entry.suffix());
                if let Some(target) = self
                    .tree
                    .link_target(entry.id, self.checkout_root.as_deref())
                {
                    text.push_str(&format!(" -> {target}"));
                }
                text
            }
        }
    }

    /// Directory line under the headline: the repo-relative path of the
    /// current object.
    fn dir_line(&self) -> String {
        match self.current.dir {
            Some(id) => format!("/{}/", self.tree.node(id).path),
            None => "/".to_string(),
        }
    }
}

impl View for TreeView {
    fn kind(&self) -> ViewKind {
        ViewKind::Tree
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, ctx: DrawCtx) {
        self.height = area.height.saturating_sub(2) as usize;
        let total = self.nrows();
        if total > 0 && self.selected >= total {
            self.selected = total - 1;
        }
        let height = self.height.max(1);
        if self.selected < self.first {
            self.first = self.selected;
        } else if self.selected >= self.first + height {
            self.first = self.selected + 1 - height;
        }

        let width = area.width as usize;
        let head_style = if ctx.shared && ctx.focused {
            Style::new().reversed()
        } else if self.colour {
            Style::new().fg(ratatui::style::Color::Magenta)
        } else {
            Style::new()
        };
        let mut lines = vec![
            Line::from(Span::styled(
                format!("commit {:<width$}", self.commit_hash, width = width),
                head_style,
            )),
            Line::from(self.dir_line()),
        ];

        let pad = if self.show_ids {
            self.current.max_uuid_len()
        } else {
            0
        };
        for row_idx in self.first..total.min(self.first + self.height) {
            let Some(row) = self.row_at(row_idx) else {
                break;
            };
            let text = self.row_text(row, pad);
            let mut style = Style::new();
            if self.colour {
                if let Some(colour) = match_colour(&self.rules, &text) {
                    style = style.fg(colour);
                }
            }
            if row_idx == self.selected {
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
            KeyCode::End | KeyCode::Char('G') => {
                self.move_selection(self.nrows() as i64);
            }
            KeyCode::Char('g') => match gg {
                Some(at) if at.elapsed() <= GG_CHORD_TIMEOUT => {
                    self.first = 0;
                    self.selected = 0;
                }
                _ => self.pending_g = Some(Instant::now()),
            },
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
                if let Some(transition) = self.activate() {
                    return Ok(transition);
                }
            }
            KeyCode::Char('h') | KeyCode::Backspace | KeyCode::Left => self.ascend(),
            KeyCode::Char('i') => self.show_ids = !self.show_ids,
            KeyCode::Char('c') => self.colour = !self.colour,
            KeyCode::Char('t') => {
                if let Some(Row::Entry(idx)) = self.row_at(self.selected) {
                    let entry = &self.current.entries[idx];
                    return Ok(Transition::Open(NewView::Timeline {
                        filter: TimelineFilter {
                            path: Some(entry.path.clone()),
                            ..TimelineFilter::default()
                        },
                    }));
                }
            }
            _ => {}
        }
        Ok(Transition::None)
    }

    fn search_start(&mut self, pattern: Regex) {
        self.search.pattern = Some(pattern);
        self.search.direction = Some(Direction::Forward);
        self.search.status = SearchStatus::Waiting;
        self.matched = None;
        self.search_next(Direction::Forward);
    }

    fn search_next(&mut self, dir: Direction) {
        let Some(pattern) = self.search.pattern.clone() else {
            return;
        };
        self.search.clear_transient();
        self.search.direction = Some(dir);
        let total = self.nrows();
        if total == 0 {
            self.search.status = SearchStatus::NoMatch;
            return;
        }
        let step: i64 = match dir {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        };
        // Direction-aware traversal, wrapping around once.
        let mut row = self.selected as i64;
        for _ in 0..total {
            row = (row + step).rem_euclid(total as i64);
            if let Some(Row::Entry(idx)) = self.row_at(row as usize) {
                if pattern.is_match(&self.current.entries[idx].basename) {
                    self.selected = row as usize;
                    self.matched = Some(row as usize);
                    self.search.status = SearchStatus::Continue;
                    let height = self.height.max(1);
                    if self.selected < self.first {
                        self.first = self.selected;
                    } else if self.selected >= self.first + height {
                        self.first = self.selected + 1 - height;
                    }
                    return;
                }
            }
        }
        self.search.status = if self.matched.is_some() {
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
