// View contract shared by the timeline, diff, tree and blame views.
//
// Each concrete view binds its engine state to rendering and input. The
// app owns the stack of trait objects and routes global keys; anything
// view-specific arrives through `handle_key`.

use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use crossterm::event::KeyEvent;
use ratatui::{layout::Rect, style::Color, Frame};
use regex::Regex;

use crate::repo::TimelineFilter;
use crate::search::{Direction, SearchState};
use crate::Commit;

pub mod blame;
pub mod diff;
pub mod help;
pub mod timeline;
pub mod tree;

pub use blame::BlameView;
pub use diff::DiffView;
pub use timeline::TimelineView;
pub use tree::TreeView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Timeline,
    Diff,
    Tree,
    Blame,
}

/// Rendering context the app passes down: whether this view has focus
/// and whether the screen is currently shared with another view.
#[derive(Debug, Clone, Copy)]
pub struct DrawCtx {
    pub focused: bool,
    pub shared: bool,
}

/// A request to open another view, produced by a view's input handler
/// and materialised by the app.
pub enum NewView {
    Diff { commit: Arc<Commit> },
    DiffOfHash { hash: String },
    Tree { commit_hash: String },
    Blame { path: String, commit_hash: String },
    Timeline { filter: TimelineFilter },
}

/// What a keystroke did, beyond mutating the view.
pub enum Transition {
    None,
    Open(NewView),
    /// Move the parent timeline's selection by the given delta and
    /// retarget this diff view at the new selection.
    ParentTimelineNav(i64),
}

pub trait View {
    fn kind(&self) -> ViewKind;

    fn draw(&mut self, frame: &mut Frame, area: Rect, ctx: DrawCtx);

    fn handle_key(&mut self, key: KeyEvent) -> Result<Transition>;

    /// Called once per idle loop tick; drives background progress
    /// (producer notes, waiting searches, annotator status).
    fn tick(&mut self) -> Result<()> {
        Ok(())
    }

    fn wants_search(&self) -> bool {
        true
    }

    fn search_start(&mut self, pattern: Regex);

    fn search_next(&mut self, dir: Direction);

    fn search_state(&mut self) -> &mut SearchState;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// One regex-to-colour mapping; the first matching rule wins.
pub struct ColourRule {
    pub pattern: Regex,
    pub colour: Color,
}

/// Colour a line against a rule set.
pub fn match_colour(rules: &[ColourRule], line: &str) -> Option<Color> {
    rules
        .iter()
        .find(|rule| rule.pattern.is_match(line))
        .map(|rule| rule.colour)
}

fn rule(pattern: &str, colour: Color) -> ColourRule {
    ColourRule {
        pattern: Regex::new(pattern).expect("colour rule pattern"),
        colour,
    }
}

/// Diff view rules: meta, removed, added, chunk header.
pub fn diff_rules() -> Vec<ColourRule> {
    vec![
        rule(
            "^((checkin|wiki|ticket|technote) [0-9a-f]|hash [+-] |\\[[+~>-]\\] |[+-]{3} )",
            Color::Green,
        ),
        rule("^-", Color::Magenta),
        rule("^\\+", Color::Cyan),
        rule("^@@", Color::Yellow),
    ]
}

/// Tree view rules keyed on the display suffix.
pub fn tree_rules() -> Vec<ColourRule> {
    vec![
        rule("@( -> .*)?$", Color::Magenta),
        rule("/$", Color::Cyan),
        rule("\\*$", Color::Green),
        rule("^commit ", Color::Magenta),
    ]
}

/// Page step for a viewport of `height` rows, keeping one line of
/// overlap.
pub fn page_step(height: usize) -> usize {
    height.saturating_sub(1).max(1)
}
