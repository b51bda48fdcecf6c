// Copyright 2026 Thomas Johannesson
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// View stack and input loop.
//
// The stack holds every open view; the top view and the one beneath it
// share the screen when the terminal is wide enough, with the newer view
// on the right. Closing a view promotes its predecessor; closing a view
// that has a child above it closes the child first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    backend::Backend,
    layout::Rect,
    style::{Style, Stylize},
    text::Span,
    widgets::Paragraph,
    Frame, Terminal,
};
use tracing::debug;

use crate::event::{key_press, next, TICK};
use crate::repo::{ScmRepo, SharedRepo};
use crate::search::{Direction, Prompt, PromptOutcome};
use crate::views::help::{HelpOutcome, HelpOverlay};
use crate::views::{
    BlameView, DiffView, DrawCtx, NewView, TimelineView, Transition, TreeView, View,
};

/// Minimum terminal width for split-screen; narrower child views open
/// full-screen instead.
const SPLIT_MIN_COLS: u16 = 120;

pub struct App {
    repo: SharedRepo,
    views: Vec<Box<dyn View>>,
    focus: usize,
    fullscreen: bool,
    help: Option<HelpOverlay>,
    prompt: Option<Prompt>,
    status_msg: Option<String>,
    quit: bool,
    sigcont: Arc<AtomicBool>,
    sigpipe: Arc<AtomicBool>,
    /// Bottom row of the focused view, where the prompt renders.
    focused_area: Rect,
}

impl App {
    pub fn new(repo: SharedRepo, initial: Box<dyn View>) -> App {
        let sigcont = Arc::new(AtomicBool::new(false));
        let sigpipe = Arc::new(AtomicBool::new(false));
        register_signals(&sigcont, &sigpipe);
        App {
            repo,
            views: vec![initial],
            focus: 0,
            fullscreen: false,
            help: None,
            prompt: None,
            status_msg: None,
            quit: false,
            sigcont,
            sigpipe,
            focused_area: Rect::default(),
        }
    }

    /// Run the event loop until the stack empties, the user quits, or a
    /// callback fails.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            if self.quit || self.views.is_empty() {
                return Ok(());
            }
            if self.sigpipe.load(Ordering::SeqCst) {
                debug!(target: "app", "SIGPIPE received, leaving loop");
                return Ok(());
            }
            if self.sigcont.swap(false, Ordering::SeqCst) {
                terminal.clear().context("redrawing after SIGCONT")?;
            }
            terminal
                .draw(|frame| self.render(frame))
                .context("rendering view stack")?;
            match next(TICK)? {
                None => self.tick()?,
                Some(Event::Resize(_, _)) => {} // areas recompute on the next draw
                Some(event) => {
                    if let Some(key) = key_press(&event) {
                        self.handle_key(key)?;
                    }
                }
            }
        }
    }

    fn split_visible(&self, area: Rect) -> bool {
        self.views.len() >= 2 && !self.fullscreen && area.width >= SPLIT_MIN_COLS
    }

    /// Render the visible path of the stack: the top view, plus its
    /// parent when the screen is wide enough to share.
    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if self.views.is_empty() {
            return;
        }
        self.focus = self.focus.min(self.views.len() - 1);
        if self.split_visible(area) {
            // Child starts at max(0, cols - max(cols/2, 80)); one border
            // column separates the panes.
            let child_x = area.width.saturating_sub((area.width / 2).max(80));
            let parent_area = Rect { width: child_x, ..area };
            let border_area = Rect {
                x: child_x,
                width: 1,
                ..area
            };
            let child_area = Rect {
                x: child_x + 1,
                width: area.width - child_x - 1,
                ..area
            };
            let top = self.views.len() - 1;
            let parent_idx = top - 1;
            let (left, right) = self.views.split_at_mut(top);
            left[parent_idx].draw(
                frame,
                parent_area,
                DrawCtx {
                    focused: self.focus == parent_idx,
                    shared: true,
                },
            );
            let border: Vec<ratatui::text::Line> = (0..area.height)
                .map(|_| ratatui::text::Line::from("│"))
                .collect();
            frame.render_widget(Paragraph::new(border), border_area);
            right[0].draw(
                frame,
                child_area,
                DrawCtx {
                    focused: self.focus == top,
                    shared: true,
                },
            );
            self.focused_area = if self.focus == top { child_area } else { parent_area };
        } else {
            let idx = self.focus;
            self.views[idx].draw(
                frame,
                area,
                DrawCtx {
                    focused: true,
                    shared: false,
                },
            );
            self.focused_area = area;
        }

        if let Some(prompt) = &self.prompt {
            self.draw_bottom_line(frame, &format!("/{}", prompt.text()));
        } else if let Some(msg) = &self.status_msg {
            self.draw_bottom_line(frame, &msg.clone());
        }
        if let Some(help) = &self.help {
            help.render(frame);
        }
    }

    fn draw_bottom_line(&self, frame: &mut Frame, text: &str) {
        let area = self.focused_area;
        if area.height == 0 {
            return;
        }
        let line = Rect {
            y: area.y + area.height - 1,
            height: 1,
            ..area
        };
        frame.render_widget(
            Paragraph::new(Span::styled(
                format!("{text:<width$}", width = line.width as usize),
                Style::new().reversed(),
            )),
            line,
        );
    }

    fn tick(&mut self) -> Result<()> {
        for view in &mut self.views {
            view.tick()?;
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if let Some(help) = &mut self.help {
            let page = self.focused_area.height.saturating_sub(1) as usize;
            if matches!(help.handle_key(key, page), HelpOutcome::Closed) {
                self.help = None;
            }
            return Ok(());
        }
        if let Some(prompt) = &mut self.prompt {
            match prompt.handle_key(key) {
                PromptOutcome::Pending => {}
                PromptOutcome::Cancelled => self.prompt = None,
                PromptOutcome::Invalid(msg) => {
                    self.prompt = None;
                    self.status_msg = Some(format!("invalid pattern: {msg}"));
                }
                PromptOutcome::Committed(pattern) => {
                    self.prompt = None;
                    self.views[self.focus].search_start(pattern);
                }
            }
            return Ok(());
        }
        self.status_msg = None;

        match key.code {
            KeyCode::Char('Q') => self.quit = true,
            KeyCode::Char('q') => self.close_active(),
            KeyCode::Tab => self.toggle_focus(),
            KeyCode::Char('f') => self.fullscreen = !self.fullscreen,
            KeyCode::F(1) | KeyCode::Char('H') | KeyCode::Char('?') => {
                self.help = Some(HelpOverlay::default());
            }
            KeyCode::Char('/') => {
                if self.views[self.focus].wants_search() {
                    self.prompt = Some(Prompt::default());
                }
            }
            KeyCode::Char('n') => self.views[self.focus].search_next(Direction::Forward),
            KeyCode::Char('N') => self.views[self.focus].search_next(Direction::Reverse),
            _ => {
                let transition = self.views[self.focus].handle_key(key)?;
                self.apply(transition)?;
            }
        }
        Ok(())
    }

    /// Close the focused view; anything stacked above it was opened from
    /// it and closes with it.
    fn close_active(&mut self) {
        self.views.truncate(self.focus);
        self.focus = self.views.len().saturating_sub(1);
    }

    fn toggle_focus(&mut self) {
        if self.views.len() < 2 {
            return;
        }
        let top = self.views.len() - 1;
        self.focus = if self.focus == top { top - 1 } else { top };
    }

    /// Open a view from a request, as a view's input handler would.
    pub fn open(&mut self, request: NewView) -> Result<()> {
        let view = self.build_view(request)?;
        self.install(view);
        Ok(())
    }

    fn apply(&mut self, transition: Transition) -> Result<()> {
        match transition {
            Transition::None => Ok(()),
            Transition::Open(request) => self.open(request),
            Transition::ParentTimelineNav(delta) => self.nav_parent_timeline(delta),
        }
    }

    fn build_view(&self, request: NewView) -> Result<Box<dyn View>> {
        Ok(match request {
            NewView::Diff { commit } => Box::new(DiffView::open(self.repo.clone(), commit)?),
            NewView::DiffOfHash { hash } => {
                let resolved = self
                    .repo
                    .resolve(&hash)
                    .with_context(|| format!("resolving {hash}"))?;
                let commit = self.repo.commit(resolved.rid)?;
                Box::new(DiffView::open(self.repo.clone(), Arc::new(commit))?)
            }
            NewView::Tree { commit_hash } => {
                Box::new(TreeView::open(self.repo.clone(), &commit_hash)?)
            }
            NewView::Blame { path, commit_hash } => {
                Box::new(BlameView::open(self.repo.clone(), &path, &commit_hash)?)
            }
            NewView::Timeline { filter } => {
                Box::new(TimelineView::open(self.repo.clone(), filter))
            }
        })
    }

    /// Install a freshly opened view: any existing view of the same kind
    /// is closed first, then the new view goes on top with focus.
    fn install(&mut self, view: Box<dyn View>) {
        let kind = view.kind();
        self.views.retain(|v| v.kind() != kind);
        self.views.push(view);
        self.focus = self.views.len() - 1;
    }

    /// J/K from a diff view: move the timeline directly beneath it and
    /// retarget the diff at the new selection.
    fn nav_parent_timeline(&mut self, delta: i64) -> Result<()> {
        if self.focus == 0 {
            return Ok(());
        }
        let (below, above) = self.views.split_at_mut(self.focus);
        let Some(timeline) = below[self.focus - 1]
            .as_any_mut()
            .downcast_mut::<TimelineView>()
        else {
            return Ok(());
        };
        timeline.move_selection(delta);
        let Some(commit) = timeline.selected_commit() else {
            return Ok(());
        };
        if let Some(diff) = above[0].as_any_mut().downcast_mut::<DiffView>() {
            diff.retarget(commit)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn register_signals(sigcont: &Arc<AtomicBool>, sigpipe: &Arc<AtomicBool>) {
    let _ = signal_hook::flag::register(signal_hook::consts::SIGCONT, Arc::clone(sigcont));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGPIPE, Arc::clone(sigpipe));
}

#[cfg(not(unix))]
fn register_signals(_sigcont: &Arc<AtomicBool>, _sigpipe: &Arc<AtomicBool>) {}
