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

// Uniform search machinery shared by every view: a prompt line editor,
// the compiled pattern, and the status transitions the driver
// normalises. What counts as a match is view-specific.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStatus {
    #[default]
    Idle,
    /// A match is being looked for; for the timeline this spans producer
    /// rounds.
    Waiting,
    /// A match was found; navigation may continue.
    Continue,
    /// Wrapped past the last match.
    Complete,
    NoMatch,
}

impl SearchStatus {
    /// Status string shown in view headers, if any.
    pub fn display(self) -> Option<&'static str> {
        match self {
            SearchStatus::Waiting => Some("searching..."),
            SearchStatus::Complete => Some("no more matches"),
            SearchStatus::NoMatch => Some("no matches found"),
            SearchStatus::Idle | SearchStatus::Continue => None,
        }
    }
}

/// Per-view search state: the compiled pattern plus driver status.
#[derive(Debug, Default)]
pub struct SearchState {
    pub pattern: Option<Regex>,
    pub direction: Option<Direction>,
    pub status: SearchStatus,
}

impl SearchState {
    pub fn active(&self) -> bool {
        self.pattern.is_some()
    }

    /// Transient end states clear on the next input cycle.
    pub fn clear_transient(&mut self) {
        if matches!(self.status, SearchStatus::Complete | SearchStatus::NoMatch) {
            self.status = SearchStatus::Continue;
        }
    }

    pub fn reset(&mut self) {
        *self = SearchState::default();
    }
}

/// What a prompt keystroke produced.
pub enum PromptOutcome {
    Pending,
    Committed(Regex),
    Cancelled,
    Invalid(String),
}

/// The `/` prompt: a bounded line editor rendered on the view's bottom
/// row.
#[derive(Debug, Default)]
pub struct Prompt {
    buffer: String,
}

impl Prompt {
    const MAX_LEN: usize = 256;

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PromptOutcome {
        match key.code {
            KeyCode::Esc => PromptOutcome::Cancelled,
            KeyCode::Enter => {
                if self.buffer.is_empty() {
                    return PromptOutcome::Cancelled;
                }
                match Regex::new(&self.buffer) {
                    Ok(re) => PromptOutcome::Committed(re),
                    Err(e) => PromptOutcome::Invalid(e.to_string()),
                }
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                PromptOutcome::Pending
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.buffer.clear();
                PromptOutcome::Pending
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if self.buffer.len() < Self::MAX_LEN {
                    self.buffer.push(c);
                }
                PromptOutcome::Pending
            }
            _ => PromptOutcome::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    #[test]
    fn prompt_edits_and_commits() {
        let mut prompt = Prompt::default();
        for c in "foo".chars() {
            assert!(matches!(
                prompt.handle_key(key(KeyCode::Char(c))),
                PromptOutcome::Pending
            ));
        }
        prompt.handle_key(key(KeyCode::Backspace));
        assert_eq!(prompt.text(), "fo");
        match prompt.handle_key(key(KeyCode::Enter)) {
            PromptOutcome::Committed(re) => assert!(re.is_match("fob")),
            _ => panic!("expected commit"),
        }
    }

    #[test]
    fn empty_commit_cancels_and_bad_patterns_report() {
        let mut prompt = Prompt::default();
        assert!(matches!(
            prompt.handle_key(key(KeyCode::Enter)),
            PromptOutcome::Cancelled
        ));
        for c in "[".chars() {
            prompt.handle_key(key(KeyCode::Char(c)));
        }
        assert!(matches!(
            prompt.handle_key(key(KeyCode::Enter)),
            PromptOutcome::Invalid(_)
        ));
    }

    #[test]
    fn transient_statuses_clear_on_next_cycle() {
        let mut state = SearchState {
            pattern: Some(Regex::new("x").unwrap()),
            direction: Some(Direction::Forward),
            status: SearchStatus::NoMatch,
        };
        state.clear_transient();
        assert_eq!(state.status, SearchStatus::Continue);
        state.status = SearchStatus::Waiting;
        state.clear_transient();
        assert_eq!(state.status, SearchStatus::Waiting);
    }
}
