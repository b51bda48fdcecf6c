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

// Event handling for terminal input

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};

/// How long one idle loop tick lasts. Background progress (producer
/// pages, blame annotations, spinners) repaints at this cadence while no
/// key is pressed.
pub const TICK: Duration = Duration::from_millis(250);

/// Poll for the next terminal event, waiting at most `timeout`.
///
/// Returns `None` on an idle tick. Resize events pass through so the
/// caller can forward them to every open view.
pub fn next(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Extract the key press from an event, if it is one.
///
/// To work on Windows, only key presses count; repeats and releases are
/// dropped.
pub fn key_press(event: &Event) -> Option<KeyEvent> {
    if let Event::Key(key) = event {
        if key.kind == KeyEventKind::Press {
            return Some(*key);
        }
    }
    None
}

// Re-export commonly used types for convenience
pub use crossterm::event::KeyCode;
pub use crossterm::event::KeyModifiers;
