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

// Timeline producer/consumer: a background worker materialises commit
// rows into an append-only queue on demand. The UI posts Replenish
// requests on a mailbox channel; the producer pulls keyset-paginated
// pages from the repository, appends under the queue mutex, and posts
// progress notes the UI drains each tick. A waiting forward search keeps
// the producer running past its replenish budget until a row matches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use regex::Regex;
use tracing::debug;

use crate::repo::{ScmRepo, SharedRepo, TimelineCursor, TimelineFilter};
use crate::Commit;

/// Rows fetched per page when the producer is running ahead of demand.
const PAGE_SIZE: usize = 32;

/// Ordered, append-only queue of timeline rows. An entry's index is its
/// position; order is the producer's emission order (descending event
/// mtime).
#[derive(Default)]
pub struct CommitQueue {
    entries: Vec<Arc<Commit>>,
}

impl CommitQueue {
    pub fn push(&mut self, commit: Arc<Commit>) -> usize {
        debug_assert!(
            self.entries.last().map_or(true, |prev| prev.rid != commit.rid),
            "producer emitted a duplicate row"
        );
        self.entries.push(commit);
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Arc<Commit>> {
        self.entries.get(idx)
    }
}

/// UI-to-producer mailbox messages.
enum Request {
    Replenish(usize),
    Quit,
}

/// Producer-to-UI notifications.
pub enum Note {
    /// More rows were appended.
    Progress,
    /// The cursor is exhausted; no further rows will appear.
    End,
    /// The producer hit a repository error and stopped.
    Failed(String),
}

/// Search state shared with the producer so a forward search can demand
/// rows beyond the replenish budget.
#[derive(Default)]
struct SearchSync {
    waiting: bool,
    pattern: Option<Regex>,
    hit: Option<usize>,
}

/// Handle to one timeline worker: the shared queue plus the channels and
/// thread behind it. Dropping the handle stops and joins the worker.
pub struct Timeline {
    queue: Arc<Mutex<CommitQueue>>,
    search: Arc<Mutex<SearchSync>>,
    ended: Arc<AtomicBool>,
    req_tx: Sender<Request>,
    note_rx: Receiver<Note>,
    handle: Option<JoinHandle<()>>,
}

impl Timeline {
    /// Spawn the producer for `filter`, immediately requesting `initial`
    /// rows.
    pub fn spawn(repo: SharedRepo, filter: TimelineFilter, initial: usize) -> Timeline {
        let queue = Arc::new(Mutex::new(CommitQueue::default()));
        let search = Arc::new(Mutex::new(SearchSync::default()));
        let ended = Arc::new(AtomicBool::new(false));
        let (req_tx, req_rx) = unbounded();
        let (note_tx, note_rx) = unbounded();
        let worker = ProducerCtx {
            repo,
            filter,
            queue: Arc::clone(&queue),
            search: Arc::clone(&search),
            ended: Arc::clone(&ended),
            req_rx,
            note_tx,
        };
        if initial > 0 {
            let _ = req_tx.send(Request::Replenish(initial));
        }
        let handle = std::thread::spawn(move || worker.run());
        Timeline {
            queue,
            search,
            ended,
            req_tx,
            note_rx,
            handle: Some(handle),
        }
    }

    pub fn queue(&self) -> MutexGuard<'_, CommitQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Ask the producer for `n` more rows.
    pub fn request(&self, n: usize) {
        if n > 0 && !self.ended() {
            let _ = self.req_tx.send(Request::Replenish(n));
        }
    }

    /// Ask the producer to drain the cursor completely (End / G key).
    pub fn request_all(&self) {
        self.request(usize::MAX >> 1);
    }

    /// Arm the producer-side forward search: rows appended from here on
    /// are tested against `pattern`, and the first match is reported via
    /// [`Timeline::take_search_hit`].
    pub fn arm_search(&self, pattern: Regex) {
        {
            let mut s = self.search.lock().unwrap_or_else(|e| e.into_inner());
            s.waiting = true;
            s.pattern = Some(pattern);
            s.hit = None;
        }
        // Wake the producer if it is parked waiting for demand.
        let _ = self.req_tx.send(Request::Replenish(0));
    }

    /// Stop a producer-side search without consuming its result.
    pub fn disarm_search(&self) {
        let mut s = self.search.lock().unwrap_or_else(|e| e.into_inner());
        s.waiting = false;
        s.pattern = None;
        s.hit = None;
    }

    /// Queue index of the first producer-side search match, if one was
    /// found since the search was armed.
    pub fn take_search_hit(&self) -> Option<usize> {
        self.search
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .hit
            .take()
    }

    pub fn search_pending(&self) -> bool {
        self.search
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .waiting
    }

    /// Drain pending producer notes without blocking.
    pub fn drain_notes(&self) -> Vec<Note> {
        self.note_rx.try_iter().collect()
    }

    /// Block briefly for a producer note; used when scrolling has to wait
    /// for rows, with the status line repainted between rounds.
    pub fn wait_note(&self, timeout: std::time::Duration) -> Option<Note> {
        self.note_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for Timeline {
    fn drop(&mut self) {
        let _ = self.req_tx.send(Request::Quit);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Does a commit match a timeline search pattern? Tested against user,
/// hash, comment, and branch.
pub fn commit_matches(pattern: &Regex, commit: &Commit) -> bool {
    pattern.is_match(&commit.user)
        || pattern.is_match(&commit.hash)
        || pattern.is_match(&commit.comment)
        || commit
            .branch
            .as_deref()
            .is_some_and(|b| pattern.is_match(b))
}

struct ProducerCtx {
    repo: SharedRepo,
    filter: TimelineFilter,
    queue: Arc<Mutex<CommitQueue>>,
    search: Arc<Mutex<SearchSync>>,
    ended: Arc<AtomicBool>,
    req_rx: Receiver<Request>,
    note_tx: Sender<Note>,
}

impl ProducerCtx {
    fn run(self) {
        let mut needed: usize = 0;
        let mut cursor: Option<TimelineCursor> = None;
        let mut produced: usize = 0;
        loop {
            if needed == 0 && !self.search_waiting() {
                // Park until the UI asks for more.
                match self.req_rx.recv() {
                    Ok(Request::Replenish(n)) => needed = needed.saturating_add(n),
                    Ok(Request::Quit) | Err(_) => return,
                }
            }
            // Absorb any further queued demand without blocking.
            while let Ok(req) = self.req_rx.try_recv() {
                match req {
                    Request::Replenish(n) => needed = needed.saturating_add(n),
                    Request::Quit => return,
                }
            }
            if needed == 0 && !self.search_waiting() {
                continue;
            }

            let mut batch = if needed > 0 { needed.min(PAGE_SIZE) } else { PAGE_SIZE };
            if self.filter.limit > 0 {
                if produced >= self.filter.limit {
                    self.finish();
                    return;
                }
                batch = batch.min(self.filter.limit - produced);
            }

            let page = match self.repo.timeline_page(&self.filter, cursor, batch) {
                Ok(page) => page,
                Err(e) => {
                    let _ = self.note_tx.send(Note::Failed(e.to_string()));
                    self.ended.store(true, Ordering::SeqCst);
                    return;
                }
            };
            if page.commits.is_empty() {
                self.finish();
                return;
            }
            cursor = page.cursor;

            let (search_waiting, pattern) = {
                let s = self.search.lock().unwrap_or_else(|e| e.into_inner());
                (s.waiting, s.pattern.clone())
            };
            let mut first_match = None;
            {
                let mut q = self.queue.lock().unwrap_or_else(|e| e.into_inner());
                for commit in page.commits {
                    let matched = search_waiting
                        && first_match.is_none()
                        && pattern
                            .as_ref()
                            .is_some_and(|re| commit_matches(re, &commit));
                    let idx = q.push(Arc::new(commit));
                    if matched {
                        first_match = Some(idx);
                    }
                    produced += 1;
                    needed = needed.saturating_sub(1);
                }
            }
            if let Some(idx) = first_match {
                let mut s = self.search.lock().unwrap_or_else(|e| e.into_inner());
                if s.waiting {
                    s.hit = Some(idx);
                    s.waiting = false;
                }
            }
            debug!(target: "timeline.producer", produced, "page appended");
            let _ = self.note_tx.send(Note::Progress);
        }
    }

    fn search_waiting(&self) -> bool {
        self.search
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .waiting
    }

    fn finish(&self) {
        self.ended.store(true, Ordering::SeqCst);
        let _ = self.note_tx.send(Note::End);
    }
}
