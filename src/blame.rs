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

// Blame engine: a background annotator mapping each line of a file to
// the commit that introduced it. The annotator walks the file's version
// chain from a starting commit through primary parents (following
// renames), diffing adjacent versions; a line not traceable to the older
// version was introduced by the newer one. Reverse mode walks the other
// way, from the starting commit forward along descendants to the tip,
// and annotates each line with the last version that carried it.
// Cancellation is cooperative: an atomic token checked at every per-line
// step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use similar::{capture_diff_slices, Algorithm, DiffTag};
use tracing::debug;

use crate::repo::{RepoError, RepoResult, Resolved, ScmRepo, SharedRepo};

/// One annotated line: the hash of the commit that introduced it, once
/// known. `annotated` is true exactly when `hash` is set.
#[derive(Debug, Clone, Default)]
pub struct BlameLine {
    pub hash: Option<String>,
    pub annotated: bool,
}

/// Blame request parameters.
#[derive(Debug, Clone, Default)]
pub struct BlameCfg {
    pub path: String,
    /// Starting commit; `None` means the current checkout or tip,
    /// resolved by the caller before the engine runs.
    pub commit: Option<String>,
    /// Annotate toward the tip instead of toward the root: each line
    /// shows the last version that carried it, and lines still present
    /// at the tip take the root-commit hash.
    pub reverse: bool,
    /// Maximum number of versions to walk through.
    pub depth: Option<usize>,
}

impl BlameCfg {
    /// Reverse blame needs an explicit starting commit; enforced here as
    /// well as by the argument parser.
    pub fn validate(&self) -> RepoResult<()> {
        if self.reverse && self.commit.is_none() {
            return Err(RepoError::Arg(
                "reverse blame requires a starting commit".into(),
            ));
        }
        Ok(())
    }
}

/// Annotator progress shared with the UI.
#[derive(Debug, Default)]
pub struct BlameState {
    pub lines: Vec<BlameLine>,
    pub annotated: usize,
    pub done: bool,
    pub error: Option<String>,
}

/// A running (or finished) blame session for one file version.
pub struct Blame {
    /// Content of the file at the starting commit.
    pub text: String,
    /// Byte offset of each line start, `nlines + 1` entries.
    pub offsets: Vec<usize>,
    /// The commit the session started from.
    pub origin: Resolved,
    shared: Arc<Mutex<BlameState>>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Blame {
    /// Fetch the file at `origin`, then spawn the annotator thread.
    pub fn run(repo: SharedRepo, cfg: &BlameCfg, origin: Resolved) -> RepoResult<Blame> {
        cfg.validate()?;
        let deck = repo.deck(origin.rid)?;
        let card = deck
            .fcards
            .iter()
            .find(|f| f.name == cfg.path)
            .ok_or_else(|| {
                RepoError::NotFound(format!("{} in checkin {}", cfg.path, origin.hash))
            })?;
        let uuid = card
            .uuid
            .clone()
            .ok_or_else(|| RepoError::Malformed(format!("{} has no content hash", cfg.path)))?;
        let text = match String::from_utf8(repo.content_by_uuid(&uuid)?) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        let offsets = line_offsets(&text);
        let nlines = offsets.len() - 1;

        let fallback = if cfg.reverse {
            repo.root_commit()?
        } else {
            String::new() // resolved to the oldest chain entry by the annotator
        };

        let shared = Arc::new(Mutex::new(BlameState {
            lines: vec![BlameLine::default(); nlines],
            ..BlameState::default()
        }));
        let cancel = Arc::new(AtomicBool::new(false));

        let handle = {
            let repo = Arc::clone(&repo);
            let shared = Arc::clone(&shared);
            let cancel = Arc::clone(&cancel);
            let origin = origin.clone();
            let cfg = cfg.clone();
            let start_lines: Vec<String> = text.lines().map(str::to_string).collect();
            std::thread::spawn(move || {
                let result = annotate(
                    repo, &cfg, origin, start_lines, fallback, &shared, &cancel,
                );
                let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
                state.done = true;
                match result {
                    Ok(()) | Err(RepoError::Cancelled) => {}
                    Err(e) => state.error = Some(e.to_string()),
                }
            })
        };

        Ok(Blame {
            text,
            offsets,
            origin,
            shared,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, BlameState> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn nlines(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn line(&self, idx: usize) -> Option<&str> {
        if idx + 1 >= self.offsets.len() {
            return None;
        }
        let line = &self.text[self.offsets[idx]..self.offsets[idx + 1]];
        Some(line.strip_suffix('\n').unwrap_or(line))
    }

    /// Hash annotated for a line, if the annotator has reached it.
    pub fn line_hash(&self, idx: usize) -> Option<String> {
        self.state().lines.get(idx).and_then(|l| l.hash.clone())
    }

    /// Cooperative shutdown: raise the token and join the thread.
    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Blame {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Byte offsets of line starts, excluding the empty slice after a
/// trailing newline.
fn line_offsets(text: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            offsets.push(i + 1);
        }
    }
    if offsets.last() != Some(&text.len()) {
        offsets.push(text.len());
    }
    offsets
}

/// One version of the file along the walk.
struct Version {
    hash: String,
    lines: Vec<String>,
}

fn annotate(
    repo: SharedRepo,
    cfg: &BlameCfg,
    origin: Resolved,
    start_lines: Vec<String>,
    fallback: String,
    shared: &Arc<Mutex<BlameState>>,
    cancel: &Arc<AtomicBool>,
) -> RepoResult<()> {
    let on_line = |line: usize, hash: &str| {
        let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
        if cancel.load(Ordering::SeqCst) {
            return Err(RepoError::Cancelled);
        }
        if let Some(slot) = state.lines.get_mut(line) {
            if !slot.annotated {
                slot.hash = Some(hash.to_string());
                slot.annotated = true;
                state.annotated += 1;
            }
        }
        Ok(())
    };
    if cfg.reverse {
        let (chain, at_origin) = build_reverse_chain(&repo, cfg, &origin, start_lines, cancel)?;
        debug!(target: "blame", versions = chain.len(), path = %cfg.path, "reverse chain built");
        // Lines still present at the reverse origin take the root-commit
        // fallback; when the file was removed along the way, survivors
        // belong to the last version that carried it.
        let fallback = if at_origin {
            fallback
        } else {
            chain
                .last()
                .map(|v| v.hash.clone())
                .unwrap_or_else(|| origin.hash.clone())
        };
        return attribute_reverse(&chain, &fallback, on_line);
    }
    let chain = build_chain(&repo, cfg, &origin, start_lines, cancel)?;
    debug!(target: "blame", versions = chain.len(), path = %cfg.path, "chain built");
    let fallback = if fallback.is_empty() {
        chain
            .last()
            .map(|v| v.hash.clone())
            .unwrap_or_else(|| origin.hash.clone())
    } else {
        fallback
    };
    attribute(&chain, &fallback, on_line)
}

/// Walk the file's version chain from `origin` back through primary
/// parents, following renames recorded on the child's F card.
fn build_chain(
    repo: &SharedRepo,
    cfg: &BlameCfg,
    origin: &Resolved,
    start_lines: Vec<String>,
    cancel: &Arc<AtomicBool>,
) -> RepoResult<Vec<Version>> {
    let mut chain = vec![Version {
        hash: origin.hash.clone(),
        lines: start_lines,
    }];
    let mut cur_rid = origin.rid;
    let mut cur_path = cfg.path.clone();
    let mut cur_deck = repo.deck(origin.rid)?;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return Err(RepoError::Cancelled);
        }
        if let Some(depth) = cfg.depth {
            if chain.len() >= depth.max(1) {
                break;
            }
        }
        let Some(parent) = repo.parent_of(cur_rid)? else {
            break;
        };
        // A rename on the child's card tells us the file's name in the
        // parent checkin.
        let parent_path = match cur_deck
            .fcards
            .iter()
            .find(|f| f.name == cur_path)
            .and_then(|f| f.prior_name.clone())
        {
            Some(prior) => prior,
            None => cur_path.clone(),
        };
        let parent_deck = repo.deck(parent.rid)?;
        let Some(card) = parent_deck.fcards.iter().find(|f| f.name == parent_path) else {
            break; // the file was added in the current version
        };
        let Some(uuid) = card.uuid.clone() else {
            break;
        };
        let content = match String::from_utf8(repo.content_by_uuid(&uuid)?) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        chain.push(Version {
            hash: parent.hash.clone(),
            lines: content.lines().map(str::to_string).collect(),
        });
        cur_rid = parent.rid;
        cur_path = parent_path;
        cur_deck = parent_deck;
    }
    Ok(chain)
}

/// Walk the file's version chain the other way: from `origin` (the
/// annotated version) forward along descendants to the tip. The
/// descendant path is recovered by walking the tip's primary-parent
/// ancestry down to `origin`, so the starting commit must be on that
/// ancestry. Renames recorded on a newer version's F card are followed
/// forward. Returns versions oldest-first plus whether the file still
/// exists at the tip.
fn build_reverse_chain(
    repo: &SharedRepo,
    cfg: &BlameCfg,
    origin: &Resolved,
    start_lines: Vec<String>,
    cancel: &Arc<AtomicBool>,
) -> RepoResult<(Vec<Version>, bool)> {
    let tip = repo.resolve("tip")?;
    let mut path = vec![tip.clone()];
    let mut cur = tip;
    while cur.rid != origin.rid {
        if cancel.load(Ordering::SeqCst) {
            return Err(RepoError::Cancelled);
        }
        let Some(parent) = repo.parent_of(cur.rid)? else {
            return Err(RepoError::Arg(format!(
                "{} is not an ancestor of the tip",
                origin.hash
            )));
        };
        path.push(parent.clone());
        cur = parent;
    }
    path.reverse();

    let mut chain = vec![Version {
        hash: origin.hash.clone(),
        lines: start_lines,
    }];
    let mut cur_path = cfg.path.clone();
    let mut prev_uuid = repo
        .deck(origin.rid)?
        .fcards
        .iter()
        .find(|f| f.name == cur_path)
        .and_then(|f| f.uuid.clone());
    let mut at_origin = true;
    for step in &path[1..] {
        if cancel.load(Ordering::SeqCst) {
            return Err(RepoError::Cancelled);
        }
        if let Some(depth) = cfg.depth {
            if chain.len() >= depth.max(1) {
                at_origin = false;
                break;
            }
        }
        let deck = repo.deck(step.rid)?;
        // A rename in the newer version carries the old name as the
        // card's prior name.
        let card = deck
            .fcards
            .iter()
            .find(|f| f.prior_name.as_deref() == Some(cur_path.as_str()))
            .or_else(|| deck.fcards.iter().find(|f| f.name == cur_path));
        let Some(card) = card else {
            at_origin = false; // removed in this version
            break;
        };
        let Some(uuid) = card.uuid.clone() else {
            at_origin = false;
            break;
        };
        cur_path = card.name.clone();
        if prev_uuid.as_deref() == Some(uuid.as_str()) {
            continue; // this version does not touch the file
        }
        let content = match String::from_utf8(repo.content_by_uuid(&uuid)?) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        chain.push(Version {
            hash: step.hash.clone(),
            lines: content.lines().map(str::to_string).collect(),
        });
        prev_uuid = Some(uuid);
    }
    Ok((chain, at_origin))
}

/// Attribute each display line (of `chain[0]`) to the version that
/// introduced it, invoking `on_line` once per attribution. Lines that
/// survive the whole chain take `fallback`.
fn attribute(
    chain: &[Version],
    fallback: &str,
    mut on_line: impl FnMut(usize, &str) -> RepoResult<()>,
) -> RepoResult<()> {
    let Some(first) = chain.first() else {
        return Ok(());
    };
    let nlines = first.lines.len();
    // mapping[n] = this display line's index within the version currently
    // being examined; None once attributed.
    let mut mapping: Vec<Option<usize>> = (0..nlines).map(Some).collect();
    for pair in chain.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        let ops = capture_diff_slices(Algorithm::Myers, &older.lines, &newer.lines);
        let mut to_older: Vec<Option<usize>> = vec![None; newer.lines.len()];
        for op in &ops {
            if op.tag() == DiffTag::Equal {
                let old_range = op.old_range();
                let new_range = op.new_range();
                for (o, n) in old_range.zip(new_range) {
                    to_older[n] = Some(o);
                }
            }
        }
        for line in 0..nlines {
            let Some(pos) = mapping[line] else { continue };
            match to_older.get(pos).copied().flatten() {
                Some(older_pos) => mapping[line] = Some(older_pos),
                None => {
                    on_line(line, &newer.hash)?;
                    mapping[line] = None;
                }
            }
        }
    }
    for line in 0..nlines {
        if mapping[line].is_some() {
            on_line(line, fallback)?;
        }
    }
    Ok(())
}

/// Reverse attribution: `chain` is oldest-first and `chain[0]` is the
/// displayed version. A display line that does not survive into the next
/// newer version was last present in the older one of the pair; lines
/// surviving the whole chain take `fallback`.
fn attribute_reverse(
    chain: &[Version],
    fallback: &str,
    mut on_line: impl FnMut(usize, &str) -> RepoResult<()>,
) -> RepoResult<()> {
    let Some(first) = chain.first() else {
        return Ok(());
    };
    let nlines = first.lines.len();
    let mut mapping: Vec<Option<usize>> = (0..nlines).map(Some).collect();
    for pair in chain.windows(2) {
        let (older, newer) = (&pair[0], &pair[1]);
        let ops = capture_diff_slices(Algorithm::Myers, &older.lines, &newer.lines);
        let mut to_newer: Vec<Option<usize>> = vec![None; older.lines.len()];
        for op in &ops {
            if op.tag() == DiffTag::Equal {
                let old_range = op.old_range();
                let new_range = op.new_range();
                for (o, n) in old_range.zip(new_range) {
                    to_newer[o] = Some(n);
                }
            }
        }
        for line in 0..nlines {
            let Some(pos) = mapping[line] else { continue };
            match to_newer.get(pos).copied().flatten() {
                Some(newer_pos) => mapping[line] = Some(newer_pos),
                None => {
                    on_line(line, &older.hash)?;
                    mapping[line] = None;
                }
            }
        }
    }
    for line in 0..nlines {
        if mapping[line].is_some() {
            on_line(line, fallback)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(hash: &str, text: &str) -> Version {
        Version {
            hash: hash.to_string(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    fn run_attribute(chain: &[Version], fallback: &str) -> Vec<String> {
        let n = chain.first().map(|v| v.lines.len()).unwrap_or(0);
        let mut out = vec![String::new(); n];
        attribute(chain, fallback, |line, hash| {
            assert!(out[line].is_empty(), "line {line} attributed twice");
            out[line] = hash.to_string();
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn lines_map_to_the_version_that_introduced_them() {
        // v3 (newest) added "three", v2 added "two", v1 had "one".
        let chain = vec![
            version("v3", "one\ntwo\nthree\n"),
            version("v2", "one\ntwo\n"),
            version("v1", "one\n"),
        ];
        assert_eq!(run_attribute(&chain, "v1"), vec!["v1", "v2", "v3"]);
    }

    #[test]
    fn modified_lines_belong_to_the_modifying_version() {
        let chain = vec![
            version("v2", "alpha\nCHANGED\ngamma\n"),
            version("v1", "alpha\nbeta\ngamma\n"),
        ];
        assert_eq!(run_attribute(&chain, "v1"), vec!["v1", "v2", "v1"]);
    }

    #[test]
    fn single_version_chain_uses_the_fallback() {
        let chain = vec![version("tip", "a\nb\n")];
        assert_eq!(run_attribute(&chain, "root"), vec!["root", "root"]);
    }

    fn run_attribute_reverse(chain: &[Version], fallback: &str) -> Vec<String> {
        let n = chain.first().map(|v| v.lines.len()).unwrap_or(0);
        let mut out = vec![String::new(); n];
        attribute_reverse(chain, fallback, |line, hash| {
            assert!(out[line].is_empty(), "line {line} attributed twice");
            out[line] = hash.to_string();
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn reverse_lines_map_to_the_last_version_that_carried_them() {
        // Oldest first: v2 rewrites "two", v3 drops "three". Display is
        // v1's content.
        let chain = vec![
            version("v1", "one\ntwo\nthree\n"),
            version("v2", "one\nTWO\nthree\n"),
            version("v3", "one\nTWO\n"),
        ];
        // "two" was last seen in v1, "three" in v2, and "one" survives
        // to the end of the chain.
        assert_eq!(run_attribute_reverse(&chain, "root"), vec!["root", "v1", "v2"]);
    }

    #[test]
    fn reverse_single_version_chain_uses_the_fallback() {
        let chain = vec![version("old", "a\nb\n")];
        assert_eq!(run_attribute_reverse(&chain, "old"), vec!["old", "old"]);
    }

    #[test]
    fn cancellation_propagates_from_the_callback() {
        let chain = vec![
            version("v2", "x\ny\n"),
            version("v1", "x\n"),
        ];
        let result = attribute(&chain, "v1", |_, _| Err(RepoError::Cancelled));
        assert!(matches!(result, Err(RepoError::Cancelled)));
    }

    #[test]
    fn offsets_exclude_trailing_empty_line() {
        assert_eq!(line_offsets("a\nbc\n"), vec![0, 2, 5]);
        assert_eq!(line_offsets("a\nbc"), vec![0, 2, 4]);
        assert_eq!(line_offsets(""), vec![0]);
    }

    #[test]
    fn reverse_cfg_without_commit_is_rejected() {
        let cfg = BlameCfg {
            path: "f.c".into(),
            reverse: true,
            ..BlameCfg::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = BlameCfg {
            path: "f.c".into(),
            reverse: true,
            commit: Some("abc123".into()),
            ..BlameCfg::default()
        };
        assert!(cfg.validate().is_ok());
    }
}
