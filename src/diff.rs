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

// Diff engine: assembles headers, changeset and per-file text diffs into
// a line-indexed buffer. The strategy depends on the artifact: a checkin
// diffs its deck against the primary parent's, the working-tree
// pseudo-commit reconciles the checkout file table against disk, and
// non-checkin artifacts render a linearised presentation.

use std::collections::BTreeMap;

use similar::{capture_diff_slices, group_diff_ops, Algorithm, DiffTag};
use unicode_width::UnicodeWidthChar;

use crate::repo::deck::FCard;
use crate::repo::{RepoError, RepoResult, ScmRepo};
use crate::{ArtifactKind, ChangeKind, Commit, FileChange};

/// Context lines shown around each hunk by default.
pub const DEFAULT_CONTEXT: usize = 5;
/// Upper bound on the context setting.
pub const MAX_CONTEXT: usize = 64;
/// Inputs beyond this size get a marker instead of a textual diff.
const MAX_DIFF_BYTES: usize = 8 * 1024 * 1024;

const NULL_DEVICE: &str = "/dev/null";
const WORKING_COPY: &str = "(working copy)";

/// Diff engine flags.
#[derive(Debug, Clone)]
pub struct DiffOpts {
    pub context: usize,
    pub ignore_ws: bool,
    pub invert: bool,
    /// When off, added and removed files show headers only.
    pub verbose: bool,
    pub show_meta: bool,
    /// Column budget used to word-wrap the commit comment.
    pub wrap_width: usize,
}

impl Default for DiffOpts {
    fn default() -> Self {
        DiffOpts {
            context: DEFAULT_CONTEXT,
            ignore_ws: false,
            invert: false,
            verbose: true,
            show_meta: true,
            wrap_width: 80,
        }
    }
}

/// A diff assembled into one buffer plus the byte offset of every line
/// start. The index always has `nlines + 1` entries so that
/// `offsets[i + 1] - offsets[i]` is the byte length of line `i`
/// including its newline.
#[derive(Debug)]
pub struct DiffBuffer {
    text: String,
    offsets: Vec<usize>,
}

impl Default for DiffBuffer {
    fn default() -> DiffBuffer {
        DiffBuffer::new()
    }
}

impl DiffBuffer {
    pub fn new() -> DiffBuffer {
        DiffBuffer {
            text: String::new(),
            offsets: vec![0],
        }
    }

    pub fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.offsets.push(self.text.len());
    }

    pub fn nlines(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Line `idx` without its trailing newline.
    pub fn line(&self, idx: usize) -> Option<&str> {
        if idx >= self.nlines() {
            return None;
        }
        let line = &self.text[self.offsets[idx]..self.offsets[idx + 1]];
        Some(line.strip_suffix('\n').unwrap_or(line))
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }
}

/// Output of the engine: the indexed buffer plus the changeset it
/// computed along the way (displayed in the meta block and kept by the
/// diff view).
#[derive(Debug, Default)]
pub struct DiffResult {
    pub buffer: DiffBuffer,
    pub changeset: Vec<FileChange>,
}

/// Build the diff for one commit: against its primary parent for
/// checkins, against the checkout for the working-tree pseudo-commit
/// (rid 0), and the linearised rendition for everything else.
pub fn commit_diff(repo: &dyn ScmRepo, commit: &Commit, opts: &DiffOpts) -> RepoResult<DiffResult> {
    let mut out = DiffResult::default();
    match commit.kind {
        ArtifactKind::Checkin if commit.rid == 0 => {
            out.changeset = checkout_changeset(repo)?;
            write_meta(&mut out.buffer, commit, &out.changeset, opts);
            diff_checkout(repo, &mut out, opts)?;
        }
        ArtifactKind::Checkin => {
            out.changeset = repo.changeset(commit.rid)?;
            write_meta(&mut out.buffer, commit, &out.changeset, opts);
            diff_checkin(repo, commit, &mut out.buffer, opts)?;
        }
        _ => {
            write_meta(&mut out.buffer, commit, &[], opts);
            diff_non_checkin(repo, commit, &mut out.buffer, opts)?;
        }
    }
    Ok(out)
}

/// Diff two arbitrary checkins (`fsk diff old new`). The changeset is
/// derived from the two decks rather than the parent-link table.
pub fn two_commit_diff(
    repo: &dyn ScmRepo,
    old: &Commit,
    new: &Commit,
    opts: &DiffOpts,
) -> RepoResult<DiffResult> {
    let old_deck = repo.deck(old.rid)?;
    let new_deck = repo.deck(new.rid)?;
    let mut out = DiffResult {
        changeset: pair_fcards(&old_deck.fcards, &new_deck.fcards),
        ..DiffResult::default()
    };
    write_meta(&mut out.buffer, new, &out.changeset, opts);
    let changes = out.changeset.clone();
    for change in &changes {
        diff_one_change(repo, change, &mut out.buffer, opts)?;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Meta block
// ---------------------------------------------------------------------------

fn write_meta(buf: &mut DiffBuffer, commit: &Commit, changeset: &[FileChange], opts: &DiffOpts) {
    if !opts.show_meta {
        return;
    }
    buf.push_line(&format!("{} {}", commit.kind.label(), commit.hash));
    buf.push_line(&format!("user: {}", commit.user));
    buf.push_line(&format!(
        "tags: {}",
        commit.branch.as_deref().unwrap_or(NULL_DEVICE)
    ));
    buf.push_line(&format!("date: {}", commit.timestamp));
    buf.push_line("");
    for line in commit.comment.split('\n') {
        for wrapped in wrap_line(line, opts.wrap_width) {
            buf.push_line(&wrapped);
        }
    }
    buf.push_line("");
    for change in changeset {
        match change.kind {
            ChangeKind::Renamed => {
                let prior = change.prior_name.as_deref().unwrap_or("?");
                buf.push_line(&format!("{}{} -> {}", change.kind.marker(), prior, change.name));
            }
            _ => buf.push_line(&format!("{}{}", change.kind.marker(), change.name)),
        }
    }
}

/// Word-wrap a single comment line to `width` display columns. Does not
/// break words; a word longer than the budget overflows its row.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(16);
    if display_width(line) < width {
        return vec![line.to_string()];
    }
    let mut rows = Vec::new();
    let mut row = String::new();
    let mut row_width = 0usize;
    for word in line.split(' ') {
        let word_width = display_width(word);
        if row_width > 0 && row_width + 1 + word_width >= width {
            rows.push(std::mem::take(&mut row));
            row_width = 0;
        }
        if row_width > 0 {
            row.push(' ');
            row_width += 1;
        }
        row.push_str(word);
        row_width += word_width;
    }
    if !row.is_empty() || rows.is_empty() {
        rows.push(row);
    }
    rows
}

fn display_width(s: &str) -> usize {
    s.chars().map(|c| c.width().unwrap_or(0)).sum()
}

// ---------------------------------------------------------------------------
// Checkin bodies
// ---------------------------------------------------------------------------

fn diff_checkin(
    repo: &dyn ScmRepo,
    commit: &Commit,
    buf: &mut DiffBuffer,
    opts: &DiffOpts,
) -> RepoResult<()> {
    let deck = repo.deck(commit.rid)?;
    let parent_fcards = match &commit.parent_hash {
        Some(parent) => {
            let parent_rid = repo.resolve(parent)?.rid;
            repo.deck(parent_rid)?.fcards
        }
        None => Vec::new(),
    };
    let changes = pair_fcards(&parent_fcards, &deck.fcards);
    for change in &changes {
        diff_one_change(repo, change, buf, opts)?;
    }
    Ok(())
}

/// Pair two effective F-card lists by name, classifying each pair.
/// Identical (uuid, perms) pairs are skipped; a card whose prior-name
/// matches a card of the old deck becomes a rename.
pub fn pair_fcards(old: &[FCard], new: &[FCard]) -> Vec<FileChange> {
    let old_by_name: BTreeMap<&str, &FCard> =
        old.iter().map(|f| (f.name.as_str(), f)).collect();
    let mut consumed: Vec<&str> = Vec::new();
    let mut changes = Vec::new();
    for card in new {
        if let Some(prior) = card
            .prior_name
            .as_deref()
            .and_then(|pn| old_by_name.get(pn).map(|f| (pn, *f)))
        {
            let (prior_name, old_card) = prior;
            consumed.push(prior_name);
            changes.push(FileChange {
                name: card.name.clone(),
                prior_name: Some(prior_name.to_string()),
                old_uuid: old_card.uuid.clone(),
                new_uuid: card.uuid.clone(),
                kind: ChangeKind::Renamed,
            });
        } else if let Some(old_card) = old_by_name.get(card.name.as_str()) {
            consumed.push(card.name.as_str());
            if old_card.uuid == card.uuid && old_card.perms == card.perms {
                continue;
            }
            changes.push(FileChange {
                name: card.name.clone(),
                prior_name: None,
                old_uuid: old_card.uuid.clone(),
                new_uuid: card.uuid.clone(),
                kind: ChangeKind::Modified,
            });
        } else {
            changes.push(FileChange {
                name: card.name.clone(),
                prior_name: None,
                old_uuid: None,
                new_uuid: card.uuid.clone(),
                kind: ChangeKind::Added,
            });
        }
    }
    for (name, card) in &old_by_name {
        if !consumed.contains(name) {
            changes.push(FileChange {
                name: name.to_string(),
                prior_name: None,
                old_uuid: card.uuid.clone(),
                new_uuid: None,
                kind: ChangeKind::Removed,
            });
        }
    }
    changes.sort_by(|a, b| a.name.cmp(&b.name));
    changes
}

fn diff_one_change(
    repo: &dyn ScmRepo,
    change: &FileChange,
    buf: &mut DiffBuffer,
    opts: &DiffOpts,
) -> RepoResult<()> {
    let old_text = match &change.old_uuid {
        Some(uuid) => Some(lossy_text(repo.content_by_uuid(uuid)?)),
        None => None,
    };
    let new_text = match &change.new_uuid {
        Some(uuid) => Some(lossy_text(repo.content_by_uuid(uuid)?)),
        None => None,
    };
    let old_name = change.prior_name.as_deref().unwrap_or(&change.name);
    write_file_diff(
        buf,
        FileSides {
            change: change.kind,
            old_name: change.old_uuid.as_ref().map(|_| old_name),
            new_name: change.new_uuid.as_ref().map(|_| change.name.as_str()),
            old_hash: change.old_uuid.as_deref(),
            new_hash: change.new_uuid.as_deref(),
        },
        old_text.as_deref(),
        new_text.as_deref(),
        opts,
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Working-tree body
// ---------------------------------------------------------------------------

/// Reconcile the checkout file table against the on-disk state into a
/// changeset for the working-tree pseudo-commit.
fn checkout_changeset(repo: &dyn ScmRepo) -> RepoResult<Vec<FileChange>> {
    let root = repo
        .checkout()
        .ok_or_else(|| RepoError::NotFound("no open checkout".into()))?
        .root
        .clone();
    let mut changes = Vec::new();
    for entry in repo.vfile_entries()? {
        let disk = root.join(&entry.pathname);
        let kind = if entry.deleted {
            ChangeKind::Removed
        } else if entry.uuid.is_none() {
            ChangeKind::Added
        } else if !disk.exists() && std::fs::read_link(&disk).is_err() {
            ChangeKind::Missing
        } else if entry.changed != 0 {
            ChangeKind::Modified
        } else {
            let repo_content = entry
                .uuid
                .as_deref()
                .map(|u| repo.content_by_uuid(u))
                .transpose()?
                .unwrap_or_default();
            match read_working_file(&disk, entry.is_link) {
                Ok(on_disk) if on_disk == repo_content => continue,
                Ok(_) => ChangeKind::Modified,
                Err(_) => ChangeKind::Missing,
            }
        };
        changes.push(FileChange {
            name: entry.pathname,
            prior_name: entry.orig_name,
            old_uuid: entry.uuid,
            new_uuid: None,
            kind,
        });
    }
    Ok(changes)
}

fn diff_checkout(repo: &dyn ScmRepo, out: &mut DiffResult, opts: &DiffOpts) -> RepoResult<()> {
    let root = repo
        .checkout()
        .ok_or_else(|| RepoError::NotFound("no open checkout".into()))?
        .root
        .clone();
    let changes = out.changeset.clone();
    for change in &changes {
        let old_text = match &change.old_uuid {
            Some(uuid) => Some(lossy_text(repo.content_by_uuid(uuid)?)),
            None => None,
        };
        let disk = root.join(&change.name);
        let new_text = match change.kind {
            ChangeKind::Removed | ChangeKind::Missing => None,
            _ => read_working_file(&disk, false).ok().map(lossy_text),
        };
        write_file_diff(
            &mut out.buffer,
            FileSides {
                change: change.kind,
                old_name: change.old_uuid.as_ref().map(|_| change.name.as_str()),
                new_name: new_text.as_ref().map(|_| change.name.as_str()),
                old_hash: change.old_uuid.as_deref(),
                new_hash: new_text.as_ref().map(|_| WORKING_COPY),
            },
            old_text.as_deref(),
            new_text.as_deref(),
            opts,
        );
    }
    Ok(())
}

/// Read a working file; symlinks contribute their target path, matching
/// how link content is versioned.
fn read_working_file(path: &std::path::Path, is_link: bool) -> std::io::Result<Vec<u8>> {
    let meta = std::fs::symlink_metadata(path)?;
    if is_link || meta.file_type().is_symlink() {
        let target = std::fs::read_link(path)?;
        return Ok(target.to_string_lossy().into_owned().into_bytes());
    }
    std::fs::read(path)
}

// ---------------------------------------------------------------------------
// Non-checkin bodies
// ---------------------------------------------------------------------------

fn diff_non_checkin(
    repo: &dyn ScmRepo,
    commit: &Commit,
    buf: &mut DiffBuffer,
    opts: &DiffOpts,
) -> RepoResult<()> {
    let deck = repo.deck(commit.rid)?;
    match commit.kind {
        ArtifactKind::Ticket => {
            for card in &deck.jcards {
                let op = if card.append { "+" } else { "" };
                buf.push_line(&format!(
                    "{}{}: {}",
                    op,
                    card.field,
                    card.value.as_deref().unwrap_or("")
                ));
            }
        }
        ArtifactKind::Tag => {
            for card in &deck.tcards {
                let mut line = format!(
                    "{} tag {} {}",
                    card.disposition.label(),
                    card.name,
                    card.target
                );
                if let Some(value) = &card.value {
                    line.push_str(&format!(" -> {value}"));
                }
                buf.push_line(&line);
            }
        }
        ArtifactKind::Wiki | ArtifactKind::Technote | ArtifactKind::Forum => {
            let body = deck.body.clone().unwrap_or_default();
            let parent_body = match &commit.parent_hash {
                Some(parent) => {
                    let parent_rid = repo.resolve(parent)?.rid;
                    repo.deck(parent_rid)?.body.unwrap_or_default()
                }
                None => String::new(),
            };
            let title = deck
                .wiki_title
                .clone()
                .or(deck.technote_id.clone())
                .unwrap_or_else(|| commit.kind.label().to_string());
            write_file_diff(
                buf,
                FileSides {
                    change: if parent_body.is_empty() {
                        ChangeKind::Added
                    } else {
                        ChangeKind::Modified
                    },
                    old_name: (!parent_body.is_empty()).then_some(title.as_str()),
                    new_name: Some(title.as_str()),
                    old_hash: commit.parent_hash.as_deref(),
                    new_hash: Some(commit.hash.as_str()),
                },
                (!parent_body.is_empty()).then_some(parent_body.as_str()),
                Some(body.as_str()),
                opts,
            );
            if commit.kind == ArtifactKind::Technote && !body.is_empty() {
                buf.push_line("");
                for line in body.lines() {
                    buf.push_line(line);
                }
            }
        }
        ArtifactKind::Checkin => unreachable!("checkins take the deck-walk path"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-file rendering
// ---------------------------------------------------------------------------

struct FileSides<'a> {
    change: ChangeKind,
    old_name: Option<&'a str>,
    new_name: Option<&'a str>,
    old_hash: Option<&'a str>,
    new_hash: Option<&'a str>,
}

fn write_file_diff(
    buf: &mut DiffBuffer,
    sides: FileSides<'_>,
    old_text: Option<&str>,
    new_text: Option<&str>,
    opts: &DiffOpts,
) {
    let (sides, old_text, new_text) = if opts.invert {
        (
            FileSides {
                change: invert_change(sides.change),
                old_name: sides.new_name,
                new_name: sides.old_name,
                old_hash: sides.new_hash,
                new_hash: sides.old_hash,
            },
            new_text,
            old_text,
        )
    } else {
        (sides, old_text, new_text)
    };

    let index = sides
        .new_name
        .or(sides.old_name)
        .unwrap_or(NULL_DEVICE);
    let (minus_hash, plus_hash) = match sides.change {
        ChangeKind::Added | ChangeKind::MergeAdd | ChangeKind::IntegrateAdd => {
            (NULL_DEVICE, sides.new_hash.unwrap_or(NULL_DEVICE))
        }
        ChangeKind::Removed | ChangeKind::Missing => {
            (sides.old_hash.unwrap_or(NULL_DEVICE), NULL_DEVICE)
        }
        _ => (
            sides.old_hash.unwrap_or(NULL_DEVICE),
            sides.new_hash.unwrap_or(NULL_DEVICE),
        ),
    };
    buf.push_line("");
    buf.push_line(&format!("Index: {index}"));
    buf.push_line(&"=".repeat(71));
    buf.push_line(&format!("hash - {minus_hash}"));
    buf.push_line(&format!("hash + {plus_hash}"));
    buf.push_line(&format!("--- {}", sides.old_name.unwrap_or(NULL_DEVICE)));
    buf.push_line(&format!("+++ {}", sides.new_name.unwrap_or(NULL_DEVICE)));

    let old = old_text.unwrap_or("");
    let new = new_text.unwrap_or("");
    if !opts.verbose && (old_text.is_none() || new_text.is_none()) {
        return;
    }
    if old.contains('\0') || new.contains('\0') {
        buf.push_line("Binary files differ");
        return;
    }
    if old.len() > MAX_DIFF_BYTES || new.len() > MAX_DIFF_BYTES {
        buf.push_line("Diff too large to display");
        return;
    }
    unified_diff(buf, old, new, opts);
}

fn invert_change(kind: ChangeKind) -> ChangeKind {
    match kind {
        ChangeKind::Added | ChangeKind::MergeAdd | ChangeKind::IntegrateAdd => ChangeKind::Removed,
        ChangeKind::Removed | ChangeKind::Missing => ChangeKind::Added,
        other => other,
    }
}

/// Emit unified-diff hunks for two texts. Whitespace-insensitive mode
/// compares stripped line keys but emits the original lines.
fn unified_diff(buf: &mut DiffBuffer, old: &str, new: &str, opts: &DiffOpts) {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let ops = if opts.ignore_ws {
        let old_keys: Vec<String> = old_lines.iter().map(|l| strip_ws(l)).collect();
        let new_keys: Vec<String> = new_lines.iter().map(|l| strip_ws(l)).collect();
        capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys)
    } else {
        capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines)
    };
    if ops.iter().all(|op| op.tag() == DiffTag::Equal) {
        return;
    }
    for group in group_diff_ops(ops, opts.context) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_start = first.old_range().start;
        let old_len = last.old_range().end - old_start;
        let new_start = first.new_range().start;
        let new_len = last.new_range().end - new_start;
        buf.push_line(&format!(
            "@@ -{},{} +{},{} @@",
            if old_len == 0 { old_start } else { old_start + 1 },
            old_len,
            if new_len == 0 { new_start } else { new_start + 1 },
            new_len,
        ));
        for op in group {
            match op.tag() {
                DiffTag::Equal => {
                    for line in &old_lines[op.old_range()] {
                        buf.push_line(&format!(" {line}"));
                    }
                }
                DiffTag::Delete => {
                    for line in &old_lines[op.old_range()] {
                        buf.push_line(&format!("-{line}"));
                    }
                }
                DiffTag::Insert => {
                    for line in &new_lines[op.new_range()] {
                        buf.push_line(&format!("+{line}"));
                    }
                }
                DiffTag::Replace => {
                    for line in &old_lines[op.old_range()] {
                        buf.push_line(&format!("-{line}"));
                    }
                    for line in &new_lines[op.new_range()] {
                        buf.push_line(&format!("+{line}"));
                    }
                }
            }
        }
    }
}

fn strip_ws(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

fn lossy_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::deck::FilePerm;

    fn fcard(name: &str, uuid: &str) -> FCard {
        FCard {
            name: name.to_string(),
            uuid: Some(uuid.to_string()),
            perms: FilePerm::Regular,
            prior_name: None,
        }
    }

    #[test]
    fn buffer_offsets_cover_every_line() {
        let mut buf = DiffBuffer::new();
        buf.push_line("alpha");
        buf.push_line("");
        buf.push_line("beta!");
        assert_eq!(buf.nlines(), 3);
        assert_eq!(buf.offsets().len(), 4);
        for i in 0..buf.nlines() {
            let len = buf.offsets()[i + 1] - buf.offsets()[i];
            assert_eq!(len, buf.line(i).unwrap().len() + 1);
        }
        assert_eq!(buf.line(0), Some("alpha"));
        assert_eq!(buf.line(1), Some(""));
        assert_eq!(buf.line(3), None);
    }

    #[test]
    fn pairing_classifies_all_change_kinds() {
        let old = vec![
            fcard("gone.c", "g1"),
            fcard("kept.c", "k1"),
            fcard("moved.c", "m1"),
            fcard("same.c", "s1"),
        ];
        let new = vec![
            FCard {
                prior_name: Some("moved.c".to_string()),
                ..fcard("dest.c", "m1")
            },
            fcard("fresh.c", "f1"),
            fcard("kept.c", "k2"),
            fcard("same.c", "s1"),
        ];
        let changes = pair_fcards(&old, &new);
        let summary: Vec<(&str, ChangeKind)> = changes
            .iter()
            .map(|c| (c.name.as_str(), c.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("dest.c", ChangeKind::Renamed),
                ("fresh.c", ChangeKind::Added),
                ("gone.c", ChangeKind::Removed),
                ("kept.c", ChangeKind::Modified),
            ]
        );
        let rename = &changes[0];
        assert_eq!(rename.prior_name.as_deref(), Some("moved.c"));
        assert_eq!(rename.old_uuid.as_deref(), Some("m1"));
    }

    #[test]
    fn perm_change_without_content_change_is_modified() {
        let old = vec![fcard("run.sh", "u1")];
        let new = vec![FCard {
            perms: FilePerm::Executable,
            ..fcard("run.sh", "u1")
        }];
        let changes = pair_fcards(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn unified_diff_emits_hunk_with_context() {
        let old = "a\nb\nc\nd\ne\nf\ng\n";
        let new = "a\nb\nc\nX\ne\nf\ng\n";
        let mut buf = DiffBuffer::new();
        unified_diff(
            &mut buf,
            old,
            new,
            &DiffOpts {
                context: 1,
                ..DiffOpts::default()
            },
        );
        let lines: Vec<&str> = (0..buf.nlines()).map(|i| buf.line(i).unwrap()).collect();
        assert_eq!(lines, vec!["@@ -3,3 +3,3 @@", " c", "-d", "+X", " e"]);
    }

    #[test]
    fn unified_diff_is_silent_for_equal_inputs() {
        let mut buf = DiffBuffer::new();
        unified_diff(&mut buf, "same\n", "same\n", &DiffOpts::default());
        assert_eq!(buf.nlines(), 0);
    }

    #[test]
    fn whitespace_insensitive_mode_ignores_reindentation() {
        let old = "fn main() {\n    call();\n}\n";
        let new = "fn main() {\n\tcall();\n}\n";
        let mut buf = DiffBuffer::new();
        unified_diff(
            &mut buf,
            old,
            new,
            &DiffOpts {
                ignore_ws: true,
                ..DiffOpts::default()
            },
        );
        assert_eq!(buf.nlines(), 0);
    }

    #[test]
    fn wrap_line_breaks_at_word_boundaries() {
        let rows = wrap_line("one two three four five six seven", 16);
        assert!(rows.len() > 1);
        for row in &rows {
            assert!(display_width(row) <= 16, "row too wide: {row:?}");
        }
        assert_eq!(rows.join(" "), "one two three four five six seven");
        assert_eq!(wrap_line("short", 80), vec!["short".to_string()]);
    }
}
