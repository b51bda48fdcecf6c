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

pub mod deck;
pub mod delta;
pub mod fossil_impl;

pub use fossil_impl::FossilRepo;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::{ArtifactKind, Commit, FileChange};
use deck::Deck;

/// Errors surfaced by repository access.
///
/// `Cancelled` is reserved for the blame annotator's cooperative abort
/// path; it never reaches the user.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("ambiguous name: {0}")]
    Ambiguous(String),
    #[error("malformed artifact: {0}")]
    Malformed(String),
    #[error("invalid argument: {0}")]
    Arg(String),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation cancelled")]
    Cancelled,
}

pub type RepoResult<T> = Result<T, RepoError>;

/// A repository handle shared between the UI and background workers.
pub type SharedRepo = Arc<dyn ScmRepo>;

/// A resolved symbolic name or hash prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub rid: i64,
    pub hash: String,
}

/// Keyset cursor into the timeline: the `(event.mtime, rid)` of the last
/// row of the previous page. Pages are disjoint by construction, which is
/// what makes restarting the cursor after a detour safe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineCursor {
    pub mtime: f64,
    pub rid: i64,
}

/// One page of timeline rows plus the cursor to request the next page.
/// `cursor` is `None` when the underlying query is exhausted.
#[derive(Debug)]
pub struct TimelinePage {
    pub commits: Vec<Commit>,
    pub cursor: Option<TimelineCursor>,
}

/// Constraints applied to the timeline query.
#[derive(Debug, Clone, Default)]
pub struct TimelineFilter {
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub user: Option<String>,
    /// Repository-relative path; restricts to events touching the path or
    /// any descendant.
    pub path: Option<String>,
    pub kinds: Vec<ArtifactKind>,
    /// Upper bound on event mtime, from an explicit starting commit.
    pub start_mtime: Option<f64>,
    /// Total record cap; 0 means unlimited.
    pub limit: usize,
    /// Render timestamps in UTC instead of localtime.
    pub utc: bool,
}

/// The open working checkout, when there is one.
#[derive(Debug, Clone)]
pub struct CheckoutInfo {
    /// Absolute path of the checkout root directory.
    pub root: PathBuf,
    /// Rid of the checked-out version.
    pub rid: i64,
    /// Hash of the checked-out version.
    pub hash: String,
}

/// One row of the checkout's file table, used for working-tree diffs.
#[derive(Debug, Clone)]
pub struct VFileEntry {
    pub pathname: String,
    /// Pre-rename name, when the file was renamed in the working tree.
    pub orig_name: Option<String>,
    /// Content hash of the checked-out version of this file.
    pub uuid: Option<String>,
    pub deleted: bool,
    /// Change state maintained by the SCM (0 = unchanged).
    pub changed: i64,
    pub is_exe: bool,
    pub is_link: bool,
}

/// Abstraction over repository access.
///
/// Isolates the SQLite-backed `FossilRepo` implementation to the
/// `repo::fossil_impl` module. Callers work through this trait so that
/// the real implementation can be swapped with a fake in tests, and so
/// background workers can share one handle (`SharedRepo`).
pub trait ScmRepo: Send + Sync {
    /// Fetch one page of timeline rows matching `filter`, starting after
    /// `cursor` (or from the top when `None`), at most `limit` rows.
    fn timeline_page(
        &self,
        filter: &TimelineFilter,
        cursor: Option<TimelineCursor>,
        limit: usize,
    ) -> RepoResult<TimelinePage>;

    /// Resolve a symbolic name: `tip`, `current`, a branch or tag name,
    /// or a unique hash prefix.
    fn resolve(&self, symbol: &str) -> RepoResult<Resolved>;

    /// Build the commit artifact for one event row.
    fn commit(&self, rid: i64) -> RepoResult<Commit>;

    /// Raw event mtime of an artifact, used as a timeline starting bound.
    fn event_mtime(&self, rid: i64) -> RepoResult<f64>;

    /// Primary parent of a checkin, if any.
    fn parent_of(&self, rid: i64) -> RepoResult<Option<Resolved>>;

    /// File-level changes between a checkin and its primary parent.
    fn changeset(&self, rid: i64) -> RepoResult<Vec<FileChange>>;

    /// Load and parse an artifact into a deck. For delta manifests the
    /// returned deck carries the effective (baseline-merged) F cards.
    fn deck(&self, rid: i64) -> RepoResult<Deck>;

    /// Raw artifact content by rid, with delta chains resolved.
    fn content(&self, rid: i64) -> RepoResult<Vec<u8>>;

    /// File content by its full uuid.
    fn content_by_uuid(&self, uuid: &str) -> RepoResult<Vec<u8>>;

    /// Hash of the first checkin on the main branch, used as the
    /// reverse-blame fallback origin.
    fn root_commit(&self) -> RepoResult<String>;

    /// The open working checkout, if the repository was discovered
    /// through one.
    fn checkout(&self) -> Option<&CheckoutInfo>;

    /// File table of the current checkout version, ordered by pathname.
    fn vfile_entries(&self) -> RepoResult<Vec<VFileEntry>>;
}
