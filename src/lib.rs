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

// Core library for fossick

pub mod app;
pub mod blame;
pub mod cli;
pub mod diff;
pub mod event;
pub mod repo;
pub mod search;
pub mod timeline;
pub mod tree;
pub mod views;

/// The artifact type recorded on a timeline event row.
///
/// The repository's event table tags each row with a short type code;
/// this enum is the decoded form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Checkin,
    Wiki,
    Tag,
    Technote,
    Ticket,
    Forum,
}

impl ArtifactKind {
    /// Decode the event-table type column (`ci`, `w`, `g`, `e`, `t`, `f`).
    pub fn from_event_type(t: &str) -> Option<ArtifactKind> {
        match t.as_bytes().first()? {
            b'c' => Some(ArtifactKind::Checkin),
            b'w' => Some(ArtifactKind::Wiki),
            b'g' => Some(ArtifactKind::Tag),
            b'e' => Some(ArtifactKind::Technote),
            b't' => Some(ArtifactKind::Ticket),
            b'f' => Some(ArtifactKind::Forum),
            _ => None,
        }
    }

    /// Encode back to the event-table type column for SQL filters.
    pub fn event_type(self) -> &'static str {
        match self {
            ArtifactKind::Checkin => "ci",
            ArtifactKind::Wiki => "w",
            ArtifactKind::Tag => "g",
            ArtifactKind::Technote => "e",
            ArtifactKind::Ticket => "t",
            ArtifactKind::Forum => "f",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Checkin => "checkin",
            ArtifactKind::Wiki => "wiki",
            ArtifactKind::Tag => "tag",
            ArtifactKind::Technote => "technote",
            ArtifactKind::Ticket => "ticket",
            ArtifactKind::Forum => "forum",
        }
    }
}

/// One row of repository history: a commit, wiki revision, ticket change,
/// tag change, technote, or forum post.
///
/// Produced by the timeline producer from an event row and shared between
/// the timeline queue and any child view displaying it, so consumers hold
/// `Arc<Commit>`.
#[derive(Debug, Clone)]
pub struct Commit {
    /// Repository-local row id; 0 designates the working-tree pseudo-commit.
    pub rid: i64,
    /// Full artifact hash (40 or 64 hex chars).
    pub hash: String,
    /// Primary parent hash; `None` for initial commits and most
    /// non-checkin artifacts.
    pub parent_hash: Option<String>,
    pub user: String,
    /// Event timestamp as rendered by the database (`YYYY-MM-DD HH:MM:SS`).
    pub timestamp: String,
    pub comment: String,
    /// Branch (comma-joined propagating symbolic tags), if any.
    pub branch: Option<String>,
    pub kind: ArtifactKind,
}

impl Commit {
    /// The date component of the timestamp.
    pub fn date(&self) -> &str {
        self.timestamp
            .split_once(' ')
            .map(|(d, _)| d)
            .unwrap_or(&self.timestamp)
    }
}

/// How a file changed between a checkin and its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Renamed,
    /// Tracked but absent from the working tree.
    Missing,
    MergeAdd,
    IntegrateAdd,
}

impl ChangeKind {
    /// Changeset marker used in the diff meta block.
    pub fn marker(self) -> &'static str {
        match self {
            ChangeKind::Modified => "[~] ",
            ChangeKind::Added | ChangeKind::MergeAdd | ChangeKind::IntegrateAdd => "[+] ",
            ChangeKind::Renamed => "[>] ",
            ChangeKind::Removed => "[-] ",
            ChangeKind::Missing => "[!] ",
        }
    }
}

/// One entry of a checkin's changeset: the file-level difference between
/// the checkin and its primary parent.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub name: String,
    /// Name in the parent checkin when the file was renamed.
    pub prior_name: Option<String>,
    /// Content hash in the parent checkin; `None` for added files.
    pub old_uuid: Option<String>,
    /// Content hash in this checkin; `None` for removed files.
    pub new_uuid: Option<String>,
    pub kind: ChangeKind,
}
