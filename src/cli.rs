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

// Command-line interface

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::repo::{ScmRepo, TimelineFilter};
use crate::ArtifactKind;

/// Read-only terminal browser for Fossil-style repositories.
#[derive(Debug, Parser)]
#[command(name = "fsk", version, about, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Repository database to open, bypassing checkout discovery.
    #[arg(short = 'R', long = "repo", global = true, value_name = "DB")]
    pub repo: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Bare invocation is `fsk timeline`.
    #[command(flatten)]
    pub timeline: TimelineArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chronological timeline of repository events.
    Timeline(TimelineArgs),
    /// Unified diff of a commit, two commits, or the working tree.
    Diff(DiffArgs),
    /// Browse the file tree of a commit.
    Tree(TreeArgs),
    /// Per-line annotation of a tracked file.
    Blame(BlameArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Checkin,
    Wiki,
    Tag,
    Technote,
    Ticket,
    Forum,
}

impl From<TypeArg> for ArtifactKind {
    fn from(t: TypeArg) -> ArtifactKind {
        match t {
            TypeArg::Checkin => ArtifactKind::Checkin,
            TypeArg::Wiki => ArtifactKind::Wiki,
            TypeArg::Tag => ArtifactKind::Tag,
            TypeArg::Technote => ArtifactKind::Technote,
            TypeArg::Ticket => ArtifactKind::Ticket,
            TypeArg::Forum => ArtifactKind::Forum,
        }
    }
}

#[derive(Debug, Default, Args)]
pub struct TimelineArgs {
    /// Only show commits carrying the given tag.
    #[arg(short = 'T', long = "tag", value_name = "TAG")]
    pub tag: Option<String>,

    /// Only show commits on the given branch.
    #[arg(short = 'b', long = "branch", value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Start the timeline at the given commit.
    #[arg(short = 'c', long = "commit", value_name = "COMMIT")]
    pub commit: Option<String>,

    /// Limit the number of records loaded.
    #[arg(short = 'n', long = "limit", value_name = "N")]
    pub limit: Option<usize>,

    /// Only show the given artifact types (may be repeated).
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub types: Vec<TypeArg>,

    /// Only show commits by the given user.
    #[arg(short = 'u', long = "user", value_name = "USER")]
    pub user: Option<String>,

    /// Render timestamps in UTC rather than local time.
    #[arg(short = 'z', long = "utc")]
    pub utc: bool,

    /// Only show commits touching this path or its descendants.
    #[arg(value_name = "PATH")]
    pub path: Option<String>,
}

impl TimelineArgs {
    /// Turn the arguments into a timeline filter, resolving the starting
    /// commit against the repository.
    pub fn into_filter(self, repo: &dyn ScmRepo) -> Result<TimelineFilter> {
        let start_mtime = match &self.commit {
            Some(symbol) => {
                let resolved = repo
                    .resolve(symbol)
                    .with_context(|| format!("resolving '{symbol}'"))?;
                Some(repo.event_mtime(resolved.rid)?)
            }
            None => None,
        };
        Ok(TimelineFilter {
            branch: self.branch,
            tag: self.tag,
            user: self.user,
            path: self.path.map(normalize_repo_path),
            kinds: self.types.into_iter().map(ArtifactKind::from).collect(),
            start_mtime,
            limit: self.limit.unwrap_or(0),
            utc: self.utc,
        })
    }
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Disable coloured output.
    #[arg(short = 'C', long = "no-colour")]
    pub no_colour: bool,

    /// Invert the diff.
    #[arg(short = 'i', long = "invert")]
    pub invert: bool,

    /// Omit the content of added and removed files.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Ignore whitespace-only changes.
    #[arg(short = 'w', long = "whitespace")]
    pub whitespace: bool,

    /// Number of context lines (max 64).
    #[arg(short = 'x', long = "context", value_name = "N")]
    pub context: Option<usize>,

    /// Zero commits diff the working tree; one diffs against its parent;
    /// two diff each other.
    #[arg(value_name = "COMMIT", num_args = 0..=2)]
    pub commits: Vec<String>,
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Disable coloured output.
    #[arg(short = 'C', long = "no-colour")]
    pub no_colour: bool,

    /// Commit whose tree to browse (default: checkout, else tip).
    #[arg(short = 'c', long = "commit", value_name = "COMMIT")]
    pub commit: Option<String>,

    /// Directory or file to open at startup.
    #[arg(value_name = "PATH")]
    pub path: Option<String>,
}

#[derive(Debug, Args)]
pub struct BlameArgs {
    /// Commit to blame from (default: checkout, else tip).
    #[arg(short = 'c', long = "commit", value_name = "COMMIT")]
    pub commit: Option<String>,

    /// Blame in reverse from the given commit.
    #[arg(short = 'r', long = "reverse", requires = "commit")]
    pub reverse: bool,

    /// Limit the depth of history walked.
    #[arg(short = 'n', long = "limit", value_name = "N")]
    pub limit: Option<usize>,

    /// Tracked file to annotate.
    #[arg(value_name = "PATH")]
    pub path: String,
}

/// Normalise a user-supplied path to repository-relative form.
pub fn normalize_repo_path(path: String) -> String {
    path.trim_start_matches("./")
        .trim_matches('/')
        .to_string()
}
