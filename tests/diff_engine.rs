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

// Diff engine output against a real repository database.

mod common;

use common::TestRepo;
use fossick::diff::{commit_diff, two_commit_diff, DiffOpts, DiffResult};
use fossick::repo::ScmRepo;
use fossick::{ChangeKind, Commit};

fn lines(result: &DiffResult) -> Vec<String> {
    (0..result.buffer.nlines())
        .map(|i| result.buffer.line(i).unwrap().to_string())
        .collect()
}

fn load_commit(repo: &dyn ScmRepo, rid: i64) -> Commit {
    repo.commit(rid).unwrap()
}

fn repo_with_history() -> TestRepo {
    let mut fixture = TestRepo::new();
    fixture.commit(
        "initial import",
        "alice",
        &[
            ("src/main.c", Some("int main(void) {\n\treturn 0;\n}\n")),
            ("README", Some("hello\n")),
        ],
    );
    fixture.commit(
        "teach main to fail",
        "bob",
        &[
            ("src/main.c", Some("int main(void) {\n\treturn 1;\n}\n")),
            ("NEWS", Some("1.0 released\n")),
            ("README", None),
        ],
    );
    fixture
}

#[test]
fn changeset_classifies_file_links() {
    let fixture = repo_with_history();
    let repo = fixture.repo();
    let (rid, _) = fixture.commits[1].clone();
    let changes = repo.changeset(rid).unwrap();
    let summary: Vec<(&str, ChangeKind)> = changes
        .iter()
        .map(|c| (c.name.as_str(), c.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("NEWS", ChangeKind::Added),
            ("README", ChangeKind::Removed),
            ("src/main.c", ChangeKind::Modified),
        ]
    );
}

#[test]
fn meta_block_carries_commit_identity_and_changeset() {
    let fixture = repo_with_history();
    let repo = fixture.repo();
    let (rid, uuid) = fixture.commits[1].clone();
    let commit = load_commit(&repo, rid);
    let result = commit_diff(&repo, &commit, &DiffOpts::default()).unwrap();
    let lines = lines(&result);

    assert_eq!(lines[0], format!("checkin {uuid}"));
    assert_eq!(lines[1], "user: bob");
    assert_eq!(lines[2], "tags: trunk");
    assert!(lines[3].starts_with("date: "));
    assert!(lines.contains(&"teach main to fail".to_string()));
    assert!(lines.contains(&"[+] NEWS".to_string()));
    assert!(lines.contains(&"[-] README".to_string()));
    assert!(lines.contains(&"[~] src/main.c".to_string()));
}

#[test]
fn body_diffs_each_changed_file_against_the_parent() {
    let fixture = repo_with_history();
    let repo = fixture.repo();
    let (rid, _) = fixture.commits[1].clone();
    let commit = load_commit(&repo, rid);
    let result = commit_diff(&repo, &commit, &DiffOpts::default()).unwrap();
    let lines = lines(&result);

    assert!(lines.contains(&"Index: src/main.c".to_string()));
    assert!(lines.contains(&"--- src/main.c".to_string()));
    assert!(lines.contains(&"+++ src/main.c".to_string()));
    assert!(lines.contains(&"-\treturn 0;".to_string()));
    assert!(lines.contains(&"+\treturn 1;".to_string()));
    // The removed README collapses to /dev/null on the plus side.
    assert!(lines.contains(&"+++ /dev/null".to_string()));
    // Added file content appears in verbose (default) mode.
    assert!(lines.contains(&"+1.0 released".to_string()));
}

#[test]
fn quiet_mode_skips_added_and_removed_bodies() {
    let fixture = repo_with_history();
    let repo = fixture.repo();
    let (rid, _) = fixture.commits[1].clone();
    let commit = load_commit(&repo, rid);
    let opts = DiffOpts {
        verbose: false,
        ..DiffOpts::default()
    };
    let result = commit_diff(&repo, &commit, &opts).unwrap();
    let lines = lines(&result);
    assert!(lines.contains(&"Index: NEWS".to_string()));
    assert!(!lines.contains(&"+1.0 released".to_string()));
    // Modified files still show their hunks.
    assert!(lines.contains(&"+\treturn 1;".to_string()));
}

#[test]
fn offset_index_matches_line_lengths() {
    let fixture = repo_with_history();
    let repo = fixture.repo();
    let (rid, _) = fixture.commits[1].clone();
    let commit = load_commit(&repo, rid);
    let result = commit_diff(&repo, &commit, &DiffOpts::default()).unwrap();

    let offsets = result.buffer.offsets();
    assert_eq!(offsets.len(), result.buffer.nlines() + 1);
    for i in 0..result.buffer.nlines() {
        let len = offsets[i + 1] - offsets[i];
        assert_eq!(len, result.buffer.line(i).unwrap().len() + 1);
    }
}

#[test]
fn widening_context_never_shrinks_the_diff() {
    let mut fixture = TestRepo::new();
    let body: String = (0..40).map(|i| format!("line {i}\n")).collect();
    fixture.commit("base", "dev", &[("big.txt", Some(body.as_str()))]);
    let changed = body.replace("line 20", "line twenty");
    fixture.commit("tweak", "dev", &[("big.txt", Some(changed.as_str()))]);

    let repo = fixture.repo();
    let (rid, _) = fixture.commits[1].clone();
    let commit = load_commit(&repo, rid);

    let narrow = commit_diff(
        &repo,
        &commit,
        &DiffOpts {
            context: 1,
            ..DiffOpts::default()
        },
    )
    .unwrap();
    let mut previous = narrow.buffer.nlines();
    for context in [2, 4, 6, 8, 10] {
        let wider = commit_diff(
            &repo,
            &commit,
            &DiffOpts {
                context,
                ..DiffOpts::default()
            },
        )
        .unwrap();
        assert!(wider.buffer.nlines() >= previous);
        previous = wider.buffer.nlines();
    }
}

#[test]
fn inverted_diffs_swap_sides() {
    let fixture = repo_with_history();
    let repo = fixture.repo();
    let (rid, _) = fixture.commits[1].clone();
    let commit = load_commit(&repo, rid);
    let result = commit_diff(
        &repo,
        &commit,
        &DiffOpts {
            invert: true,
            ..DiffOpts::default()
        },
    )
    .unwrap();
    let lines = lines(&result);
    assert!(lines.contains(&"+\treturn 0;".to_string()));
    assert!(lines.contains(&"-\treturn 1;".to_string()));
    // The file added by the commit reads as removed when inverted.
    assert!(lines.contains(&"-1.0 released".to_string()));
}

#[test]
fn two_commit_diff_walks_both_decks() {
    let fixture = repo_with_history();
    let repo = fixture.repo();
    let (old_rid, _) = fixture.commits[0].clone();
    let (new_rid, _) = fixture.commits[1].clone();
    let old = load_commit(&repo, old_rid);
    let new = load_commit(&repo, new_rid);
    let result = two_commit_diff(&repo, &old, &new, &DiffOpts::default()).unwrap();

    let kinds: Vec<(&str, ChangeKind)> = result
        .changeset
        .iter()
        .map(|c| (c.name.as_str(), c.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("NEWS", ChangeKind::Added),
            ("README", ChangeKind::Removed),
            ("src/main.c", ChangeKind::Modified),
        ]
    );
}

#[test]
fn wiki_artifacts_render_their_body() {
    let mut fixture = TestRepo::new();
    fixture.commit("seed", "dev", &[("a.txt", Some("x\n"))]);
    let (rid, _) = fixture.wiki("Home", "welcome to the project\n", "+Home", "carol");
    let repo = fixture.repo();
    let commit = load_commit(&repo, rid);
    let result = commit_diff(&repo, &commit, &DiffOpts::default()).unwrap();
    let lines = lines(&result);
    assert!(lines[0].starts_with("wiki "));
    assert!(lines.contains(&"+welcome to the project".to_string()));
}

#[test]
fn working_tree_diff_reconciles_disk_state() {
    let mut fixture = TestRepo::new();
    fixture.commit(
        "seed",
        "dev",
        &[("src/app.c", Some("alpha\nbeta\n")), ("doc.txt", Some("docs\n"))],
    );
    let checkout_dir = fixture.checkout();
    std::fs::write(checkout_dir.join("src/app.c"), "alpha\nGAMMA\n").unwrap();

    let repo = fossick::repo::FossilRepo::discover(&checkout_dir).unwrap();
    let checkout = repo.checkout().expect("checkout discovered").clone();
    let commit = Commit {
        rid: 0,
        hash: checkout.hash.clone(),
        parent_hash: None,
        user: String::new(),
        timestamp: String::new(),
        comment: "local changes".to_string(),
        branch: None,
        kind: fossick::ArtifactKind::Checkin,
    };
    let result = commit_diff(&repo, &commit, &DiffOpts::default()).unwrap();
    let lines = lines(&result);

    assert!(lines.contains(&"[~] src/app.c".to_string()));
    assert!(!lines.iter().any(|l| l.contains("[~] doc.txt")));
    assert!(lines.contains(&"-beta".to_string()));
    assert!(lines.contains(&"+GAMMA".to_string()));
    assert!(lines.contains(&"hash + (working copy)".to_string()));
}
