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

// View rendering tests on ratatui's TestBackend.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::TestRepo;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fossick::app::App;
use fossick::repo::{ScmRepo, SharedRepo, TimelineFilter};
use fossick::views::{DiffView, DrawCtx, NewView, TimelineView, TreeView, View};
use ratatui::{backend::TestBackend, Terminal};

const CTX: DrawCtx = DrawCtx {
    focused: true,
    shared: false,
};

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn buffer_lines(terminal: &Terminal<TestBackend>) -> Vec<String> {
    let buffer = terminal.backend().buffer().clone();
    let area = buffer.area;
    (0..area.height)
        .map(|y| {
            (0..area.width)
                .map(|x| buffer.get(x, y).symbol().to_string())
                .collect::<String>()
        })
        .collect()
}

fn contains(lines: &[String], needle: &str) -> bool {
    lines.iter().any(|l| l.contains(needle))
}

fn seeded_repo() -> (TestRepo, SharedRepo) {
    let mut fixture = TestRepo::new();
    fixture.commit("initial import", "alice", &[("src/a.c", Some("int a;\n"))]);
    fixture.commit("add b", "bob", &[("src/b.c", Some("int b;\n"))]);
    fixture.commit(
        "extend a",
        "alice",
        &[("src/a.c", Some("int a;\nint a2;\n"))],
    );
    let repo: SharedRepo = Arc::new(fixture.repo());
    (fixture, repo)
}

/// Draw and tick a view until its content settles on `pred`.
fn draw_until(
    terminal: &mut Terminal<TestBackend>,
    view: &mut dyn View,
    pred: impl Fn(&[String]) -> bool,
) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        view.tick().unwrap();
        terminal
            .draw(|frame| view.draw(frame, frame.area(), CTX))
            .unwrap();
        let lines = buffer_lines(terminal);
        if pred(&lines) {
            return lines;
        }
        assert!(Instant::now() < deadline, "view never settled:\n{lines:#?}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn timeline_renders_commit_rows() {
    let (_fixture, repo) = seeded_repo();
    let mut view = TimelineView::open(repo, TimelineFilter::default());
    let mut terminal = Terminal::new(TestBackend::new(80, 10)).unwrap();
    let lines = draw_until(&mut terminal, &mut view, |lines| {
        contains(lines, "initial import")
    });
    assert!(lines[0].starts_with("checkin "));
    assert!(contains(&lines, "[1/3]"));
    assert!(contains(&lines, "extend a"));
    assert!(contains(&lines, "add b"));
    assert!(contains(&lines, "alice"));
    // Newest first.
    let extend_row = lines.iter().position(|l| l.contains("extend a")).unwrap();
    let initial_row = lines.iter().position(|l| l.contains("initial import")).unwrap();
    assert!(extend_row < initial_row);
}

#[test]
fn timeline_selection_follows_navigation() {
    let (_fixture, repo) = seeded_repo();
    let mut view = TimelineView::open(repo, TimelineFilter::default());
    let mut terminal = Terminal::new(TestBackend::new(80, 10)).unwrap();
    draw_until(&mut terminal, &mut view, |lines| contains(lines, "add b"));
    view.handle_key(key(KeyCode::Down)).unwrap();
    let lines = draw_until(&mut terminal, &mut view, |lines| contains(lines, "[2/3]"));
    assert!(contains(&lines, "[2/3]"));
    assert_eq!(view.selected_commit().unwrap().comment, "add b");
    view.handle_key(key(KeyCode::Up)).unwrap();
    assert_eq!(view.selected_commit().unwrap().comment, "extend a");
}

#[test]
fn diff_view_renders_and_widens_context() {
    let (fixture, repo) = seeded_repo();
    let (rid, _) = fixture.commits[2].clone();
    let commit = Arc::new(repo.commit(rid).unwrap());
    let mut view = DiffView::open(repo, commit).unwrap();
    let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
    terminal
        .draw(|frame| view.draw(frame, frame.area(), CTX))
        .unwrap();
    let lines = buffer_lines(&terminal);
    assert!(contains(&lines, "checkin "));
    assert!(contains(&lines, "[~] src/a.c"));
    assert!(contains(&lines, "+int a2;"));

    let before = view.nlines();
    for _ in 0..5 {
        view.handle_key(key(KeyCode::Char('+'))).unwrap();
    }
    assert!(view.nlines() >= before);
    // Rebuilding scrolls back to the top.
    view.handle_key(key(KeyCode::End)).unwrap();
    view.handle_key(key(KeyCode::Char('-'))).unwrap();
    terminal
        .draw(|frame| view.draw(frame, frame.area(), CTX))
        .unwrap();
    let lines = buffer_lines(&terminal);
    assert!(lines[0].starts_with("checkin "));
}

#[test]
fn tree_view_navigates_directories_and_restores_selection() {
    let (_fixture, repo) = seeded_repo();
    let mut view = TreeView::open(repo, "tip").unwrap();
    let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
    terminal
        .draw(|frame| view.draw(frame, frame.area(), CTX))
        .unwrap();
    let lines = buffer_lines(&terminal);
    assert!(lines[0].starts_with("commit "));
    assert_eq!(lines[1].trim_end(), "/");
    assert!(contains(&lines, "src/"));

    // Enter src/: the child listing carries its own ".." row.
    view.handle_key(key(KeyCode::Enter)).unwrap();
    terminal
        .draw(|frame| view.draw(frame, frame.area(), CTX))
        .unwrap();
    let lines = buffer_lines(&terminal);
    assert_eq!(lines[1].trim_end(), "/src/");
    assert!(contains(&lines, ".."));
    assert!(contains(&lines, "a.c"));
    assert!(contains(&lines, "b.c"));

    // Back out: the parent frame restores the selection on src/.
    view.handle_key(key(KeyCode::Char('h'))).unwrap();
    terminal
        .draw(|frame| view.draw(frame, frame.area(), CTX))
        .unwrap();
    let lines = buffer_lines(&terminal);
    assert_eq!(lines[1].trim_end(), "/");
    assert!(contains(&lines, "src/"));
}

#[test]
fn tree_search_wraps_and_walk_to_descends() {
    let (_fixture, repo) = seeded_repo();
    let mut view = TreeView::open(repo, "tip").unwrap();
    view.walk_to("src").unwrap();
    let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
    terminal
        .draw(|frame| view.draw(frame, frame.area(), CTX))
        .unwrap();
    let lines = buffer_lines(&terminal);
    assert_eq!(lines[1].trim_end(), "/src/");

    view.search_start(regex::Regex::new("b\\.c").unwrap());
    terminal
        .draw(|frame| view.draw(frame, frame.area(), CTX))
        .unwrap();
    use fossick::search::SearchStatus;
    assert_eq!(view.search_state().status, SearchStatus::Continue);
}

#[test]
fn blame_view_shows_hash_prefixes_with_run_coalescing() {
    let mut fixture = TestRepo::new();
    fixture.commit("v1", "dev", &[("f.txt", Some("a\nb\n"))]);
    fixture.commit("v2", "dev", &[("f.txt", Some("a\nb\nc\n"))]);
    let repo: SharedRepo = Arc::new(fixture.repo());
    let v1_hash = fixture.commits[0].1.clone();
    let tip_hash = fixture.commits[1].1.clone();

    let mut view = fossick::views::BlameView::open(repo, "f.txt", &tip_hash).unwrap();
    let mut terminal = Terminal::new(TestBackend::new(80, 10)).unwrap();
    let lines = draw_until(&mut terminal, &mut view, |lines| {
        contains(lines, "blame of /f.txt")
    });
    assert!(lines[0].starts_with("checkin "));
    let prefix1: String = v1_hash.chars().take(10).collect();
    let prefix2: String = tip_hash.chars().take(10).collect();
    assert!(contains(&lines, &prefix1));
    assert!(contains(&lines, &prefix2));
    // Lines 1 and 2 share an introducing commit; the repeated prefix is
    // blanked.
    let line_b = lines.iter().find(|l| l.contains(" b")).unwrap();
    assert!(!line_b.contains(&prefix1));
}

#[test]
fn split_screen_appears_only_on_wide_terminals() {
    let (fixture, repo) = seeded_repo();
    let (rid, _) = fixture.commits[2].clone();
    let commit = Arc::new(repo.commit(rid).unwrap());

    let timeline = TimelineView::open(repo.clone(), TimelineFilter::default());
    let mut app = App::new(repo, Box::new(timeline));
    app.open(NewView::Diff { commit }).unwrap();

    // Wide: both views share the screen, diff on the right.
    let mut terminal = Terminal::new(TestBackend::new(140, 20)).unwrap();
    terminal.draw(|frame| app.render(frame)).unwrap();
    let lines = buffer_lines(&terminal);
    assert!(contains(&lines, "│"));
    assert!(contains(&lines, "[~] src/a.c"));

    // Narrow: the focused (child) view fills the screen.
    let mut narrow = Terminal::new(TestBackend::new(100, 20)).unwrap();
    narrow.draw(|frame| app.render(frame)).unwrap();
    let lines = buffer_lines(&narrow);
    assert!(!contains(&lines, "│"));
    assert!(contains(&lines, "[~] src/a.c"));

    // Tab swaps focus back to the timeline, which now fills the screen.
    app.handle_key(key(KeyCode::Tab)).unwrap();
    let lines = render_until_headline(&mut app, &mut narrow);
    assert!(lines[0].starts_with("checkin "));
    assert!(!contains(&lines, "[~] src/a.c"));

    // Widening the terminal again restores the split.
    terminal.draw(|frame| app.render(frame)).unwrap();
    let lines = buffer_lines(&terminal);
    assert!(contains(&lines, "│"));
}

#[test]
fn diff_jk_navigation_round_trips_the_parent_selection() {
    let (fixture, repo) = seeded_repo();
    let (rid, _) = fixture.commits[2].clone();
    let commit = Arc::new(repo.commit(rid).unwrap());

    let timeline = TimelineView::open(repo.clone(), TimelineFilter::default());
    let mut app = App::new(repo, Box::new(timeline));
    let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
    // Let the producer materialise rows before navigating.
    terminal.draw(|frame| app.render(frame)).unwrap();
    app.open(NewView::Diff { commit }).unwrap();

    // J moves the parent timeline down one commit and retargets the diff.
    app.handle_key(key(KeyCode::Char('J'))).unwrap();
    terminal.draw(|frame| app.render(frame)).unwrap();
    let lines = buffer_lines(&terminal);
    assert!(contains(&lines, "add b"));

    // K moves back; the original commit's diff is restored.
    app.handle_key(key(KeyCode::Char('K'))).unwrap();
    terminal.draw(|frame| app.render(frame)).unwrap();
    let lines = buffer_lines(&terminal);
    assert!(contains(&lines, "extend a"));
    assert!(contains(&lines, "[~] src/a.c"));
}

#[test]
fn closing_the_child_promotes_the_parent() {
    let (fixture, repo) = seeded_repo();
    let (rid, _) = fixture.commits[2].clone();
    let commit = Arc::new(repo.commit(rid).unwrap());

    let timeline = TimelineView::open(repo.clone(), TimelineFilter::default());
    let mut app = App::new(repo, Box::new(timeline));
    app.open(NewView::Diff { commit }).unwrap();

    let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
    app.handle_key(key(KeyCode::Char('q'))).unwrap();
    let lines = render_until_headline(&mut app, &mut terminal);
    assert!(lines[0].starts_with("checkin "));
    assert!(!contains(&lines, "[~] src/a.c"));
}

/// Redraw until the timeline producer has materialised enough rows for
/// the headline to carry an artifact type.
fn render_until_headline(app: &mut App, terminal: &mut Terminal<TestBackend>) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        terminal.draw(|frame| app.render(frame)).unwrap();
        let lines = buffer_lines(terminal);
        if lines[0].starts_with("checkin ") {
            return lines;
        }
        assert!(Instant::now() < deadline, "timeline never loaded:\n{lines:#?}");
        std::thread::sleep(Duration::from_millis(10));
    }
}
