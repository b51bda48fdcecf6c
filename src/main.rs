// TUI application entry point

use std::io::stdout;
use std::path::Path;
use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use fossick::app::App;
use fossick::blame::BlameCfg;
use fossick::cli::{normalize_repo_path, BlameArgs, Cli, Command, DiffArgs, TreeArgs};
use fossick::diff::MAX_CONTEXT;
use fossick::repo::{FossilRepo, ScmRepo, SharedRepo};
use fossick::views::{BlameView, DiffView, TimelineView, TreeView, View};
use fossick::{ArtifactKind, Commit};

fn main() {
    let cli = Cli::parse();
    let _log_guard = configure_logging();
    if let Err(e) = run(cli) {
        eprintln!("fsk: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let repo = open_repo(cli.repo.as_deref())?;
    let view = build_initial_view(&repo, cli.command, cli.timeline)?;

    install_panic_hook();
    enable_raw_mode().context("entering raw mode")?;
    crossterm::execute!(stdout(), EnterAlternateScreen).context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend).context("initialising terminal")?;

    info!(target: "runtime", "startup");
    let result = App::new(repo, view).run(&mut terminal);
    restore_terminal();
    info!(target: "runtime", ok = result.is_ok(), "shutdown");
    result
}

fn open_repo(explicit: Option<&Path>) -> Result<SharedRepo> {
    let repo = match explicit {
        Some(db) => FossilRepo::open(db)
            .with_context(|| format!("opening repository {}", db.display()))?,
        None => {
            let cwd = std::env::current_dir().context("reading working directory")?;
            FossilRepo::discover(&cwd).context("discovering repository")?
        }
    };
    Ok(Arc::new(repo))
}

fn build_initial_view(
    repo: &SharedRepo,
    command: Option<Command>,
    bare_timeline: fossick::cli::TimelineArgs,
) -> Result<Box<dyn View>> {
    match command {
        None => timeline_view(repo, bare_timeline),
        Some(Command::Timeline(args)) => timeline_view(repo, args),
        Some(Command::Diff(args)) => diff_view(repo, args),
        Some(Command::Tree(args)) => tree_view(repo, args),
        Some(Command::Blame(args)) => blame_view(repo, args),
    }
}

fn timeline_view(repo: &SharedRepo, args: fossick::cli::TimelineArgs) -> Result<Box<dyn View>> {
    let filter = args.into_filter(repo.as_ref())?;
    Ok(Box::new(TimelineView::open(repo.clone(), filter)))
}

fn diff_view(repo: &SharedRepo, args: DiffArgs) -> Result<Box<dyn View>> {
    let mut view = match args.commits.len() {
        0 => DiffView::open(repo.clone(), Arc::new(working_tree_commit(repo)?))?,
        1 => {
            let commit = resolve_commit(repo, &args.commits[0])?;
            DiffView::open(repo.clone(), Arc::new(commit))?
        }
        _ => {
            let old = resolve_commit(repo, &args.commits[0])?;
            let new = resolve_commit(repo, &args.commits[1])?;
            DiffView::open_two(repo.clone(), Arc::new(old), Arc::new(new))?
        }
    };
    let mut opts = view.opts().clone();
    if let Some(context) = args.context {
        opts.context = context.min(MAX_CONTEXT);
    }
    opts.invert = args.invert;
    opts.verbose = !args.quiet;
    opts.ignore_ws = args.whitespace;
    view.set_opts(opts)?;
    view.set_colour(!args.no_colour);
    Ok(Box::new(view))
}

fn tree_view(repo: &SharedRepo, args: TreeArgs) -> Result<Box<dyn View>> {
    let symbol = args.commit.unwrap_or_else(|| default_symbol(repo));
    let mut view = TreeView::open(repo.clone(), &symbol)?;
    if let Some(path) = args.path {
        view.walk_to(&normalize_repo_path(path))?;
    }
    view.set_colour(!args.no_colour);
    Ok(Box::new(view))
}

fn blame_view(repo: &SharedRepo, args: BlameArgs) -> Result<Box<dyn View>> {
    let cfg = BlameCfg {
        path: normalize_repo_path(args.path),
        commit: args.commit.clone(),
        reverse: args.reverse,
        depth: args.limit,
    };
    cfg.validate()?;
    let symbol = args.commit.unwrap_or_else(|| default_symbol(repo));
    let origin = repo
        .resolve(&symbol)
        .with_context(|| format!("resolving '{symbol}'"))?;
    Ok(Box::new(BlameView::with_cfg(repo.clone(), cfg, origin)?))
}

/// Commit symbol used when none was given: the open checkout, else tip.
fn default_symbol(repo: &SharedRepo) -> String {
    if repo.checkout().is_some() {
        "current".to_string()
    } else {
        "tip".to_string()
    }
}

fn resolve_commit(repo: &SharedRepo, symbol: &str) -> Result<Commit> {
    let resolved = repo
        .resolve(symbol)
        .with_context(|| format!("resolving '{symbol}'"))?;
    repo.commit(resolved.rid)
        .with_context(|| format!("loading commit {}", resolved.hash))
}

/// The pseudo-commit standing in for uncommitted working-tree changes.
fn working_tree_commit(repo: &SharedRepo) -> Result<Commit> {
    let checkout = repo
        .checkout()
        .context("a working-tree diff requires an open checkout")?;
    Ok(Commit {
        rid: 0,
        hash: checkout.hash.clone(),
        parent_hash: None,
        user: String::new(),
        timestamp: String::new(),
        comment: "local changes".to_string(),
        branch: None,
        kind: ArtifactKind::Checkin,
    })
}

/// Tracing goes to the file named by FSK_LOG (filtered by RUST_LOG);
/// without it, logging stays off so the terminal is left alone.
fn configure_logging() -> Option<WorkerGuard> {
    let path = std::path::PathBuf::from(std::env::var_os("FSK_LOG")?);
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let file = path.file_name()?.to_os_string();
    let appender = tracing_appender::rolling::never(dir, file);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            default_panic(info);
        }));
    });
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = crossterm::execute!(stdout(), LeaveAlternateScreen);
}
