//! Serve command - development server with rebuild on change

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::eyre::{Result, WrapErr};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind};
use quire_generator::{Site, scan::ExcludeSet};
use tokio::{net::TcpListener, sync::mpsc};

use super::{load_config, print_build_stats};
use crate::server::create_router;

/// Quiet period before a rebuild starts, so editor save bursts coalesce.
const DEBOUNCE: Duration = Duration::from_millis(150);

/// Decides which filesystem events trigger a rebuild.
#[derive(Debug)]
pub struct ChangeFilter {
    root: PathBuf,
    destination: PathBuf,
    excludes: ExcludeSet,
}

impl ChangeFilter {
    /// Create a filter for a source root.
    pub fn new(root: PathBuf, destination: PathBuf, excludes: ExcludeSet) -> Self {
        Self {
            root,
            destination,
            excludes,
        }
    }

    /// Whether `path` is a source change worth rebuilding for.
    #[must_use]
    pub fn is_relevant(&self, path: &Path) -> bool {
        if path.starts_with(&self.destination) {
            return false;
        }
        match path.strip_prefix(&self.root) {
            Ok(relative) => !self.excludes.is_excluded(relative),
            Err(_) => false,
        }
    }

    /// Whether an event touches any relevant path.
    #[must_use]
    pub fn accepts(&self, event: &Event) -> bool {
        let kind = matches!(
            event.kind,
            EventKind::Create(_)
                | EventKind::Remove(_)
                | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any)
        );
        kind && event.paths.iter().any(|path| self.is_relevant(path))
    }
}

/// Run the serve command.
///
/// Builds once, then watches the source tree and rebuilds on change while
/// serving the destination over HTTP.
pub async fn run(
    config_path: &Path,
    port: Option<u16>,
    open_browser: bool,
    drafts: bool,
) -> Result<()> {
    tracing::info!(?config_path, ?port, "Starting serve mode");

    let mut config = load_config(config_path)?;
    if drafts {
        config.build.include_drafts = true;
    }
    config.validate().wrap_err("Invalid configuration")?;
    let port = port.unwrap_or(config.serve.port);

    let root = std::path::absolute(config.source_dir()).wrap_err("Invalid source directory")?;
    let destination =
        std::path::absolute(config.destination_dir()).wrap_err("Invalid destination directory")?;
    let excludes = ExcludeSet::new(&config.serve.watch_excludes)
        .wrap_err("Invalid serve.watch_excludes pattern")?;
    let filter = ChangeFilter::new(root.clone(), destination.clone(), excludes);

    // Initial build
    tracing::info!("Running initial build...");
    let mut site = Site::new(config);
    let stats = site.build().wrap_err("Build failed")?;
    print_build_stats(&stats, &destination);

    // Setup file watcher; a full channel already means a rebuild is pending.
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) if filter.accepts(&event) => {
                tracing::debug!(paths = ?event.paths, "source changed");
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("watch error: {e}"),
        },
        notify::Config::default(),
    )
    .wrap_err("Failed to create file watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .wrap_err("Failed to watch source directory")?;
    tracing::debug!(root = %root.display(), "Watching source directory");

    // The rebuild task owns the site, so two rebuilds never overlap.
    tokio::task::spawn_blocking(move || {
        while rx.blocking_recv().is_some() {
            std::thread::sleep(DEBOUNCE);
            while rx.try_recv().is_ok() {}

            println!();
            println!("  File change detected, rebuilding...");
            match site.rebuild() {
                Ok(stats) => {
                    println!(
                        "  ✓ Rebuilt {} pages in {}ms",
                        stats.pages,
                        stats.duration.as_millis()
                    );
                }
                Err(e) => {
                    tracing::error!("Rebuild failed: {e}");
                    eprintln!("  ✗ Rebuild failed: {e}");
                }
            }
        }
    });

    // Start server
    let app = create_router(&destination);
    let addr = format!("127.0.0.1:{port}");

    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {addr}"))?;

    println!();
    println!("  Dev server running at http://{addr}");
    println!("  Press Ctrl+C to stop");
    println!();

    if open_browser {
        if let Err(e) = open::that(format!("http://{addr}")) {
            tracing::warn!("failed to open browser: {e}");
        }
    }

    // Keep watcher alive
    let _watcher = watcher;

    axum::serve(listener, app).await.wrap_err("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use notify::event::{AccessKind, CreateKind, DataChange};

    use super::*;

    fn filter() -> ChangeFilter {
        ChangeFilter::new(
            PathBuf::from("/site"),
            PathBuf::from("/site/_site"),
            ExcludeSet::new(&[".*", "**/.*", "target"]).expect("globs"),
        )
    }

    #[test]
    fn test_source_changes_are_relevant() {
        let filter = filter();
        assert!(filter.is_relevant(Path::new("/site/_posts/a.md")));
        assert!(filter.is_relevant(Path::new("/site/index.html")));
    }

    #[test]
    fn test_destination_and_excludes_are_ignored() {
        let filter = filter();
        assert!(!filter.is_relevant(Path::new("/site/_site/index.html")));
        assert!(!filter.is_relevant(Path::new("/site/.git")));
        assert!(!filter.is_relevant(Path::new("/site/_posts/.a.md.swp")));
        assert!(!filter.is_relevant(Path::new("/elsewhere/a.md")));
    }

    #[test]
    fn test_event_kinds() {
        let filter = filter();
        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/a.html"));
        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/site/a.html"));
        let access = Event::new(EventKind::Access(AccessKind::Read))
            .add_path(PathBuf::from("/site/a.html"));
        let output = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/_site/a.html"));

        assert!(filter.accepts(&create));
        assert!(filter.accepts(&modify));
        assert!(!filter.accepts(&access));
        assert!(!filter.accepts(&output));
    }
}
