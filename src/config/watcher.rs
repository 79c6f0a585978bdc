//! Routes file watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::routing::importer::load_json_file;
use crate::routing::RouteTable;

/// A watcher that rebuilds the route table when the routes file changes.
pub struct RoutesWatcher {
    path: PathBuf,
    ignore_trailing_slash: bool,
    update_tx: mpsc::UnboundedSender<RouteTable>,
}

impl RoutesWatcher {
    /// Create a new RoutesWatcher.
    ///
    /// Returns the watcher and a receiver for rebuilt route tables.
    pub fn new(path: &Path, ignore_trailing_slash: bool) -> (Self, mpsc::UnboundedReceiver<RouteTable>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                ignore_trailing_slash,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// Watching stops when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let ignore_trailing_slash = self.ignore_trailing_slash;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = %path.display(), "Routes file change detected, reloading");
                        match reload(&path, ignore_trailing_slash) {
                            Ok(table) => {
                                let _ = tx.send(table);
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to reload routes, keeping current table");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Routes watcher started");
        Ok(watcher)
    }
}

/// Build a fresh route table from the routes file.
pub fn reload(
    path: &Path,
    ignore_trailing_slash: bool,
) -> Result<RouteTable, crate::routing::importer::ImportError> {
    let mut table = RouteTable::new().with_ignore_trailing_slash(ignore_trailing_slash);
    load_json_file(&mut table, path)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_builds_table() {
        let path = std::env::temp_dir().join(format!("viewproxy-routes-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{ "url": "/about", "root": { "path": "/about" } }]"#,
        )
        .unwrap();

        let table = reload(&path, true).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.ignores_trailing_slash());
        assert!(table.match_path("/about/").is_some());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_reload_missing_file() {
        assert!(reload(Path::new("/definitely/not/here.json"), false).is_err());
    }
}
