use super::{ConfigError, ConfigStore};
use async_channel::Receiver;
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

// Secret and configmap volumes swap files by remove + recreate, so the new
// file may show up a little after the remove event.
const REARM_ATTEMPTS: usize = 50;
const REARM_DELAY: Duration = Duration::from_millis(100);

/// Keeps the background reload task alive. Dropping it stops watching.
#[derive(Debug)]
pub struct WatchHandle {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Trigger {
    Reload,
    Rearm,
    Ignore,
}

// inotify reports when a writer closes the file, so in-place writes are
// picked up once complete rather than on every partial write.
const CLOSE_WRITE_EVENTS: bool = cfg!(target_os = "linux");

fn classify(kind: &EventKind) -> Trigger {
    match kind {
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => Trigger::Rearm,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Trigger::Reload,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) if CLOSE_WRITE_EVENTS => {
            Trigger::Ignore
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Trigger::Ignore,
        EventKind::Create(_) | EventKind::Modify(_) => Trigger::Reload,
        _ => Trigger::Ignore,
    }
}

impl ConfigStore {
    /// Load `path` once, then keep reloading it whenever it is written or
    /// replaced.
    ///
    /// The initial load must succeed. Later reload failures are logged and
    /// leave the last good configuration in place.
    pub async fn watch(
        self: &Arc<Self>,
        path: impl Into<PathBuf>,
    ) -> Result<WatchHandle, ConfigError> {
        let path = path.into();
        self.load_file(&path).await?;

        let (tx, rx) = async_channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Only fails once the watch task is gone.
            let _ = tx.send_blocking(res);
        })
        .map_err(|source| ConfigError::Watch {
            path: path.clone(),
            source,
        })?;
        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|source| ConfigError::Watch {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), "Watching distribution configuration");

        let task = tokio::spawn(watch_loop(self.clone(), watcher, path.clone(), rx));
        Ok(WatchHandle { path, task })
    }
}

async fn watch_loop(
    store: Arc<ConfigStore>,
    mut watcher: RecommendedWatcher,
    path: PathBuf,
    rx: Receiver<notify::Result<Event>>,
) {
    while let Ok(res) = rx.recv().await {
        let event = match res {
            Ok(event) => event,
            Err(error) => {
                error!(%error, path = %path.display(), "Configuration watch error");
                continue;
            }
        };
        debug!(kind = ?event.kind, "Configuration file event");

        match classify(&event.kind) {
            Trigger::Ignore => continue,
            Trigger::Reload => {}
            Trigger::Rearm => {
                let _ = watcher.unwatch(&path);
                if let Err(error) = rearm(&mut watcher, &path).await {
                    error!(%error, path = %path.display(), "Failed to re-arm configuration watch");
                    continue;
                }
                debug!(path = %path.display(), "Configuration watch re-armed");
            }
        }

        match store.load_file(&path).await {
            Ok(()) => info!(path = %path.display(), "Configuration reloaded"),
            Err(error) => warn!(
                %error,
                path = %path.display(),
                "Configuration reload rejected, keeping previous configuration"
            ),
        }
    }

    debug!(path = %path.display(), "Configuration watch finished");
}

async fn rearm(watcher: &mut RecommendedWatcher, path: &Path) -> notify::Result<()> {
    let mut last_error = None;
    for _ in 0..REARM_ATTEMPTS {
        match watcher.watch(path, RecursiveMode::NonRecursive) {
            Ok(()) => return Ok(()),
            Err(error) => last_error = Some(error),
        }
        sleep(REARM_DELAY).await;
    }

    Err(last_error.unwrap_or_else(|| notify::Error::generic("watch re-arm failed")))
}
