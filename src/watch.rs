//! File Watching
//!
//! One `notify` watcher per `WatchSet` feeding a debounce thread. Files are
//! watched through their parent directory; events are coalesced per path
//! (later event wins) and handed to a `ChangeHandler` held weakly, so
//! dropping the handler stops the worker.

use crate::error::WatchError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const MAX_BATCH_SIZE: usize = 256;
const TICK: Duration = Duration::from_millis(50);

/// Receives debounced change notifications.
pub trait ChangeHandler: Send + Sync {
    fn handle_change(&self, path: &Path);
}

/// Something to watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchTarget {
    File(PathBuf),
    Dir { path: PathBuf, recursive: bool },
}

impl WatchTarget {
    /// Directory handed to the OS watcher and its mode.
    fn watch_root(&self) -> Option<(PathBuf, RecursiveMode)> {
        match self {
            WatchTarget::File(path) => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| (p.to_path_buf(), RecursiveMode::NonRecursive)),
            WatchTarget::Dir { path, recursive } => Some((
                path.clone(),
                if *recursive {
                    RecursiveMode::Recursive
                } else {
                    RecursiveMode::NonRecursive
                },
            )),
        }
    }
}

/// Per-path debouncing.
pub(crate) struct EventBatcher {
    debounce: Duration,
    max_batch_size: usize,
    pending: HashMap<PathBuf, Instant>,
}

impl EventBatcher {
    pub fn new(debounce: Duration, max_batch_size: usize) -> Self {
        Self {
            debounce,
            max_batch_size,
            pending: HashMap::new(),
        }
    }

    /// Record an event for `path`. Returns true once the batch is full.
    pub fn add(&mut self, path: PathBuf, now: Instant) -> bool {
        self.pending.insert(path, now);
        self.pending.len() >= self.max_batch_size
    }

    /// Paths quiet for the debounce window, or everything when the batch
    /// is full. Sorted.
    pub fn take_ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let flush_all = self.pending.len() >= self.max_batch_size;
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, seen)| flush_all || now.duration_since(**seen) >= self.debounce)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

fn changed_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event.paths,
        _ => Vec::new(),
    }
}

/// Active watches plus their debounce worker.
pub struct WatchSet {
    watcher: RecommendedWatcher,
    watched: HashMap<PathBuf, RecursiveMode>,
    running: Arc<RwLock<bool>>,
}

impl WatchSet {
    /// Create the watcher and spawn the worker that forwards debounced
    /// paths to `handler`.
    pub fn start<H>(handler: Weak<H>, debounce: Duration) -> Result<Self, WatchError>
    where
        H: ChangeHandler + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(move |res| {
            if let Err(e) = tx.send(res) {
                debug!("Watch channel closed: {}", e);
            }
        })
        .map_err(|e| WatchError::Create(e.to_string()))?;

        let running = Arc::new(RwLock::new(true));
        let worker_running = Arc::clone(&running);
        thread::Builder::new()
            .name("toolpanel-watch".to_string())
            .spawn(move || run_worker(rx, handler, debounce, worker_running))
            .map_err(|e| WatchError::Create(e.to_string()))?;

        Ok(Self {
            watcher,
            watched: HashMap::new(),
            running,
        })
    }

    /// Watch exactly `targets`: new roots are added, roots no longer
    /// needed are dropped. Failures are collected, the rest still apply.
    pub fn sync(&mut self, targets: &[WatchTarget]) -> Result<(), Vec<WatchError>> {
        let mut wanted: HashMap<PathBuf, RecursiveMode> = HashMap::new();
        for target in targets {
            if let Some((root, mode)) = target.watch_root() {
                let entry = wanted.entry(root).or_insert(mode);
                if mode == RecursiveMode::Recursive {
                    *entry = RecursiveMode::Recursive;
                }
            }
        }

        let mut errors = Vec::new();
        let stale: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|(path, mode)| wanted.get(*path) != Some(*mode))
            .map(|(path, _)| path.clone())
            .collect();
        for path in stale {
            if let Err(e) = self.watcher.unwatch(&path) {
                debug!(path = %path.display(), error = %e, "Unwatch failed");
            }
            self.watched.remove(&path);
        }

        for (path, mode) in wanted {
            if self.watched.contains_key(&path) {
                continue;
            }
            match self.watcher.watch(&path, mode) {
                Ok(()) => {
                    debug!(path = %path.display(), "Watching");
                    self.watched.insert(path, mode);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to watch");
                    errors.push(WatchError::Watch {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Directories currently handed to the OS watcher.
    pub fn watched_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.watched.keys().cloned().collect();
        roots.sort();
        roots
    }

    pub fn stop(&self) {
        *self.running.write() = false;
    }
}

impl Drop for WatchSet {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker<H: ChangeHandler>(
    rx: mpsc::Receiver<notify::Result<Event>>,
    handler: Weak<H>,
    debounce: Duration,
    running: Arc<RwLock<bool>>,
) {
    let mut batcher = EventBatcher::new(debounce, MAX_BATCH_SIZE);
    loop {
        if !*running.read() {
            break;
        }
        match rx.recv_timeout(TICK) {
            Ok(Ok(event)) => {
                let now = Instant::now();
                for path in changed_paths(event) {
                    batcher.add(path, now);
                }
            }
            Ok(Err(e)) => warn!("Watch error: {}", e),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                debug!("Watcher channel disconnected");
                break;
            }
        }

        let ready = batcher.take_ready(Instant::now());
        if ready.is_empty() {
            continue;
        }
        let Some(handler) = handler.upgrade() else {
            info!("Watch handler dropped, stopping");
            break;
        };
        info!(paths = ready.len(), "Processing file changes");
        for path in ready {
            handler.handle_change(&path);
        }
    }
    if batcher.len() > 0 {
        error!(pending = batcher.len(), "Watcher stopped with unprocessed changes");
    }
}
