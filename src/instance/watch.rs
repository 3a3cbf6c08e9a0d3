use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver};

use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind,
};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::resources::normalize_path;

/// Something that can report changes to individual files.
pub trait WatchBackend {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError>;

    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Paths that changed since the last poll. May contain duplicates.
    fn poll(&mut self) -> Vec<PathBuf>;
}

/// Watches files through the OS notification API.
///
/// Events arrive on notify's thread and are only queued there; `poll` drains them.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
    events_rx: Receiver<Event>,
    watched: FxHashSet<PathBuf>,
}

impl NotifyBackend {
    pub fn new() -> Result<Self, WatchError> {
        let (events_tx, events_rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(e) = events_tx.send(event) {
                    log::error!("File watcher disconnected, discarding event: {e}");
                }
            }
            Err(e) => log::error!("File watcher failure: {e}"),
        })?;
        Ok(Self {
            watcher,
            events_rx,
            watched: FxHashSet::default(),
        })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        self.watched.insert(normalize_path(path));
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.watched.remove(&normalize_path(path));
        self.watcher.unwatch(path)?;
        Ok(())
    }

    fn poll(&mut self) -> Vec<PathBuf> {
        let (changed, replaced) = sort_events(self.events_rx.try_iter());

        // A file saved by renaming over it is a new inode; the old watch is gone with it.
        for path in replaced.iter().filter(|p| self.watched.contains(*p)) {
            if let Err(e) = self.watcher.unwatch(path) {
                log::debug!("Couldn't drop stale watch on {}: {e}", path.display());
            }
            if let Err(e) = self.watcher.watch(path, RecursiveMode::NonRecursive) {
                log::error!("Couldn't watch {} again: {e}", path.display());
            }
        }
        changed
    }
}

/// Normalized paths of the events that may have changed file contents, and the subset
/// whose file was created or renamed into place.
fn sort_events(events: impl IntoIterator<Item = Event>) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut changed = Vec::new();
    let mut replaced = Vec::new();
    for event in events {
        let is_replaced = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
        );
        if !is_replaced && !matches!(event.kind, EventKind::Modify(_) | EventKind::Any) {
            continue;
        }
        for path in event.paths {
            let path = normalize_path(&path);
            if is_replaced {
                replaced.push(path.clone());
            }
            changed.push(path);
        }
    }
    (changed, replaced)
}

#[derive(Default)]
struct ManualState {
    watched: FxHashSet<PathBuf>,
    pending: Vec<PathBuf>,
}

/// A backend driven by hand. Clones share their state, so a test can keep one
/// clone and report changes through it.
#[derive(Clone, Default)]
pub struct ManualWatcher {
    state: Rc<RefCell<ManualState>>,
}

impl ManualWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a change to `path`. Ignored unless the path is watched.
    pub fn touch(&self, path: &Path) {
        let path = normalize_path(path);
        let mut state = self.state.borrow_mut();
        if state.watched.contains(&path) {
            state.pending.push(path);
        }
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.state.borrow().watched.contains(&normalize_path(path))
    }

    pub fn watch_count(&self) -> usize {
        self.state.borrow().watched.len()
    }
}

impl WatchBackend for ManualWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.state.borrow_mut().watched.insert(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.state.borrow_mut().watched.remove(path);
        Ok(())
    }

    fn poll(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.state.borrow_mut().pending)
    }
}

/// Reference-counted file watches; one backend watch per path however many instances use it.
pub struct WatchRegistry {
    backend: Box<dyn WatchBackend>,
    counts: FxHashMap<PathBuf, usize>,
}

impl WatchRegistry {
    pub fn new(backend: Box<dyn WatchBackend>) -> Self {
        Self {
            backend,
            counts: FxHashMap::default(),
        }
    }

    /// Add a reference to the watch on `path`, installing it if this is the first.
    ///
    /// The reference is counted even when the backend fails, so each acquire pairs with one
    /// release.
    pub fn acquire(&mut self, path: &Path) -> Result<(), WatchError> {
        let path = normalize_path(path);
        let count = self.counts.entry(path.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            log::debug!("watching {}", path.display());
            self.backend.watch(&path)?;
        }
        Ok(())
    }

    /// Drop a reference, closing the watch once nobody uses it.
    pub fn release(&mut self, path: &Path) {
        let path = normalize_path(path);
        let Some(count) = self.counts.get_mut(&path) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&path);
            log::debug!("closing watch on {}", path.display());
            if let Err(e) = self.backend.unwatch(&path) {
                log::debug!("Couldn't close watch on {}: {e}", path.display());
            }
        }
    }

    /// Normalized watched paths that changed since the last call.
    pub fn drain_changes(&mut self) -> FxHashSet<PathBuf> {
        self.backend
            .poll()
            .into_iter()
            .map(|p| normalize_path(&p))
            .filter(|p| self.counts.contains_key(p))
            .collect()
    }

    pub fn ref_count(&self, path: &Path) -> usize {
        self.counts
            .get(&normalize_path(path))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.ref_count(path) > 0
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Couldn't watch file: {0}")]
    Notify(#[from] notify::Error),
}
