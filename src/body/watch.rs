//! Upload file growth observers.
//!
//! A body stream subscribes to its upload file once and keeps the returned
//! [`WatchGuard`] for as long as the file may still grow. Dropping the guard
//! stops the subscription. Observers only ever say "this file may have
//! grown"; the stream finds out how much by reading.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use notify::{Config, Event, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::body::stream::Turn;
use crate::config::{WatchConfig, WatchMode};

/// Wakes one body stream when its upload file may have grown.
#[derive(Debug, Clone)]
pub struct GrowthSignal {
    tx: mpsc::UnboundedSender<Turn>,
}

impl GrowthSignal {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Turn>) -> Self {
        Self { tx }
    }

    /// Returns `false` once the stream has been dropped.
    pub fn notify(&self) -> bool {
        self.tx.send(Turn::FileGrew).is_ok()
    }
}

/// Keeps a subscription alive. Dropping it unsubscribes.
pub struct WatchGuard {
    _inner: Box<dyn Send>,
}

impl WatchGuard {
    pub fn new<T: Send + 'static>(inner: T) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard").finish_non_exhaustive()
    }
}

/// Capability to watch an upload file for growth.
pub trait FileGrowthObserver: Send + Sync {
    fn subscribe(&self, path: &Path, signal: GrowthSignal) -> notify::Result<WatchGuard>;
}

/// Observer backed by the `notify` crate.
#[derive(Debug, Clone, Default)]
pub struct NotifyObserver {
    config: WatchConfig,
}

impl NotifyObserver {
    pub fn new(config: WatchConfig) -> Self {
        Self { config }
    }
}

impl FileGrowthObserver for NotifyObserver {
    fn subscribe(&self, path: &Path, signal: GrowthSignal) -> notify::Result<WatchGuard> {
        let watched = path.to_path_buf();
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_modify() || event.kind.is_create() {
                    signal.notify();
                }
            }
            Err(e) => tracing::error!(path = ?watched, error = %e, "Upload watch error"),
        };

        // poll scans compare mtimes at one second resolution, so appends
        // within the same second are only seen through a content hash
        let config = Config::default()
            .with_poll_interval(Duration::from_millis(self.config.poll_interval_ms))
            .with_compare_contents(self.config.mode == WatchMode::Poll);

        let guard = match self.config.mode {
            WatchMode::Native => {
                let mut watcher = RecommendedWatcher::new(handler, config)?;
                watcher.watch(path, RecursiveMode::NonRecursive)?;
                WatchGuard::new(watcher)
            }
            WatchMode::Poll => {
                let mut watcher = PollWatcher::new(handler, config)?;
                watcher.watch(path, RecursiveMode::NonRecursive)?;
                WatchGuard::new(watcher)
            }
        };

        tracing::trace!(path = ?path, mode = ?self.config.mode, "Upload watch started");
        Ok(guard)
    }
}

/// Observer driven by the caller.
///
/// For frontends that announce new upload data over their own channel
/// instead of relying on filesystem events.
#[derive(Debug, Clone, Default)]
pub struct ManualObserver {
    signals: Arc<DashMap<PathBuf, GrowthSignal>>,
    active: Arc<AtomicUsize>,
}

impl ManualObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce that `path` may have grown. Returns `false` if nobody is
    /// subscribed to it any more.
    pub fn notify(&self, path: &Path) -> bool {
        match self.signals.get(path) {
            Some(signal) => signal.notify(),
            None => false,
        }
    }

    /// Number of live subscriptions.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl FileGrowthObserver for ManualObserver {
    fn subscribe(&self, path: &Path, signal: GrowthSignal) -> notify::Result<WatchGuard> {
        self.signals.insert(path.to_path_buf(), signal);
        self.active.fetch_add(1, Ordering::SeqCst);

        Ok(WatchGuard::new(ManualSubscription {
            path: path.to_path_buf(),
            signals: Arc::clone(&self.signals),
            active: Arc::clone(&self.active),
        }))
    }
}

struct ManualSubscription {
    path: PathBuf,
    signals: Arc<DashMap<PathBuf, GrowthSignal>>,
    active: Arc<AtomicUsize>,
}

impl Drop for ManualSubscription {
    fn drop(&mut self) {
        self.signals.remove(&self.path);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
