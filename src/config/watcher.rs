// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Hot reload of the settings file.
//!
//! The parent directory is watched rather than the file itself so editors
//! that save by replacing the file are still noticed. Bursts of file events
//! are collapsed by a [`Debouncer`]; once quiet, the file is re-parsed and
//! either a reload or an error is announced. On error the previous settings
//! stay in effect.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::Settings;

/// Default quiet period before a change is acted on
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Poll period of the debounce thread
const POLL: Duration = Duration::from_millis(50);

/// Outcome of a settings file change
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// The file changed and parsed; the new settings
    Reloaded(Box<Settings>),
    /// The file changed but could not be loaded
    Error(String),
    /// The file is gone
    Removed(PathBuf),
}

/// Collapses a burst of change notifications into one action.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    quiet: Duration,
    last_change: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_change: None,
        }
    }

    /// Record a change at `now`, restarting the quiet period
    pub fn touch(&mut self, now: Instant) {
        self.last_change = Some(now);
    }

    /// Forget a pending change
    pub fn cancel(&mut self) {
        self.last_change = None;
    }

    pub fn is_pending(&self) -> bool {
        self.last_change.is_some()
    }

    /// True once per burst, when the quiet period has elapsed
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.last_change {
            Some(at) if now.saturating_duration_since(at) >= self.quiet => {
                self.last_change = None;
                true
            }
            _ => false,
        }
    }
}

/// Watches one settings file and reports reloads on a channel.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<ConfigEvent>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Watch the settings file at `path`. `debounce_ms` defaults to
    /// [`DEFAULT_DEBOUNCE`].
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let quiet = debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);

        let (raw_tx, raw_rx) = mpsc::channel::<Event>();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    let _ = raw_tx.send(event);
                }
                Err(e) => warn!(error = %e, "file watch error"),
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {:?}", directory))?;

        let (events_tx, events) = mpsc::channel();
        let target = path.clone();
        thread::spawn(move || watch_loop(target, Debouncer::new(quiet), raw_rx, events_tx));
        info!(path = ?path, "watching settings");

        Ok(Self {
            _watcher: watcher,
            events,
            path,
        })
    }

    /// Next pending event, if any
    pub fn try_recv(&self) -> Option<ConfigEvent> {
        self.events.try_recv().ok()
    }

    /// Every pending event
    pub fn recv_all(&self) -> Vec<ConfigEvent> {
        self.events.try_iter().collect()
    }

    pub fn watched_path(&self) -> &Path {
        &self.path
    }
}

/// Whether a watcher path names the settings file. Compares file names too,
/// since the watcher may report canonicalized paths.
fn same_file(reported: &Path, target: &Path) -> bool {
    reported == target || (reported.file_name().is_some() && reported.file_name() == target.file_name())
}

/// Load the settings file into the event to announce
fn reload(target: &Path) -> ConfigEvent {
    match Settings::load(target) {
        Ok(settings) => {
            debug!(path = ?target, "settings reloaded");
            ConfigEvent::Reloaded(Box::new(settings))
        }
        Err(e) => {
            warn!(path = ?target, error = %e, "settings reload failed");
            ConfigEvent::Error(format!("{:#}", e))
        }
    }
}

fn watch_loop(
    target: PathBuf,
    mut debouncer: Debouncer,
    raw: Receiver<Event>,
    events: Sender<ConfigEvent>,
) {
    loop {
        let outcome = match raw.recv_timeout(POLL) {
            Ok(event) if event.paths.iter().any(|p| same_file(p, &target)) => match event.kind {
                EventKind::Remove(_) if !target.exists() => {
                    debouncer.cancel();
                    Some(ConfigEvent::Removed(target.clone()))
                }
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                    debouncer.touch(Instant::now());
                    None
                }
                _ => None,
            },
            Ok(_) => None,
            Err(RecvTimeoutError::Timeout) => debouncer.fire(Instant::now()).then(|| reload(&target)),
            // The watcher was dropped
            Err(RecvTimeoutError::Disconnected) => return,
        };

        if let Some(event) = outcome {
            if events.send(event).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_debouncer_collapses_bursts() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        assert!(!debouncer.fire(t0));

        debouncer.touch(t0);
        debouncer.touch(t0 + Duration::from_millis(80));
        assert!(!debouncer.fire(t0 + Duration::from_millis(150)));
        assert!(debouncer.fire(t0 + Duration::from_millis(180)));
        // Fires once per burst
        assert!(!debouncer.fire(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_debouncer_cancel() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.touch(t0);
        assert!(debouncer.is_pending());
        debouncer.cancel();
        assert!(!debouncer.fire(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_same_file() {
        assert!(same_file(Path::new("/a/b.yaml"), Path::new("/a/b.yaml")));
        assert!(same_file(Path::new("/private/a/b.yaml"), Path::new("/a/b.yaml")));
        assert!(!same_file(Path::new("/a/c.yaml"), Path::new("/a/b.yaml")));
    }

    #[test]
    fn test_reload_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        fs::write(&path, "send_enabled: false\n").unwrap();
        match reload(&path) {
            ConfigEvent::Reloaded(settings) => assert!(!settings.send_enabled),
            other => panic!("unexpected {:?}", other),
        }

        fs::write(&path, "consoles: [[[\n").unwrap();
        assert!(matches!(reload(&path), ConfigEvent::Error(_)));
    }

    #[test]
    fn test_watcher_reports_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "send_enabled: true\n").unwrap();

        let watcher = ConfigWatcher::new(&path, Some(100)).unwrap();
        assert_eq!(watcher.watched_path(), path.as_path());
        thread::sleep(Duration::from_millis(50));

        fs::write(&path, "send_enabled: false\n").unwrap();
        thread::sleep(Duration::from_millis(400));

        // Sandboxes may not deliver file events; only check what arrived
        for event in watcher.recv_all() {
            if let ConfigEvent::Reloaded(settings) = event {
                assert!(!settings.send_enabled);
            }
        }
    }
}
