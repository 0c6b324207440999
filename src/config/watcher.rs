// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Profile hot reload.
//!
//! Watches a profile file (or a directory of profiles) and emits a validated
//! [`SurfaceProfile`] after each burst of modifications settles, so bindings
//! can be swapped while the surface keeps sending.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use super::SurfaceProfile;

/// Events emitted by the profile watcher
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// Profile was modified and passed validation
    Reloaded(Box<SurfaceProfile>),
    /// Profile was modified but failed to load or validate
    Error(String),
    /// A new file was created in the watch directory
    FileCreated(PathBuf),
    /// A file was deleted from the watch directory
    FileDeleted(PathBuf),
}

fn is_profile(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml" | "toml")
    )
}

fn reload(path: &Path) -> ConfigEvent {
    match validate_config(path) {
        Ok(profile) => ConfigEvent::Reloaded(Box::new(profile)),
        Err(e) => ConfigEvent::Error(format!("Failed to load {:?}: {:#}", path, e)),
    }
}

/// Profile watcher with debouncing and validation
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<ConfigEvent>,
    watched_path: PathBuf,
}

impl ConfigWatcher {
    /// Watch `path` (file or directory).
    ///
    /// Modifications are collected until none arrive for `debounce_ms`
    /// (default 500) and then reloaded once per file.
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let debounce_duration = Duration::from_millis(debounce_ms.unwrap_or(500));

        let (event_tx, event_rx): (Sender<ConfigEvent>, Receiver<ConfigEvent>) = mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        let mode = if watched_path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&watched_path, mode)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", watched_path, e))?;

        let target = watched_path.clone();
        std::thread::spawn(move || {
            let mut last_event_time: Option<Instant> = None;
            let mut pending_paths: Vec<PathBuf> = Vec::new();

            loop {
                match notify_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(event) => match event.kind {
                        EventKind::Create(_) => {
                            for path in event.paths {
                                let _ = event_tx.send(ConfigEvent::FileCreated(path));
                            }
                        }
                        EventKind::Remove(_) => {
                            for path in event.paths {
                                let _ = event_tx.send(ConfigEvent::FileDeleted(path));
                            }
                        }
                        EventKind::Modify(_) => {
                            for path in event.paths {
                                if !pending_paths.contains(&path) {
                                    pending_paths.push(path);
                                }
                            }
                            last_event_time = Some(Instant::now());
                        }
                        _ => {}
                    },
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        let settled = last_event_time
                            .map(|t| t.elapsed() >= debounce_duration)
                            .unwrap_or(false);
                        if !settled {
                            continue;
                        }
                        for path in pending_paths.drain(..) {
                            if is_profile(&path) || path == target {
                                debug!("Reloading {:?}", path);
                                let _ = event_tx.send(reload(&path));
                            }
                        }
                        last_event_time = None;
                    }
                    // Watcher dropped
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Try to receive the next event (non-blocking)
    pub fn try_recv(&self) -> Option<ConfigEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending events
    pub fn recv_all(&self) -> Vec<ConfigEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Block until the next event is received
    pub fn recv(&self) -> Option<ConfigEvent> {
        self.event_receiver.recv().ok()
    }

    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

/// Load and validate a profile without binding anything
pub fn validate_config<P: AsRef<Path>>(path: P) -> Result<SurfaceProfile> {
    let profile = SurfaceProfile::load(path)?;
    profile.validate()?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    const PROFILE: &str = r#"
bindings:
  - name: fader1
    kind: continuous
    channel: 0
    number: 7
"#;

    #[test]
    fn test_validate_config() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("surface.yaml");
        fs::write(&file_path, PROFILE).unwrap();

        let profile = validate_config(&file_path).unwrap();
        assert_eq!(profile.bindings.len(), 1);
        assert_eq!(profile.bindings[0].name, "fader1");
    }

    #[test]
    fn test_validate_toml_config() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("surface.toml");
        fs::write(
            &file_path,
            "[[bindings]]\nname = \"mod\"\nkind = \"continuous\"\nnumber = 1\n",
        )
        .unwrap();

        let profile = validate_config(&file_path).unwrap();
        assert_eq!(profile.bindings[0].number, 1);
    }

    #[test]
    fn test_validate_invalid_config() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("invalid.yaml");
        fs::write(&file_path, "this is not valid yaml: [").unwrap();
        assert!(validate_config(&file_path).is_err());

        // Parses but fails validation
        fs::write(&file_path, "bindings: [{name: x, kind: hi_res, number: 33}]").unwrap();
        assert!(validate_config(&file_path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(validate_config(dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_profile_extensions() {
        assert!(is_profile(Path::new("a.yaml")));
        assert!(is_profile(Path::new("a.yml")));
        assert!(is_profile(Path::new("a.toml")));
        assert!(!is_profile(Path::new("a.txt")));
        assert!(!is_profile(Path::new("a")));
    }

    #[test]
    fn test_watcher_creation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("watch_test.yaml"), PROFILE).unwrap();

        let watcher = ConfigWatcher::new(dir.path(), Some(100));
        assert!(watcher.is_ok());

        let watcher = watcher.unwrap();
        assert_eq!(watcher.watched_path(), dir.path());
    }

    #[test]
    fn test_watcher_detects_changes() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("detect_test.yaml");
        fs::write(&file_path, PROFILE).unwrap();

        let watcher = ConfigWatcher::new(dir.path(), Some(100)).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&file_path)
            .unwrap();
        file.write_all(b"bindings:\n  - {name: pan, kind: relative, number: 10}\n")
            .unwrap();
        file.flush().unwrap();
        drop(file);

        // Wait for debounce + processing
        std::thread::sleep(Duration::from_millis(300));

        let events = watcher.recv_all();
        let reloaded = events.iter().rev().find(|e| matches!(e, ConfigEvent::Reloaded(_)));
        if let Some(ConfigEvent::Reloaded(profile)) = reloaded {
            assert_eq!(profile.bindings[0].name, "pan");
        }
        // Event delivery timing is not guaranteed in CI, so absence is not a failure
    }
}
