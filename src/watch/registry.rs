//! Directories and file names of interest.

use arc_swap::ArcSwap;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::watch::WatchError;

type Entries = HashMap<PathBuf, HashSet<OsString>>;

/// Subscribes directories with the OS file-event subsystem.
pub trait DirectorySubscriber: Send {
    fn subscribe(&mut self, dir: &Path) -> Result<(), WatchError>;
}

impl DirectorySubscriber for RecommendedWatcher {
    fn subscribe(&mut self, dir: &Path) -> Result<(), WatchError> {
        self.watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Subscribe {
                path: dir.to_path_buf(),
                source: e,
            })
    }
}

#[derive(Default)]
struct RegistryState {
    entries: Entries,
    subscriber: Option<Box<dyn DirectorySubscriber>>,
}

/// Directory → file names of interest.
///
/// Registration is serialized so each directory is subscribed once. Readers
/// see an immutable snapshot and never wait on a registration.
pub struct WatchRegistry {
    snapshot: ArcSwap<Entries>,
    state: Mutex<RegistryState>,
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Entries::new()),
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Register a file's directory and name.
    ///
    /// Returns `true` when the directory was seen for the first time.
    /// Registering the same file again is a no-op.
    pub fn register(&self, file: &Path) -> Result<bool, WatchError> {
        let name = file
            .file_name()
            .ok_or_else(|| WatchError::NotAFile(file.to_path_buf()))?
            .to_os_string();
        let parent = match file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let dir = parent.canonicalize().map_err(|e| WatchError::Directory {
            path: parent.to_path_buf(),
            source: e,
        })?;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let first = !state.entries.contains_key(&dir);
        if first {
            if let Some(subscriber) = state.subscriber.as_mut() {
                subscriber.subscribe(&dir)?;
            }
            tracing::debug!(dir = ?dir, "Registered watch directory");
        }
        let names = state.entries.entry(dir).or_default();
        if names.insert(name) {
            self.snapshot.store(Arc::new(state.entries.clone()));
        }
        Ok(first)
    }

    /// Install the subscriber and subscribe every directory registered so far.
    pub fn attach(&self, mut subscriber: Box<dyn DirectorySubscriber>) -> Result<(), WatchError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for dir in state.entries.keys() {
            subscriber.subscribe(dir)?;
        }
        state.subscriber = Some(subscriber);
        Ok(())
    }

    /// Drop the subscriber, releasing its OS resources.
    pub fn detach(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.subscriber = None;
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    pub fn directories(&self) -> Vec<PathBuf> {
        self.snapshot.load().keys().cloned().collect()
    }

    /// True when `path` names a registered file in a registered directory.
    pub fn matches(&self, path: &Path) -> bool {
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            return false;
        };
        self.snapshot
            .load()
            .get(dir)
            .is_some_and(|names| names.contains(name))
    }

    /// Forget every registration and release the subscriber.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.clear();
        state.subscriber = None;
        self.snapshot.store(Arc::new(Entries::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<PathBuf>>>);

    impl DirectorySubscriber for Recorder {
        fn subscribe(&mut self, dir: &Path) -> Result<(), WatchError> {
            self.0.lock().unwrap().push(dir.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = WatchRegistry::new();
        let recorder = Recorder::default();
        registry.attach(Box::new(recorder.clone())).unwrap();

        let file = tmp.path().join("a.properties");
        assert!(registry.register(&file).unwrap());
        assert!(!registry.register(&file).unwrap());
        assert!(!registry.register(&tmp.path().join("b.properties")).unwrap());

        assert_eq!(recorder.0.lock().unwrap().len(), 1);
        assert_eq!(registry.directories().len(), 1);
    }

    #[test]
    fn test_attach_subscribes_existing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = WatchRegistry::new();
        registry.register(&tmp.path().join("a.properties")).unwrap();

        let recorder = Recorder::default();
        registry.attach(Box::new(recorder.clone())).unwrap();
        assert_eq!(
            recorder.0.lock().unwrap().as_slice(),
            &[tmp.path().canonicalize().unwrap()]
        );
    }

    #[test]
    fn test_matches_registered_names_only() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = WatchRegistry::new();
        registry.register(&tmp.path().join("a.properties")).unwrap();

        let dir = tmp.path().canonicalize().unwrap();
        assert!(registry.matches(&dir.join("a.properties")));
        assert!(!registry.matches(&dir.join("a.properties.swp")));
        assert!(!registry.matches(Path::new("/nowhere/a.properties")));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let registry = WatchRegistry::new();
        let err = registry
            .register(Path::new("/definitely/not/here/a.properties"))
            .unwrap_err();
        assert!(matches!(err, WatchError::Directory { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = WatchRegistry::new();
        registry.register(&tmp.path().join("a.properties")).unwrap();
        assert!(!registry.is_empty());
        registry.clear();
        assert!(registry.is_empty());
    }
}
