//! File-system watch scopes backed by `notify`.

use std::path::{Path, PathBuf};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::EngineError;

/// Which directory an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The producer's output tree (`json/`).
    Outer,
    /// The dump directory (`json/all/`).
    Inner,
}

/// A change notification tagged with the arming generation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeEvent {
    pub scope: Scope,
    pub generation: u64,
}

/// One armed directory watch. Dropping it stops notifications.
pub struct ScopeWatcher {
    scope: Scope,
    dir: PathBuf,
    generation: u64,
    _watcher: RecommendedWatcher,
}

impl ScopeWatcher {
    /// Watch `dir` (non-recursively) and forward relevant changes to `tx`.
    pub fn arm(
        scope: Scope,
        dir: &Path,
        generation: u64,
        tx: UnboundedSender<ScopeEvent>,
    ) -> Result<Self, EngineError> {
        let dir_display = dir.display().to_string();
        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_change(&event.kind) => {
                // Receiver gone means the supervisor stopped.
                let _ = tx.send(ScopeEvent { scope, generation });
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(dir = %dir_display, error = %err, "Watcher error");
            }
        })
        .map_err(|e| EngineError::Watch(e.to_string()))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| EngineError::Watch(format!("{}: {e}", dir.display())))?;

        tracing::debug!(?scope, dir = %dir.display(), generation, "Watcher armed");

        Ok(Self {
            scope,
            dir: dir.to_path_buf(),
            generation,
            _watcher: watcher,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for ScopeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeWatcher")
            .field("scope", &self.scope)
            .field("dir", &self.dir)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Reads and opens don't count as changes.
fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn access_events_are_ignored() {
        assert!(is_change(&EventKind::Create(CreateKind::File)));
        assert!(is_change(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_change(&EventKind::Access(AccessKind::Any)));
    }

    #[test]
    fn arming_missing_dir_fails() {
        let (tx, _rx) = unbounded_channel();
        let err = ScopeWatcher::arm(Scope::Inner, Path::new("/nonexistent/json/all"), 1, tx).unwrap_err();
        assert!(err.is_watch());
    }

    #[tokio::test]
    async fn file_write_is_reported_with_generation() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = unbounded_channel();
        let watcher = ScopeWatcher::arm(Scope::Inner, dir.path(), 7, tx).unwrap();
        assert_eq!(watcher.generation(), 7);

        std::fs::write(dir.path().join("blocks.json"), "{}").unwrap();

        let ev = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no event within timeout")
            .unwrap();
        assert_eq!(ev, ScopeEvent { scope: Scope::Inner, generation: 7 });
    }
}
