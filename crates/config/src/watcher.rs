//! Model file watcher for recompiling on change

use crate::error::{ConfigError, Result};
use crate::model::Model;
use crate::source::{Source, SourceLoader};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Watches the directory of a model file and reports events touching it
pub struct ModelWatcher {
    model_path: PathBuf,
    _watcher: RecommendedWatcher,
    rx: Receiver<std::result::Result<Event, notify::Error>>,
}

impl ModelWatcher {
    pub fn new<P: AsRef<Path>>(model_path: P) -> std::result::Result<Self, notify::Error> {
        let model_path = model_path.as_ref().to_path_buf();
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // Editors often replace the file, so watch the parent directory.
        let watch_path = model_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(watch_path, RecursiveMode::NonRecursive)?;

        info!(path = ?model_path, "Model watcher started");

        Ok(Self {
            model_path,
            _watcher: watcher,
            rx,
        })
    }

    /// Drain pending events, returning whether any touched the model file
    pub fn poll(&self) -> bool {
        let mut changed = false;

        while let Ok(result) = self.rx.try_recv() {
            match result {
                Ok(event) if self.is_relevant_event(&event) => {
                    debug!(event = ?event, "Model file event");
                    changed = true;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "File watcher error"),
            }
        }

        changed
    }

    fn is_relevant_event(&self, event: &Event) -> bool {
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) => event
                .paths
                .iter()
                .any(|p| p == &self.model_path || p.file_name() == self.model_path.file_name()),
            _ => false,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

/// Reloads the model whenever its file changes
pub struct ReloadManager {
    watcher: ModelWatcher,
    source: Source,
    loader: Arc<dyn SourceLoader>,
}

impl ReloadManager {
    pub fn new(source: Source, loader: Arc<dyn SourceLoader>) -> Result<Self> {
        let path = source.path().map(Path::to_path_buf).ok_or_else(|| {
            ConfigError::InvalidSource(format!("{} cannot be watched, only files can", source))
        })?;
        let watcher = ModelWatcher::new(path)?;
        Ok(Self {
            watcher,
            source,
            loader,
        })
    }

    /// Start the reload loop in a background task.
    ///
    /// The callback receives every reload attempt, successful or not.
    /// Events arriving within one poll interval are coalesced into a single
    /// reload.
    pub fn start<F>(self, callback: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(Result<Model>) + Send + 'static,
    {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;

                if !self.watcher.poll() {
                    continue;
                }

                info!(path = ?self.watcher.model_path(), "Model change detected, reloading");
                let result = self.loader.load(&self.source).await;
                callback(result);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DefaultLoader;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let model_path = temp_dir.path().join("olaf.yaml");
        fs::write(&model_path, "services: []").unwrap();

        assert!(ModelWatcher::new(&model_path).is_ok());
    }

    #[test]
    fn test_is_relevant_event() {
        let temp_dir = TempDir::new().unwrap();
        let model_path = temp_dir.path().join("olaf.yaml");
        fs::write(&model_path, "services: []").unwrap();

        let watcher = ModelWatcher::new(&model_path).unwrap();

        let event = Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Any,
            )),
            paths: vec![model_path.clone()],
            attrs: Default::default(),
        };
        assert!(watcher.is_relevant_event(&event));

        let other_event = Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Any,
            )),
            paths: vec![temp_dir.path().join("other.yaml")],
            attrs: Default::default(),
        };
        assert!(!watcher.is_relevant_event(&other_event));

        let access_event = Event {
            kind: EventKind::Access(notify::event::AccessKind::Any),
            paths: vec![model_path],
            attrs: Default::default(),
        };
        assert!(!watcher.is_relevant_event(&access_event));
    }

    #[test]
    fn test_reload_manager_requires_file_source() {
        let loader: Arc<dyn SourceLoader> = Arc::new(DefaultLoader::new());
        let http = Source::Http {
            url: "http://localhost/olaf".to_string(),
            timeout: None,
        };
        assert!(matches!(
            ReloadManager::new(http, loader.clone()),
            Err(ConfigError::InvalidSource(_))
        ));

        let temp_dir = TempDir::new().unwrap();
        let model_path = temp_dir.path().join("olaf.yaml");
        fs::write(&model_path, "services: []").unwrap();
        assert!(ReloadManager::new(Source::File(model_path), loader).is_ok());
    }

    #[tokio::test]
    async fn test_reload_callback_may_be_send_only() {
        let temp_dir = TempDir::new().unwrap();
        let model_path = temp_dir.path().join("olaf.yaml");
        fs::write(&model_path, "services: []").unwrap();

        let manager =
            ReloadManager::new(Source::File(model_path), Arc::new(DefaultLoader::new())).unwrap();

        // Cell is Send but not Sync
        let reloads = std::cell::Cell::new(0u32);
        let handle = manager.start(move |_| reloads.set(reloads.get() + 1));
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
