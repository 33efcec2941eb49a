//! Manager configuration.

use std::path::PathBuf;

use crate::error::FileResult;
use crate::manager::FileManager;

/// Default name of the I/O worker thread.
pub const DEFAULT_THREAD_NAME: &str = "spindle-io";

/// Configuration for creating a [`FileManager`].
#[derive(Debug, Clone)]
pub struct FileManagerConfig {
    /// Directory relative paths are resolved against. `None` uses the process
    /// working directory at construction time.
    pub base_path: Option<PathBuf>,
    /// Name of the I/O worker thread.
    pub thread_name: String,
    /// Stack size for the worker thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
}

impl Default for FileManagerConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}

impl FileManagerConfig {
    /// Default configuration rooted at `base_path`.
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: Some(base_path.into()),
            ..Default::default()
        }
    }

    /// The base path to start with.
    pub(crate) fn resolved_base_path(&self) -> PathBuf {
        match &self.base_path {
            Some(path) => path.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Builder for a [`FileManager`] with custom configuration.
#[derive(Debug, Default)]
pub struct FileManagerBuilder {
    config: FileManagerConfig,
}

impl FileManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base path.
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_path = Some(path.into());
        self
    }

    /// Set the worker thread name.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Set the worker thread stack size.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Build the manager and start its worker.
    pub fn build(self) -> FileResult<FileManager> {
        FileManager::with_config(self.config)
    }
}
