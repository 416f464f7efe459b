use std::env;

use log::warn;

use crate::constants::{
    DEFAULT_BULK_BUFFER_LEN, DEFAULT_THREAD_NAME, DEFAULT_WORKER_THREADS, THREADPOOL_SIZE_VAR,
};

/// Settings for a [`Store`](crate::Store)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of worker threads running engine calls
    pub worker_threads: usize,
    /// Capacity of the receive buffer allocated for bulk retrieval
    pub bulk_buffer_len: usize,
    /// Worker thread name
    pub thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            bulk_buffer_len: DEFAULT_BULK_BUFFER_LEN,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the pool size taken from `KVBRIDGE_THREADPOOL_SIZE` when
    /// it holds a positive integer
    pub fn from_env() -> Self {
        let config = Self::default();
        match env::var(THREADPOOL_SIZE_VAR) {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.with_worker_threads(n),
                _ => {
                    warn!("ignoring {}={:?}: not a positive integer", THREADPOOL_SIZE_VAR, raw);
                    config
                }
            },
            Err(_) => config,
        }
    }

    /// Set the number of worker threads. Zero is raised to one.
    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n.max(1);
        self
    }

    pub fn with_bulk_buffer_len(mut self, len: usize) -> Self {
        self.bulk_buffer_len = len;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}
