//! Process-wide tunables.
//!
//! The original library exposed a single knob, `big_file_set_buffer_size`,
//! backed by a bare `static size_t`. `Config` generalizes that to a small
//! struct behind a `OnceLock<Mutex<_>>` so it stays `Sync` without `unsafe`,
//! while keeping the same "set once, read everywhere" shape callers expect.

use std::sync::{Mutex, OnceLock};

/// Default chunk size used by [`crate::block::Block::read`] and
/// [`crate::block::Block::write`]'s streaming loop.
pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024 * 1024;

/// Item-count threshold above which a collective write should collapse
/// many small per-rank writes into one aggregated I/O (see
/// `crate::collective`). Zero disables aggregation.
pub const DEFAULT_AGGREGATED_THRESHOLD: usize = 0;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub chunk_bytes: usize,
    pub aggregated_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            aggregated_threshold: DEFAULT_AGGREGATED_THRESHOLD,
        }
    }
}

fn global() -> &'static Mutex<Config> {
    static CONFIG: OnceLock<Mutex<Config>> = OnceLock::new();
    CONFIG.get_or_init(|| Mutex::new(Config::default()))
}

/// Read the current process-wide configuration.
pub fn current() -> Config {
    *global().lock().unwrap()
}

/// Equivalent of `big_file_set_buffer_size`.
pub fn set_chunk_bytes(bytes: usize) {
    global().lock().unwrap().chunk_bytes = bytes;
}

pub fn set_aggregated_threshold(items: usize) {
    global().lock().unwrap().aggregated_threshold = items;
}
