//! Per-key trailing-edge debouncing.

mod debouncer;

pub use debouncer::Debouncer;
