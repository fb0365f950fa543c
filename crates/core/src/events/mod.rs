//! Change events module.
//!
//! Provides the typed change events applied to window caches, the named
//! channel categories the backend publishes on, the wire envelope those
//! categories share, and the broadcast bus that fans envelopes out to every
//! window.

mod bus;
mod category;
mod change_event;

pub use bus::*;
pub use category::*;
pub use change_event::*;
