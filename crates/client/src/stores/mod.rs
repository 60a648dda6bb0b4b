//! Client-side state stores.

pub mod presence;

pub use presence::{PresenceRegistry, PresenceSet};
