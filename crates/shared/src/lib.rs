//! Shared wire types for the presence realtime channel.

pub mod error;
pub mod protocol;

pub use error::*;
pub use protocol::*;
