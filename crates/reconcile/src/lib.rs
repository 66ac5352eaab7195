//! Catch-up reconciliation of owner tariffs and national system tariffs.

pub mod merge;
pub mod normalize;
pub mod owner;
pub mod pass;
pub mod system;

pub use pass::{SyncPass, SyncPorts, SyncReport};
