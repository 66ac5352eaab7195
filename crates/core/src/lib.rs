//! # tarifsync-core
//!
//! Domain entities, ports (traits) and error types shared by every crate in the
//! workspace. Contains no I/O: adapters live in `tarifsync-feed` (upstream) and
//! `tarifsync-store` (downstream), the catch-up logic in `tarifsync-reconcile`.

pub mod common;
pub mod config;

pub mod tariff {
    pub mod entity;
    pub mod error;
    pub mod port;
}

pub mod store {
    pub mod error;
    pub mod port;
}

pub mod sync {
    pub mod entity;
    pub mod error;
}

#[cfg(feature = "test-utils")]
pub mod test_utils;
