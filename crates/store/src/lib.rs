//! # tarifsync-store
//!
//! Downstream adapter: one REST client implementing login, watermark, owner
//! directory and persistence sink ports.

pub mod auth;
pub mod client;
pub mod owner;
pub mod payload;
pub mod sink;
pub mod watermark;

pub use client::DownstreamApi;
