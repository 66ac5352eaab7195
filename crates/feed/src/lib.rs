//! # tarifsync-feed
//!
//! Upstream adapter: the Energi Data Service price list behind
//! [`tarifsync_core::tariff::port::TariffSource`].

pub mod energidata;
pub mod query;
pub mod retry;
