/*
 * SPDX-License-Identifier: Apache-2.0
 */

//! An embeddable StatsD aggregation engine.
//!
//! The engine listens for statsd datagrams over UDP and TCP, accumulates
//! gauges, counters and timers keyed by (name, tag set), and periodically
//! renders the aggregate state into graphite plaintext lines. The host
//! framework drains those lines on its own schedule through
//! [`EngineHandle::harvest`], which always reports success.

pub mod collect;
pub mod config;
pub mod import;

mod export;
mod types;

pub use collect::EngineHandle;
pub use config::StatsdConfig;
