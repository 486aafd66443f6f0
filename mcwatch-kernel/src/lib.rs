//! mcwatch kernel - watches one Minecraft server, announces status
//! transitions and answers on-demand `players` queries.
//!
//! Flow: `poller` ticks → `prober` → `detector` → `notify`.
//! The `players` command goes `http` → `query` → `prober` and never
//! touches the detector.

pub mod config;
pub mod detector;
pub mod discord;
pub mod error;
pub mod format;
pub mod health;
pub mod http;
pub mod keepalive;
pub mod models;
pub mod notify;
pub mod poller;
pub mod prober;
pub mod query;
pub mod slp;
