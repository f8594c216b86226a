//! Watches a single web page and reports textual changes to a Discord webhook.

pub mod config;
pub mod diff;
pub mod fetch;
pub mod monitor;
pub mod snapshot;
pub mod webhook;

#[cfg(test)]
mod stub_server;
