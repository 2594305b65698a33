//! Keeper agent for on-chain prediction markets.
//!
//! Watches a factory for `MarketCreated`, waits for each market's deadline
//! in chain time, asks a language-model oracle for the outcome and sends
//! `resolve` + `distribute` to the market contract.

pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod feeds;
pub mod keeper;
pub mod state;
pub mod telemetry;
