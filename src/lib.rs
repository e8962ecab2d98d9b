//! Keeps each alarm channel's winning time and per-option vote counts in sync
//! with its voters' choices, and copies that state into every subscriber's
//! cached view of the channel.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod fanout;
pub mod startup;
pub mod tally;
pub mod triggers;
