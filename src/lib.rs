pub mod app;
pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
mod jsonl;
pub mod ledger;
pub mod market_data;
pub mod models;
pub mod portfolio;
pub mod settings;
