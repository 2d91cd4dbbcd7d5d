//! Invoice tracker: a terminal UI over a Postgres invoice table, an HTTP
//! proxy that extracts invoice fields from scanned documents through an LLM
//! gateway, spreadsheet/PDF exports and one-shot maintenance commands.

pub mod config;
pub mod db;
pub mod export;
pub mod filter;
pub mod migrate;
pub mod models;
pub mod scan;
pub mod ui;
