//! Horizon News - a three-column headline panel
//!
//! Fetches RSS/Atom feeds from the configured URLs, parses their entries and
//! lays a random selection of the headlines out across three columns.

pub mod config;
pub mod distributor;
pub mod fetcher;
pub mod headline;
pub mod label;
pub mod panel;
pub mod parser;
pub mod routes;
