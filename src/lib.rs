//! Loot parsing, price resolution and run profit tracking for Abyssal Deadspace runs.
//!
//! The pipeline is [`domain::parse`] → [`infra::resolver::CatalogResolver`] →
//! [`domain::summarize`], driven per capture by [`tracker::RunAggregator`].

pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod tracker;
pub mod util;
