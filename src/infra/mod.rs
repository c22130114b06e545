//! Adapters around the domain: pricing service, catalog resolution, clipboard and run history.

pub mod clipboard;
pub mod history;
pub mod pricing;
pub mod resolver;
