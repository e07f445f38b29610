pub mod api_detector;
pub mod api_replay;
pub mod browser;
pub mod catalog;
pub mod config;
pub mod dom_scrape;
mod error;
pub mod http;
pub mod image_resolver;
pub mod listing;
pub mod paths;
pub mod snapshot;
pub mod thumbnails;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{EngineError, Result};
