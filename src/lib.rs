//! Newswire: a category-driven RSS aggregator that rewrites upstream stories
//! through a text-generation service and republishes them as RSS 2.0.

pub mod assemble;
pub mod client;
pub mod config;
pub mod content;
pub mod feed;
pub mod refresh;
pub mod registry;
pub mod render;
pub mod server;
pub mod util;
