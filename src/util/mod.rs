//! Utility functions for common operations.
//!
//! This module provides reusable text helpers used while normalizing upstream
//! entries and preparing them for the published document:
//!
//! - **Entity decoding**: so CDATA blocks never carry double-escaped text
//! - **Markup stripping**: HTML fragment to plain, whitespace-collapsed text
//! - **Truncation**: character-based cut with an ellipsis
//!
//! # Examples
//!
//! ```
//! use newswire::util::{decode_entities, strip_markup, truncate_chars};
//!
//! let title = decode_entities("Q&amp;A with the team");
//! let plain = strip_markup("<p>Breaking <em>news</em></p>");
//! let short = truncate_chars(&plain, 8);
//! ```

mod text;

pub use text::{decode_entities, strip_markup, strip_xml_invalid_chars, truncate_chars};
