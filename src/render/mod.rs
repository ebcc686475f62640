//! Rendering module for writing parse results.

mod json;

pub use json::{export_json, to_json, JsonFormat};
