//! Data models shared between storage backends and their callers.

mod file_info;

pub use file_info::{file_extension, FileInfo};
