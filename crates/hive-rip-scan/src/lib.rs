//! Field extraction for hive-dump text reports.
//!
//! Hive-dump tools print human-readable reports where a value is introduced
//! by its field name followed by some separator: `ProductName: Windows 7`,
//! `CSDVersion -> Service Pack 1`, `ProcessorArchitecture=AMD64`. This crate
//! mines those reports line by line with a tolerant pattern and returns the
//! remainder of every matching line.
//!
//! Matching is lossy on purpose. Only the separator set in
//! [`SEPARATOR_CLASS`] is recognised; a line that introduces a value any
//! other way yields nothing.

mod pattern;
mod scanner;

pub use pattern::{FieldPattern, SEPARATOR_CLASS};
pub use scanner::{scan_file, scan_fields, scan_reader, ScanError};
