//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks for XML parsing:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Entities: reference decoding and output escaping with Cow (zero-copy when possible)
//! - Attributes: attribute records and value normalization
//! - Encoding: input encoding resolution and conversion to UTF-8
//! - DTD: DOCTYPE and entity declarations
//! - UnifiedScanner: ScanHandler-based scanner shared by the tree builder and SAX

pub mod attributes;
pub mod dtd;
pub mod encoding;
pub mod entities;
pub mod scanner;
pub mod unified_scanner;

pub use unified_scanner::{scan_bytes, ScanHandler, UnifiedScanner};
