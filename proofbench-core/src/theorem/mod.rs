//! Theorems, source positions and the original source document.
//!
//! ## Components
//!
//! - **types**: positions, ranges, theorem and proof records
//! - **dialect**: proof-language markers and comment syntax
//! - **source**: the original file as lines, with UTF-16 column slicing

pub mod dialect;
pub mod source;
pub mod types;

pub use dialect::ProofDialect;
pub use source::{utf16_len, utf16_to_byte, SourceDocument};
pub use types::{Position, ProofBody, ProofStep, Range, Theorem};

use std::collections::HashMap;

/// Statement text → source range of every evaluation theorem.
pub type StatementRanges = HashMap<String, Range>;
