//! Range-substitution merge.
//!
//! Replaces a set of non-overlapping ranges of the source document with new
//! text in one left-to-right pass. Text outside every range is copied
//! verbatim, line breaks included.

use crate::error::{Error, Result};
use crate::theorem::{Position, Range, SourceDocument};

/// Merge `replacements` into `document`.
///
/// Pairs are applied in order of their start position. A range that starts
/// before the previous one ended is rejected.
pub fn splice(document: &SourceDocument, replacements: &[(Range, String)]) -> Result<String> {
    let mut ordered: Vec<&(Range, String)> = replacements.iter().collect();
    ordered.sort_by_key(|(range, _)| range.start);

    let mut out = String::new();
    let mut cursor = Position::origin();
    for (range, text) in ordered {
        if range.start < cursor {
            return Err(Error::OverlappingRanges {
                first: cursor,
                second: range.start,
            });
        }
        out.push_str(&document.slice(cursor, range.start));
        out.push_str(text);
        cursor = range.end.max(range.start);
    }
    out.push_str(&document.slice(cursor, document.end_position()));
    Ok(out)
}
