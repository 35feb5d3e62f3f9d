// Selection grammar for numbered listings.
//
// Every listing shown to the user is numbered from 1. A reply is either the
// wildcard `*` (everything shown) or a single number. There is no list or
// range syntax.

use thiserror::Error;

/// The wildcard token meaning "every item currently listed".
pub const WILDCARD: &str = "*";

/// A parsed, in-range reply against a listing of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    /// 1-based position in the listing.
    One(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("\"{0}\" is not a number")]
    NotANumber(String),

    #[error("number {index} not found")]
    OutOfRange { index: i64, len: usize },
}

/// Parse a reply against a listing of `len` items.
pub fn parse_selection(input: &str, len: usize) -> Result<Selection, SelectionError> {
    let input = input.trim();
    if input == WILDCARD {
        return Ok(Selection::All);
    }

    let index: i64 = input
        .parse()
        .map_err(|_| SelectionError::NotANumber(input.to_string()))?;

    if index < 1 || index as u64 > len as u64 {
        return Err(SelectionError::OutOfRange { index, len });
    }
    Ok(Selection::One(index as usize))
}

impl Selection {
    /// Resolve the selection into the owned items it names, preserving
    /// listing order.
    pub fn resolve<T: Clone>(self, items: &[T]) -> Vec<T> {
        match self {
            Selection::All => items.to_vec(),
            Selection::One(k) => k
                .checked_sub(1)
                .and_then(|i| items.get(i))
                .cloned()
                .into_iter()
                .collect(),
        }
    }
}
