//! Narrowing an extracted sequence to what the check targets.

use rand::Rng;
use std::fmt;

use crate::error::{CheckError, CheckErrorKind};

/// How many occurrences of the extracted value a check targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    /// The k-th occurrence, 0-based. `Nth(0)` is the first.
    Nth(usize),
    All,
    RandomOne,
    RandomN { n: usize, fail_if_fewer: bool },
    Count,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Nth(0) => f.write_str("find"),
            Cardinality::Nth(k) => write!(f, "find({})", k),
            Cardinality::All => f.write_str("findAll"),
            Cardinality::RandomOne => f.write_str("findRandom"),
            Cardinality::RandomN { n, fail_if_fewer } => {
                write!(f, "findRandom({}, {})", n, fail_if_fewer)
            }
            Cardinality::Count => f.write_str("count"),
        }
    }
}

pub fn first<X>(values: Vec<X>) -> Option<X> {
    values.into_iter().next()
}

pub fn nth<X>(values: Vec<X>, k: usize) -> Option<X> {
    values.into_iter().nth(k)
}

pub fn random_one<X>(mut values: Vec<X>) -> Option<X> {
    if values.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..values.len());
    Some(values.swap_remove(index))
}

/// Up to `n` elements sampled without replacement, in their original order.
///
/// With `fail_if_fewer`, a sequence shorter than `n` is a cardinality
/// failure instead of a short result.
pub fn random_n<X>(values: Vec<X>, n: usize, fail_if_fewer: bool) -> Result<Vec<X>, CheckError> {
    if values.len() <= n {
        if fail_if_fewer && values.len() < n {
            return Err(CheckError::new(
                CheckErrorKind::Cardinality,
                format!("failed to find {} matches, only found {}", n, values.len()),
            ));
        }
        return Ok(values);
    }

    let mut picked = rand::seq::index::sample(&mut rand::thread_rng(), values.len(), n).into_vec();
    picked.sort_unstable();
    let mut picked = picked.into_iter().peekable();
    Ok(values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| {
            if picked.peek() == Some(&i) {
                picked.next();
                Some(value)
            } else {
                None
            }
        })
        .collect())
}

/// The number of occurrences, saturating at `i32::MAX`.
pub fn count<X>(values: &[X]) -> i32 {
    i32::try_from(values.len()).unwrap_or(i32::MAX)
}
