//! Per-run occurrence counter that hands out filename suffixes.
//!
//! The n-th photo of a catalog number within one run gets the n-th lowercase
//! letter. Past `z` the ledger either keeps counting in bijective base-26
//! (`aa`, `ab`, ...) or refuses, depending on [`SuffixOverflow`].

use std::collections::HashMap;
use thiserror::Error;

use crate::config::SuffixOverflow;

/// Highest occurrence count that fits in a single letter.
pub const SINGLE_LETTER_LIMIT: u32 = 26;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("catalog number {catalog_number} seen more than 26 times in this run")]
    SuffixExhausted { catalog_number: String },
}

#[derive(Debug, Default)]
pub struct NamingLedger {
    counts: HashMap<String, u32>,
    overflow: SuffixOverflow,
}

impl NamingLedger {
    pub fn new(overflow: SuffixOverflow) -> Self {
        Self {
            counts: HashMap::new(),
            overflow,
        }
    }

    /// Record one more occurrence of `catalog_number` and return its suffix.
    ///
    /// An exhausted key is not counted, so it keeps failing on later calls.
    pub fn next_suffix(&mut self, catalog_number: &str) -> Result<String, LedgerError> {
        let seen = self.occurrences(catalog_number);
        let next = seen + 1;

        if next > SINGLE_LETTER_LIMIT && self.overflow == SuffixOverflow::Error {
            return Err(LedgerError::SuffixExhausted {
                catalog_number: catalog_number.to_string(),
            });
        }

        self.counts.insert(catalog_number.to_string(), next);
        Ok(suffix_for(next))
    }

    pub fn occurrences(&self, catalog_number: &str) -> u32 {
        self.counts.get(catalog_number).copied().unwrap_or(0)
    }
}

/// Bijective base-26 letters: 1 -> `a`, 26 -> `z`, 27 -> `aa`, 28 -> `ab`.
pub fn suffix_for(mut count: u32) -> String {
    let mut letters = Vec::new();
    while count > 0 {
        count -= 1;
        letters.push(b'a' + (count % 26) as u8);
        count /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_for() {
        assert_eq!(suffix_for(1), "a");
        assert_eq!(suffix_for(2), "b");
        assert_eq!(suffix_for(26), "z");
        assert_eq!(suffix_for(27), "aa");
        assert_eq!(suffix_for(52), "az");
        assert_eq!(suffix_for(53), "ba");
        assert_eq!(suffix_for(702), "zz");
        assert_eq!(suffix_for(703), "aaa");
    }

    #[test]
    fn test_suffixes_follow_call_order_per_key() {
        let mut ledger = NamingLedger::default();
        assert_eq!(ledger.next_suffix("12345").unwrap(), "a");
        assert_eq!(ledger.next_suffix("999").unwrap(), "a");
        assert_eq!(ledger.next_suffix("12345").unwrap(), "b");
        assert_eq!(ledger.next_suffix("12345").unwrap(), "c");
        assert_eq!(ledger.occurrences("12345"), 3);
        assert_eq!(ledger.occurrences("unseen"), 0);
    }

    #[test]
    fn test_twenty_six_distinct_letters() {
        let mut ledger = NamingLedger::new(SuffixOverflow::Error);
        let suffixes: Vec<String> = (0..26).map(|_| ledger.next_suffix("k").unwrap()).collect();
        let expected: Vec<String> = ('a'..='z').map(|c| c.to_string()).collect();
        assert_eq!(suffixes, expected);
    }

    #[test]
    fn test_overflow_error_policy() {
        let mut ledger = NamingLedger::new(SuffixOverflow::Error);
        for _ in 0..26 {
            ledger.next_suffix("k").unwrap();
        }
        let err = ledger.next_suffix("k").unwrap_err();
        assert_eq!(
            err,
            LedgerError::SuffixExhausted {
                catalog_number: "k".to_string()
            }
        );
        assert_eq!(ledger.occurrences("k"), 26);
        assert!(ledger.next_suffix("other").is_ok());
    }

    #[test]
    fn test_overflow_extend_policy() {
        let mut ledger = NamingLedger::new(SuffixOverflow::Extend);
        for _ in 0..26 {
            ledger.next_suffix("k").unwrap();
        }
        assert_eq!(ledger.next_suffix("k").unwrap(), "aa");
        assert_eq!(ledger.next_suffix("k").unwrap(), "ab");
    }
}
