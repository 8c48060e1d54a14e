//! ISBN checksum validation.
//!
//! Works on the cleaned form of a candidate identifier: every character
//! except ASCII digits and the check letter `X` is stripped, so scraped
//! strings like "ISBN978-4-00-310101-8" validate as-is.

use thiserror::Error;
use tracing::debug;

/// Why a candidate identifier failed validation. The distinction matters
/// downstream: digit-count and checksum violations quarantine under
/// different reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IsbnFault {
    #[error("cleaned length {length} is neither 10 nor 13")]
    DigitCount { length: usize },

    #[error("checksum mismatch")]
    Checksum,
}

/// Strip everything but digits and the check letter, uppercasing `x`.
pub fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Validate a candidate identifier, returning its cleaned canonical form.
pub fn validate(raw: &str) -> Result<String, IsbnFault> {
    let cleaned = clean(raw);
    match cleaned.len() {
        10 => validate_isbn10(&cleaned).map(|_| cleaned),
        13 => validate_isbn13(&cleaned).map(|_| cleaned),
        length => Err(IsbnFault::DigitCount { length }),
    }
}

pub fn is_valid(raw: &str) -> bool {
    validate(raw).is_ok()
}

fn validate_isbn10(cleaned: &str) -> Result<(), IsbnFault> {
    let chars: Vec<char> = cleaned.chars().collect();
    let mut sum = 0u32;
    for (i, c) in chars[..9].iter().enumerate() {
        let digit = c.to_digit(10).ok_or(IsbnFault::Checksum)?;
        sum += digit * (10 - i as u32);
    }
    let checksum = (11 - sum % 11) % 11;
    let expected = if checksum == 10 {
        'X'
    } else {
        char::from_digit(checksum, 10).unwrap()
    };

    if chars[9] == expected {
        Ok(())
    } else {
        debug!(
            isbn = cleaned,
            expected = %expected,
            actual = %chars[9],
            "ISBN-10 check character mismatch"
        );
        Err(IsbnFault::Checksum)
    }
}

fn validate_isbn13(cleaned: &str) -> Result<(), IsbnFault> {
    let chars: Vec<char> = cleaned.chars().collect();
    let mut sum = 0u32;
    for (i, c) in chars[..12].iter().enumerate() {
        let digit = c.to_digit(10).ok_or(IsbnFault::Checksum)?;
        let weight = if i % 2 == 0 { 1 } else { 3 };
        sum += digit * weight;
    }
    let checksum = (10 - sum % 10) % 10;
    let expected = char::from_digit(checksum, 10).unwrap();

    if chars[12] == expected {
        Ok(())
    } else {
        debug!(
            isbn = cleaned,
            expected = %expected,
            actual = %chars[12],
            "ISBN-13 check digit mismatch"
        );
        Err(IsbnFault::Checksum)
    }
}
