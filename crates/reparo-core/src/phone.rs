//! # Phone Address Normalization
//!
//! Turns whatever was typed into the customer's phone field into the
//! messaging network's addressable identifier.
//!
//! ## Algorithm
//! ```text
//! "0812-3456-7890"
//!      │  keep ASCII digits only
//!      ▼
//! "081234567890"
//!      │  starts with "62"?  keep
//!      │  starts with "0"?   replace that one "0" with "62"
//!      │  otherwise          prepend "62"
//!      ▼
//! "6281234567890"
//!      │  append network suffix
//!      ▼
//! "6281234567890@s.whatsapp.net"
//! ```
//!
//! Normalization never fails. Empty or garbage input still produces
//! `62@s.whatsapp.net`; callers that care must run [`validate_phone`] first.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Indonesian country calling code.
pub const COUNTRY_PREFIX: &str = "62";

/// Suffix identifying a personal chat on the messaging network.
pub const ADDRESS_SUFFIX: &str = "@s.whatsapp.net";

/// Shortest national number (after the country code) we accept as plausible.
const MIN_SUBSCRIBER_DIGITS: usize = 8;

/// E.164 caps a full number at 15 digits.
const MAX_TOTAL_DIGITS: usize = 15;

/// A normalized network address such as `6281234567890@s.whatsapp.net`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Returns the full address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the digit part, without the network suffix.
    pub fn digits(&self) -> &str {
        self.0.strip_suffix(ADDRESS_SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reduces a raw phone number to its canonical `62…` digit string.
pub fn normalize_digits(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.starts_with(COUNTRY_PREFIX) {
        digits
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("{}{}", COUNTRY_PREFIX, rest)
    } else {
        format!("{}{}", COUNTRY_PREFIX, digits)
    }
}

/// Converts a free-form phone number into a network [`Address`].
///
/// ## Example
/// ```rust
/// use reparo_core::phone::normalize;
///
/// assert_eq!(normalize("0812-3456-7890").as_str(), "6281234567890@s.whatsapp.net");
/// assert_eq!(normalize("+62 812 3456 7890").digits(), "6281234567890");
/// ```
pub fn normalize(raw: &str) -> Address {
    Address(format!("{}{}", normalize_digits(raw), ADDRESS_SUFFIX))
}

/// Checks that a raw phone number is plausible enough to message.
///
/// The rules look at the normalized digits: at least eight digits after the
/// country code and no more than fifteen in total.
pub fn validate_phone(raw: &str) -> Result<(), ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    if !raw.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "contains no digits".to_string(),
        });
    }

    let digits = normalize_digits(raw);
    let subscriber = digits.len() - COUNTRY_PREFIX.len();

    if subscriber < MIN_SUBSCRIBER_DIGITS {
        return Err(ValidationError::TooShort {
            field: "phone".to_string(),
            min: MIN_SUBSCRIBER_DIGITS,
        });
    }

    if digits.len() > MAX_TOTAL_DIGITS {
        return Err(ValidationError::TooLong {
            field: "phone".to_string(),
            max: MAX_TOTAL_DIGITS,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_local_format_with_dashes() {
        assert_eq!(
            normalize("0812-3456-7890").as_str(),
            "6281234567890@s.whatsapp.net"
        );
    }

    #[test]
    fn test_missing_trunk_prefix() {
        assert_eq!(
            normalize("81234567890").as_str(),
            "6281234567890@s.whatsapp.net"
        );
    }

    #[test]
    fn test_international_formats() {
        assert_eq!(normalize("+62 812-3456-7890").digits(), "6281234567890");
        assert_eq!(normalize("(62) 812 3456 7890").digits(), "6281234567890");
    }

    #[test]
    fn test_only_one_leading_zero_is_replaced() {
        assert_eq!(normalize_digits("00812"), "620812");
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert_eq!(normalize("").as_str(), "62@s.whatsapp.net");
        assert_eq!(normalize("n/a").as_str(), "62@s.whatsapp.net");
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("0812-3456-7890").is_ok());
        assert!(matches!(
            validate_phone("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_phone("call me"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            validate_phone("0812"),
            Err(ValidationError::TooShort { .. })
        ));
        assert!(matches!(
            validate_phone("0812345678901234567"),
            Err(ValidationError::TooLong { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_output_is_prefix_digits_and_suffix(raw in "\\PC*") {
            let address = normalize(&raw);
            prop_assert!(address.as_str().ends_with(ADDRESS_SUFFIX));

            let digits = address.digits();
            prop_assert!(digits.starts_with(COUNTRY_PREFIX));
            prop_assert!(digits.chars().all(|c| c.is_ascii_digit()));
        }

        #[test]
        fn prop_renormalizing_digits_is_a_no_op(raw in "[0-9 +()-]{0,20}") {
            let once = normalize(&raw);
            let twice = normalize(once.digits());
            prop_assert_eq!(once, twice);
        }
    }
}
