// Licensed under the Apache-2.0 license

//! Numeric parsing of macro values.
//!
//! Header values are C integer literals: `0x`-prefixed hex or decimal, with
//! an optional `u`/`l` suffix.

/// Parses a C integer literal.
///
/// # Examples
/// ```
/// use sapphire_dt_header::value::parse_int;
/// assert_eq!(parse_int("0x1000"), Some(0x1000));
/// assert_eq!(parse_int("4096"), Some(4096));
/// assert_eq!(parse_int("0xF8000000UL"), Some(0xf800_0000));
/// assert_eq!(parse_int("SYSTEM_PLIC_IRQ"), None);
/// ```
pub fn parse_int(value: &str) -> Option<u64> {
    let value = value
        .trim()
        .trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

/// True when `value` is a plain decimal literal, i.e. not a symbol that has
/// to be dereferenced first.
pub fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Formats a value as a `0x`-prefixed lowercase hex string.
pub fn hex(value: u64) -> String {
    format!("{value:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("0x0"), Some(0));
        assert_eq!(parse_int("0X1F"), Some(0x1f));
        assert_eq!(parse_int("50000000"), Some(50_000_000));
        assert_eq!(parse_int("16u"), Some(16));
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("0xZZ"), None);
    }

    #[test]
    fn test_is_digits() {
        assert!(is_digits("12"));
        assert!(!is_digits(""));
        assert!(!is_digits("0x1"));
        assert!(!is_digits("SYSTEM_PLIC_USER_INTERRUPT_A"));
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(0), "0x0");
        assert_eq!(hex(0x1000), "0x1000");
    }
}
