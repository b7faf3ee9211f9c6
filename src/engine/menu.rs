//! Menu option parsing and the e-mail validity check.

use std::sync::LazyLock;

use regex::Regex;

use crate::content::NUMBER_WORDS;

/// Parse a menu choice out of free text.
///
/// Accepts digit strings `"1".."n"` and the Portuguese spelled-out numbers
/// truncated to the option count. Returns the 1-based option number.
pub fn parse_option(input: &str, option_count: usize) -> Option<usize> {
    let normalized = input.trim().to_lowercase();

    if normalized.chars().all(|c| c.is_ascii_digit()) && !normalized.is_empty() {
        if let Ok(n) = normalized.parse::<usize>() {
            if (1..=option_count).contains(&n) {
                return Some(n);
            }
        }
        return None;
    }

    NUMBER_WORDS[..option_count.min(NUMBER_WORDS.len())]
        .iter()
        .position(|w| *w == normalized)
        .map(|i| i + 1)
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Check `local@domain.tld` shape: ASCII local part, domain, TLD of at least
/// two letters. A format check only, not deliverability.
pub fn is_valid_email(input: &str) -> bool {
    EMAIL_RE.is_match(input.trim())
}
