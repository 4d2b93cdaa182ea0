//! Input sanitization and field-format validation.
//!
//! All free-text input goes through [`sanitize_text`] before storage so no
//! markup survives into HTML-rendering consumers. This is a content-safety
//! transform, applied uniformly; SQL safety comes from parameter binding,
//! never from escaping.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Trim, strip markup, then HTML-escape (quotes included).
pub fn sanitize_text(input: &str) -> String {
    html_escape(&strip_tags(input.trim()))
}

/// Remove `<...>` spans. Unterminated tags are dropped to end of input.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
            .expect("email regex")
    })
}

pub fn is_valid_email(input: &str) -> bool {
    email_regex().is_match(input)
}

/// Exact `YYYY-MM-DD` calendar date: parse then format must round-trip, so
/// non-padded input and impossible dates (2023-02-30) both fail.
pub fn is_valid_date(input: &str) -> bool {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string() == input)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_strips_and_escapes() {
        assert_eq!(sanitize_text("  plain  "), "plain");
        assert_eq!(sanitize_text("<b>bold</b>"), "bold");
        assert_eq!(sanitize_text("<script>alert(1)</script>hi"), "alert(1)hi");
        assert_eq!(sanitize_text("a & b"), "a &amp; b");
        assert_eq!(sanitize_text("O'Brien"), "O&#039;Brien");
        assert_eq!(sanitize_text(r#"say "hi""#), "say &quot;hi&quot;");
    }

    #[test]
    fn sanitize_drops_unterminated_tag() {
        assert_eq!(sanitize_text("before<img src="), "before");
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ann@x.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("bad"));
        assert!(!is_valid_email("no@tld"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn date_validation_round_trips() {
        assert!(is_valid_date("2024-02-29"));
        assert!(is_valid_date("2023-12-01"));
        assert!(!is_valid_date("2023-02-30"));
        assert!(!is_valid_date("2023-2-3"));
        assert!(!is_valid_date("2023/02/03"));
        assert!(!is_valid_date("not-a-date"));
        assert!(!is_valid_date("2023-13-01"));
    }
}
