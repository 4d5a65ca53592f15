/// Text processing utilities
pub mod text {
    /// Collapse every run of whitespace into a single space and trim the ends.
    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Lower-case and whitespace-collapse, the form used for fingerprints and
    /// similarity checks.
    pub fn normalize(text: &str) -> String {
        collapse_whitespace(&text.to_lowercase())
    }

    /// Take at most `max_chars` characters without splitting a code point.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => text[..idx].to_string(),
            None => text.to_string(),
        }
    }

    /// Shorten text for log lines.
    pub fn preview(text: &str, max_chars: usize) -> String {
        let short = truncate_chars(text, max_chars);
        if short.len() < text.len() {
            format!("{}...", short)
        } else {
            short
        }
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// A fetchable http(s) URL with a host.
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
            Err(_) => false,
        }
    }

    /// Canonical form of an article link: trimmed, lower-cased, fragment and
    /// trailing slash removed.
    pub fn canonical_link(link: &str) -> String {
        let trimmed = link.trim();
        let without_fragment = match trimmed.find('#') {
            Some(idx) => &trimmed[..idx],
            None => trimmed,
        };
        without_fragment.trim_end_matches('/').to_lowercase()
    }
}

/// Time utilities
pub mod time {
    use chrono::{DateTime, Duration, Utc};

    /// `days` before `now`, saturating at the earliest representable instant.
    pub fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
        now.checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Human-readable age, e.g. "3 hours ago".
    pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
        let diff = now.signed_duration_since(then);
        if diff < Duration::zero() {
            return "just now".to_string();
        }

        let days = diff.num_days();
        if days > 0 {
            return format!("{} day{} ago", days, if days > 1 { "s" } else { "" });
        }

        let hours = diff.num_hours();
        if hours > 0 {
            return format!("{} hour{} ago", hours, if hours > 1 { "s" } else { "" });
        }

        let minutes = diff.num_minutes();
        format!("{} minute{} ago", minutes, if minutes == 1 { "" } else { "s" })
    }

    /// Format duration in human-readable form
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.num_seconds();

        if total_seconds < 60 {
            format!("{}s", total_seconds)
        } else if total_seconds < 3600 {
            format!("{}m", total_seconds / 60)
        } else if total_seconds < 86400 {
            format!("{}h", total_seconds / 3600)
        } else {
            format!("{}d", total_seconds / 86400)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(text::truncate_chars("héllo", 2), "hé");
        assert_eq!(text::truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn canonical_link_drops_fragment_and_case() {
        assert_eq!(
            url::canonical_link(" https://Example.com/Story/#comments "),
            "https://example.com/story"
        );
    }

    #[test]
    fn time_ago_uses_largest_unit() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        assert_eq!(time::time_ago(now - Duration::days(2), now), "2 days ago");
        assert_eq!(time::time_ago(now - Duration::hours(1), now), "1 hour ago");
        assert_eq!(time::time_ago(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(time::time_ago(now - Duration::seconds(20), now), "0 minutes ago");
    }

    #[test]
    fn days_before_saturates_instead_of_overflowing() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        assert_eq!(time::days_before(now, 3), now - Duration::days(3));
        assert_eq!(time::days_before(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
