// src/ingest/mod.rs
pub mod feed;
pub mod fetch;
pub mod providers;
pub mod types;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use url::Url;

/// Tracking parameters removed during URL canonicalisation.
const TRACKING_PARAMS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
];

/// Default cap for signal titles and summaries (chars).
pub const TEXT_LIMIT: usize = 180;

/// Look-back window used when a theme does not set one.
pub const DEFAULT_PERIOD_DAYS: u32 = 2;

/// Japan Standard Time; the digest's calendar is JST.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap_or(Utc.fix())
}

/// Strip markup from feed/page text: decode entities, drop tags (and
/// script/style bodies), collapse whitespace.
pub fn clean_markup(s: &str) -> String {
    static RE_BLOCKS: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();

    let re_blocks = RE_BLOCKS.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>").unwrap()
    });
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]+>").unwrap());
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    // Escaped markup (e.g. feed descriptions) must become tags before stripping.
    let decoded = html_escape::decode_html_entities(s);
    let out = re_blocks.replace_all(&decoded, " ");
    let out = re_tags.replace_all(&out, " ");
    // Entities that were double-escaped survive the first pass.
    let out = html_escape::decode_html_entities(&out).to_string();
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Collapse whitespace and cap to `max` chars, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.chars().count() <= max {
        return clean;
    }
    let mut out: String = clean.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Canonical absolute http(s) URL with the fragment and `utm_*` tracking
/// parameters removed. Anything else yields an empty string.
pub fn normalize_url(raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return String::new();
    }
    let Ok(mut parsed) = Url::parse(value) else {
        return String::new();
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return String::new();
    }
    parsed.set_fragment(None);

    let has_tracking = parsed
        .query_pairs()
        .any(|(k, _)| TRACKING_PARAMS.contains(&k.as_ref()));
    if has_tracking {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    parsed.to_string()
}

/// Parse the timestamp dialects seen in feeds (RFC 2822, RFC 3339, and a
/// few near-ISO forms). Returns `None` when nothing matches.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return jst().from_local_datetime(&naive).single().map(|d| d.with_timezone(&Utc));
    }
    None
}

/// JST calendar date `period_days` days before `now` (floor, min 1).
pub fn since_date(period_days: u32, now: DateTime<Utc>) -> NaiveDate {
    let days = period_days.max(1) as i64;
    (now - Duration::days(days)).with_timezone(&jst()).date_naive()
}

/// Whether a raw timestamp falls on or after `since` 00:00 JST.
/// Unparseable timestamps count as recent.
pub fn is_recent_enough(published: Option<&str>, since: NaiveDate) -> bool {
    let Some(dt) = published.and_then(parse_published) else {
        return true;
    };
    let Some(midnight) = since.and_hms_opt(0, 0, 0) else {
        return true;
    };
    match jst().from_local_datetime(&midnight).single() {
        Some(threshold) => dt >= threshold.with_timezone(&Utc),
        None => true,
    }
}

/// Expand `{theme}`, `{periodDays}` and `{sinceDate}` in a query template.
pub fn fill_template(template: &str, theme_query: &str, period_days: u32, since: NaiveDate) -> String {
    template
        .replace("{theme}", theme_query.trim())
        .replace("{periodDays}", &period_days.to_string())
        .replace("{sinceDate}", &since.format("%Y-%m-%d").to_string())
}

/// Run-unique identifier: `{prefix}_{millis base36}_{8 hex}`.
pub fn create_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!("{prefix}_{}_{:08x}", to_base36(millis), rand::random::<u32>())
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_markup_strips_tags_and_entities() {
        let s = "  <p>新刊&nbsp;情報</p><script>x()</script> &amp; more ";
        assert_eq!(clean_markup(s), "新刊 情報 & more");
    }

    #[test]
    fn clean_markup_handles_escaped_html() {
        let s = "&lt;a href=\"https://x\"&gt;見出し&lt;/a&gt;&amp;nbsp;本文";
        assert_eq!(clean_markup(s), "見出し 本文");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdefgh", 5), "abcd…");
        assert_eq!(truncate("  a \n b  ", 10), "a b");
    }

    #[test]
    fn normalize_url_drops_tracking_and_fragment() {
        assert_eq!(
            normalize_url("https://example.com/a?utm_source=x&id=3#frag"),
            "https://example.com/a?id=3"
        );
        assert_eq!(
            normalize_url("https://example.com/a?utm_medium=x"),
            "https://example.com/a"
        );
        assert_eq!(normalize_url("ftp://example.com/a"), "");
        assert_eq!(normalize_url("not a url"), "");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn parse_published_accepts_feed_dialects() {
        assert!(parse_published("Fri, 20 Feb 2026 09:00:00 GMT").is_some());
        assert!(parse_published("2026-02-20T10:00:00Z").is_some());
        assert!(parse_published("2026-02-20T10:00:00+09:00").is_some());
        assert!(parse_published("yesterday").is_none());
    }

    #[test]
    fn since_date_uses_jst_calendar() {
        // 2026-02-20 20:00 UTC is already 2026-02-21 in JST.
        let now = Utc.with_ymd_and_hms(2026, 2, 20, 20, 0, 0).unwrap();
        assert_eq!(
            since_date(2, now),
            NaiveDate::from_ymd_opt(2026, 2, 19).unwrap()
        );
        assert_eq!(since_date(0, now), since_date(1, now));
    }

    #[test]
    fn recency_threshold_is_jst_midnight() {
        let since = NaiveDate::from_ymd_opt(2026, 2, 19).unwrap();
        // 2026-02-18 15:00 UTC == 2026-02-19 00:00 JST
        assert!(is_recent_enough(Some("2026-02-18T15:00:00Z"), since));
        assert!(!is_recent_enough(Some("2026-02-18T14:59:59Z"), since));
        assert!(is_recent_enough(Some("garbage"), since));
        assert!(is_recent_enough(None, since));
    }

    #[test]
    fn fill_template_expands_placeholders() {
        let since = NaiveDate::from_ymd_opt(2026, 2, 19).unwrap();
        let q = fill_template("{theme} 新刊 {periodDays}d {sinceDate}", " 出版 ", 2, since);
        assert_eq!(q, "出版 新刊 2d 2026-02-19");
    }

    #[test]
    fn ids_have_prefix() {
        let a = create_id("sig");
        assert!(a.starts_with("sig_"));
        assert_ne!(a, create_id("sig"));
    }
}
