// src/ingest/feed.rs
//! RSS 2.0 / RSS 1.0 (RDF) / Atom feed parsing into a flat entry list.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use crate::ingest::clean_markup;

/// One feed entry with markup already stripped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    /// Raw timestamp text as published (unparsed).
    pub published_at: String,
}

#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

// RSS 2.0 nests items in <channel>; RSS 1.0 places them beside it.
#[derive(Debug, Deserialize)]
struct RssDoc {
    #[serde(default)]
    channel: Option<RssChannel>,
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<Text>,
    #[serde(default)]
    link: Option<Text>,
    #[serde(default)]
    guid: Option<Text>,
    #[serde(default)]
    description: Option<Text>,
    #[serde(rename = "content:encoded", default)]
    content_encoded: Option<Text>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<Text>,
    #[serde(rename = "dc:date", default)]
    dc_date: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<Text>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    #[serde(default)]
    summary: Option<Text>,
    #[serde(default)]
    content: Option<Text>,
    #[serde(default)]
    published: Option<Text>,
    #[serde(default)]
    updated: Option<Text>,
    #[serde(rename = "dc:date", default)]
    dc_date: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: Option<String>,
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

fn text_of(t: &Option<Text>) -> String {
    t.as_ref().map(|t| clean_markup(&t.value)).unwrap_or_default()
}

fn first_non_empty(values: impl IntoIterator<Item = String>) -> String {
    values
        .into_iter()
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}

/// Atom is chosen when both a `<feed` root and `<entry` blocks appear.
pub fn is_atom(xml: &str) -> bool {
    static RE_FEED: OnceCell<Regex> = OnceCell::new();
    static RE_ENTRY: OnceCell<Regex> = OnceCell::new();
    let re_feed = RE_FEED.get_or_init(|| Regex::new(r"(?i)<feed[\s>]").unwrap());
    let re_entry = RE_ENTRY.get_or_init(|| Regex::new(r"(?i)<entry[\s>]").unwrap());
    re_feed.is_match(xml) && re_entry.is_match(xml)
}

/// Parse a feed document. Entries with neither a title nor a link are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    if xml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let xml_clean = scrub_html_entities_for_xml(xml);

    let entries: Vec<FeedEntry> = if is_atom(&xml_clean) {
        let feed: AtomFeed = from_str(&xml_clean).context("parsing atom feed")?;
        feed.entry.into_iter().map(atom_entry).collect()
    } else {
        let doc: RssDoc = from_str(&xml_clean).context("parsing rss feed")?;
        let mut items = doc.channel.map(|c| c.item).unwrap_or_default();
        items.extend(doc.item);
        items.into_iter().map(rss_entry).collect()
    };

    Ok(entries
        .into_iter()
        .filter(|e| !e.title.is_empty() || !e.link.is_empty())
        .collect())
}

fn rss_entry(it: RssItem) -> FeedEntry {
    FeedEntry {
        title: text_of(&it.title),
        link: first_non_empty([text_of(&it.link), text_of(&it.guid)]),
        summary: first_non_empty([text_of(&it.description), text_of(&it.content_encoded)]),
        published_at: first_non_empty([text_of(&it.pub_date), text_of(&it.dc_date)]),
    }
}

fn atom_entry(it: AtomEntry) -> FeedEntry {
    let href = it
        .link
        .iter()
        .filter_map(|l| l.href.as_deref())
        .map(str::trim)
        .find(|h| !h.is_empty())
        .map(str::to_string);
    let link = href.unwrap_or_else(|| {
        it.link
            .iter()
            .filter_map(|l| l.text.as_deref())
            .map(clean_markup)
            .find(|t| !t.is_empty())
            .unwrap_or_default()
    });
    FeedEntry {
        title: text_of(&it.title),
        link,
        summary: first_non_empty([text_of(&it.summary), text_of(&it.content)]),
        published_at: first_non_empty([
            text_of(&it.published),
            text_of(&it.updated),
            text_of(&it.dc_date),
        ]),
    }
}

/// Make HTML-flavoured feed text acceptable to an XML parser.
///
/// Numeric references and the five XML entities pass through. Any other named
/// entity is decoded and re-emitted as numeric references; a bare `&` (or an
/// unknown name) becomes `&amp;`. CDATA sections are left untouched.
fn scrub_html_entities_for_xml(s: &str) -> String {
    static RE_AMP: OnceCell<Regex> = OnceCell::new();
    let re = RE_AMP.get_or_init(|| {
        Regex::new(r"(?s)<!\[CDATA\[.*?\]\]>|&(#[0-9]{1,7};|#[xX][0-9a-fA-F]{1,6};|[A-Za-z][A-Za-z0-9]{1,31};)?")
            .unwrap()
    });
    re.replace_all(s, |caps: &regex::Captures<'_>| {
        let whole = &caps[0];
        if whole.starts_with("<![CDATA[") {
            return whole.to_string();
        }
        let Some(reference) = caps.get(1).map(|m| m.as_str()) else {
            return "&amp;".to_string();
        };
        if reference.starts_with('#') || XML_ENTITIES.contains(&reference) {
            return whole.to_string();
        }
        let decoded = html_escape::decode_html_entities(whole);
        if decoded == whole {
            format!("&amp;{reference}")
        } else {
            decoded.chars().map(|c| format!("&#{};", c as u32)).collect()
        }
    })
    .into_owned()
}

const XML_ENTITIES: [&str; 5] = ["amp;", "lt;", "gt;", "quot;", "apos;"];
