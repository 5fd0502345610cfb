// src/ingest/providers/sites.rs
//! Per-site extractors for bestseller rankings, follow pages and deal lists.

use std::collections::HashSet;

use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::page::{is_likely_price_text, squash_ws, PageEntry, PageExtractor};
use crate::ingest::truncate;

/// Amazon titles are capped tighter than the signal text limit.
const AMAZON_TITLE_LIMIT: usize = 120;

fn selector(cell: &'static OnceCell<Selector>, css: &'static str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).unwrap())
}

fn regex(cell: &'static OnceCell<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

fn element_text(el: ElementRef<'_>) -> String {
    squash_ws(&el.text().collect::<Vec<_>>().join(" "))
}

fn hrefs<'a>(el: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    static A: OnceCell<Selector> = OnceCell::new();
    el.select(selector(&A, "a[href]"))
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

// --- Tohan weekly ---

pub struct TohanWeekly;

impl PageExtractor for TohanWeekly {
    fn name(&self) -> &'static str {
        "tohan_weekly"
    }

    fn extract(&self, html: &str, limit: usize) -> Vec<PageEntry> {
        static ITEM: OnceCell<Selector> = OnceCell::new();
        static H3: OnceCell<Selector> = OnceCell::new();
        static EHON: OnceCell<Regex> = OnceCell::new();

        let doc = Html::parse_document(html);
        let ehon = regex(&EHON, r"(?i)^https?://www\.e-hon\.ne\.jp\S*refISBN=");
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for item in doc.select(selector(&ITEM, r#"li.item[class*="rank-"]"#)) {
            if out.len() >= limit {
                break;
            }
            let Some(h3) = item.select(selector(&H3, "h3")).next() else {
                continue;
            };
            let title = element_text(h3);
            if char_len(&title) < 2 || !seen.insert(title.to_lowercase()) {
                continue;
            }
            let url = hrefs(item)
                .find(|h| ehon.is_match(h))
                .unwrap_or_default()
                .to_string();
            out.push(PageEntry {
                summary: format!("{title}（トーハン週間ランキング）"),
                title,
                url,
                cover_image_url: None,
            });
        }
        out
    }
}

// --- honto (also Maruzen / Junkudo store rankings) ---

pub struct HontoRanking;

impl PageExtractor for HontoRanking {
    fn name(&self) -> &'static str {
        "honto_ranking"
    }

    fn extract(&self, html: &str, limit: usize) -> Vec<PageEntry> {
        static HEADING: OnceCell<Selector> = OnceCell::new();
        static EBOOK: OnceCell<Regex> = OnceCell::new();
        static NETSTORE: OnceCell<Regex> = OnceCell::new();

        let doc = Html::parse_document(html);
        let ebook = regex(&EBOOK, r"(?i)^https?://honto\.jp/ebook/pd_");
        let netstore = regex(&NETSTORE, r"(?i)^https?://honto\.jp/netstore/pd_");
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for heading in doc.select(selector(&HEADING, "h2.stHeading")) {
            if out.len() >= limit * 2 {
                break;
            }
            let title = element_text(heading);
            if char_len(&title) < 2 || !seen.insert(title.to_lowercase()) {
                continue;
            }
            let links: Vec<&str> = hrefs(heading).collect();
            let product = links
                .iter()
                .find(|h| ebook.is_match(h))
                .or_else(|| links.iter().find(|h| netstore.is_match(h)));
            let url = match product {
                Some(href) => href.split('?').next().unwrap_or_default().to_string(),
                None => format!(
                    "https://honto.jp/netstore/search.html?search.keyword={}",
                    urlencoding::encode(&title)
                ),
            };
            out.push(PageEntry {
                summary: format!("{title}（hontoランキング）"),
                title,
                url,
                cover_image_url: None,
            });
        }
        out.truncate(limit);
        out
    }
}

// --- Yurindo ---

pub struct YurindoRanking;

impl PageExtractor for YurindoRanking {
    fn name(&self) -> &'static str {
        "yurindo_ranking"
    }

    /// Titles and stock-search links are separate lists on the page and are
    /// paired by position.
    fn extract(&self, html: &str, limit: usize) -> Vec<PageEntry> {
        static DETAIL: OnceCell<Selector> = OnceCell::new();
        static H3: OnceCell<Selector> = OnceCell::new();
        static BODY: OnceCell<Selector> = OnceCell::new();
        static ITEM_LINK: OnceCell<Regex> = OnceCell::new();

        let doc = Html::parse_document(html);
        let item_link = regex(
            &ITEM_LINK,
            r"(?i)^https?://search\.yurindo\.bscentral\.jp/item\?ic=",
        );

        let titles: Vec<String> = doc
            .select(selector(&DETAIL, "div.book-detail"))
            .filter_map(|d| d.select(selector(&H3, "h3")).next())
            .map(element_text)
            .filter(|t| char_len(t) >= 2)
            .collect();
        let urls: Vec<String> = doc
            .select(selector(&BODY, "body"))
            .next()
            .map(|body| {
                hrefs(body)
                    .filter(|h| item_link.is_match(h))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (i, title) in titles.into_iter().take(limit).enumerate() {
            if !seen.insert(title.to_lowercase()) {
                continue;
            }
            let url = urls.get(i).cloned().unwrap_or_else(|| {
                format!(
                    "https://search.yurindo.bscentral.jp/search/?keyword={}",
                    urlencoding::encode(&title)
                )
            });
            out.push(PageEntry {
                summary: format!("{title}（有隣堂ランキング）"),
                title,
                url,
                cover_image_url: None,
            });
        }
        out
    }
}

// --- Yahoo! News follow page ---

pub struct YahooFollow;

impl PageExtractor for YahooFollow {
    fn name(&self) -> &'static str {
        "yahoo_follow"
    }

    fn extract(&self, html: &str, limit: usize) -> Vec<PageEntry> {
        static A: OnceCell<Selector> = OnceCell::new();
        static H2: OnceCell<Selector> = OnceCell::new();
        static ARTICLE: OnceCell<Regex> = OnceCell::new();

        let doc = Html::parse_document(html);
        let article = regex(
            &ARTICLE,
            r"^https://news\.yahoo\.co\.jp/articles/[a-f0-9]{40}$",
        );
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for a in doc.select(selector(&A, "a[href]")) {
            if out.len() >= limit {
                break;
            }
            let href = a.value().attr("href").unwrap_or_default().trim();
            if !article.is_match(href) {
                continue;
            }
            let Some(h2) = a.select(selector(&H2, "h2")).next() else {
                continue;
            };
            let title = element_text(h2);
            if char_len(&title) < 5 || !seen.insert(href.to_string()) {
                continue;
            }
            out.push(PageEntry {
                summary: title.clone(),
                title,
                url: href.to_string(),
                cover_image_url: None,
            });
        }
        out
    }
}

// --- Amazon bestsellers ---

pub struct AmazonBestsellers;

fn is_amazon_boilerplate(title: &str) -> bool {
    static CHROME: OnceCell<Regex> = OnceCell::new();
    static PROMO: OnceCell<Regex> = OnceCell::new();
    regex(&CHROME, r"(?i)Amazon\.co\.jp|カート|ほしい物リスト|ポイント").is_match(title)
        || regex(
            &PROMO,
            r"(?i)マスターカード|クレジットカード|ギフト券|Unlimited|プライム会員|Echo|Kindle端末|Fire\s*(?:TV|タブレット)|Alexa",
        )
        .is_match(title)
}

impl PageExtractor for AmazonBestsellers {
    fn name(&self) -> &'static str {
        "amazon_bestsellers"
    }

    fn is_blocked(&self, html: &str) -> bool {
        static ROBOT: OnceCell<Regex> = OnceCell::new();
        regex(
            &ROBOT,
            r"(?i)Robot Check|captcha|Enter the characters|文字を入力",
        )
        .is_match(html)
    }

    /// Product anchors carry an ASIN. A price-only anchor text (or a very
    /// short one) yields to the cover image's alt text.
    fn extract(&self, html: &str, limit: usize) -> Vec<PageEntry> {
        static A: OnceCell<Selector> = OnceCell::new();
        static IMG: OnceCell<Selector> = OnceCell::new();
        static ASIN: OnceCell<Regex> = OnceCell::new();

        let doc = Html::parse_document(html);
        let asin_re = regex(&ASIN, r"(?i)/dp/([A-Z0-9]{10})");
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for a in doc.select(selector(&A, "a[href]")) {
            if out.len() >= limit * 3 {
                break;
            }
            let href = a.value().attr("href").unwrap_or_default();
            let Some(asin) = asin_re.captures(href).map(|c| c[1].to_string()) else {
                continue;
            };
            let body = element_text(a);
            let alt = a
                .select(selector(&IMG, "img[alt]"))
                .next()
                .and_then(|img| img.value().attr("alt"))
                .map(squash_ws)
                .unwrap_or_default();

            let candidate = if is_likely_price_text(&body) && !alt.is_empty() && !is_likely_price_text(&alt) {
                alt
            } else if char_len(&body) < 5 && !alt.is_empty() {
                alt
            } else {
                body
            };
            let title = truncate(&candidate, AMAZON_TITLE_LIMIT);

            if char_len(&title) < 3
                || seen.contains(&asin)
                || is_amazon_boilerplate(&title)
                || is_likely_price_text(&title)
            {
                continue;
            }
            seen.insert(asin.clone());
            out.push(PageEntry {
                summary: format!("{title}（Amazonランキング）"),
                title,
                url: format!("https://www.amazon.co.jp/dp/{asin}"),
                cover_image_url: None,
            });
        }
        out.truncate(limit);
        out
    }
}

// --- Kinseri deals ---

pub struct KinseriDeals;

impl PageExtractor for KinseriDeals {
    fn name(&self) -> &'static str {
        "kinseri_deals"
    }

    /// List rows with an Amazon product link and a yen price.
    fn extract(&self, html: &str, limit: usize) -> Vec<PageEntry> {
        static LI: OnceCell<Selector> = OnceCell::new();
        static A: OnceCell<Selector> = OnceCell::new();
        static PRODUCT: OnceCell<Regex> = OnceCell::new();
        static PRICE: OnceCell<Regex> = OnceCell::new();

        let doc = Html::parse_document(html);
        let product = regex(&PRODUCT, r"^https?://www\.amazon\.co\.jp/dp/");
        let price_re = regex(&PRICE, r"(\d[\d,]*)円");
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for li in doc.select(selector(&LI, "li")) {
            if out.len() >= limit * 2 {
                break;
            }
            let Some(a) = li.select(selector(&A, "a[href]")).find(|a| {
                a.value()
                    .attr("href")
                    .is_some_and(|h| product.is_match(h.trim()))
            }) else {
                continue;
            };
            let url = a.value().attr("href").unwrap_or_default().trim().to_string();
            let title = element_text(a);
            let row = element_text(li);
            let Some(price) = price_re.captures(&row).map(|c| c[1].to_string()) else {
                continue;
            };
            if char_len(&title) < 2 || !seen.insert(url.clone()) {
                continue;
            }
            out.push(PageEntry {
                summary: format!("{title}（{price}円）"),
                title,
                url,
                cover_image_url: None,
            });
        }
        out.truncate(limit);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amazon_robot_page_is_blocked() {
        assert!(AmazonBestsellers.is_blocked("<title>Robot Check</title>"));
        assert!(!AmazonBestsellers.is_blocked("<html><body>本</body></html>"));
    }

    #[test]
    fn amazon_skips_boilerplate_links() {
        let html = r#"<a href="/dp/B0000000AA">ほしい物リストに追加する</a>
                      <a href="/dp/B0000000BB">Kindle Unlimited 読み放題</a>
                      <a href="/dp/B0000000CC">本当の本のタイトル</a>"#;
        let got = AmazonBestsellers.extract(html, 5);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].url, "https://www.amazon.co.jp/dp/B0000000CC");
    }
}
