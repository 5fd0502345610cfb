// src/catalog.rs
//! # Source Catalog
//!
//! Static registry of fetch targets. Each entry declares which adapter kind
//! handles it, its category, cost tier, trust priority and item cap, plus the
//! kind-specific parameters (fetch URL or query template).
//!
//! The catalog is built once at startup and only read afterwards. Per run it
//! is narrowed by a [`SourceMode`] and by an optional explicit allow-list.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

const GOOGLE_NEWS_BASE: &str = "https://news.google.com/rss/search";

/// Adapter kind responsible for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// LLM-backed social search proxy.
    XGrok,
    /// News search feed built from a query template.
    GoogleNews,
    /// Feed fetched from a fixed URL.
    RssDirect,
    /// Feed whose entry order is a leaderboard.
    RssRanking,
    AmazonBestseller,
    TohanBestseller,
    HontoBestseller,
    YurindoBestseller,
    RakutenBestseller,
    YahooFollow,
    KinseriDeals,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::XGrok => "x_grok",
            SourceKind::GoogleNews => "google_news",
            SourceKind::RssDirect => "rss_direct",
            SourceKind::RssRanking => "rss_ranking",
            SourceKind::AmazonBestseller => "amazon_bestseller",
            SourceKind::TohanBestseller => "tohan_bestseller",
            SourceKind::HontoBestseller => "honto_bestseller",
            SourceKind::YurindoBestseller => "yurindo_bestseller",
            SourceKind::RakutenBestseller => "rakuten_bestseller",
            SourceKind::YahooFollow => "yahoo_follow",
            SourceKind::KinseriDeals => "kinseri_deals",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    IndustryNews,
    PressRelease,
    BookReview,
    NewRelease,
    Personnel,
    PublicityTv,
    PublicityRadio,
    Retail,
    Digital,
    SupplyChain,
    Education,
    Ip,
    Awards,
    Ranking,
    Deals,
    Social,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    #[default]
    Free,
    Api,
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    pub id: String,
    pub kind: SourceKind,
    pub name: String,
    pub category: SourceCategory,
    #[serde(default)]
    pub cost_tier: CostTier,
    /// Higher = more trusted.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Max signals kept per run.
    #[serde(default = "default_item_limit")]
    pub item_limit: usize,
    #[serde(default)]
    pub url: Option<String>,
    /// Alternate URLs tried in order after `url`.
    #[serde(default)]
    pub fallback_urls: Vec<String>,
    #[serde(default)]
    pub query_template: Option<String>,
    /// Overrides the run's look-back window for slow-moving feeds.
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

fn default_priority() -> u32 {
    1
}

fn default_item_limit() -> usize {
    8
}

impl SourceDescriptor {
    /// Every URL to try for this source, primary first.
    pub fn urls(&self) -> Vec<&str> {
        self.url
            .iter()
            .chain(self.fallback_urls.iter())
            .map(String::as_str)
            .filter(|u| !u.trim().is_empty())
            .collect()
    }

    pub fn is_ranking(&self) -> bool {
        self.category == SourceCategory::Ranking
    }
}

/// Which source families are eligible this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    #[default]
    All,
    /// News and social only: skips ranking and deals pages.
    NewsSocial,
}

impl SourceMode {
    /// Lenient parse for env and CLI values; anything unknown means `All`.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "news_social" => SourceMode::NewsSocial,
            _ => SourceMode::All,
        }
    }

    pub fn admits(&self, source: &SourceDescriptor) -> bool {
        match self {
            SourceMode::All => true,
            SourceMode::NewsSocial => {
                source.kind == SourceKind::XGrok
                    || !(source.is_ranking() || source.category == SourceCategory::Deals)
            }
        }
    }
}

/// Narrow a catalog for one run.
///
/// `include_social = false` drops the social search source; a non-empty
/// `allow` list keeps only the listed ids.
pub fn filter_catalog(
    catalog: &[SourceDescriptor],
    mode: SourceMode,
    include_social: bool,
    allow: Option<&HashSet<String>>,
) -> Vec<SourceDescriptor> {
    catalog
        .iter()
        .filter(|s| include_social || s.kind != SourceKind::XGrok)
        .filter(|s| allow.map_or(true, |ids| ids.contains(&s.id)))
        .filter(|s| mode.admits(s))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostSummary {
    pub total: usize,
    pub free: usize,
    pub api: usize,
}

pub fn summarize_source_cost(catalog: &[SourceDescriptor]) -> CostSummary {
    let api = catalog
        .iter()
        .filter(|s| s.cost_tier == CostTier::Api)
        .count();
    CostSummary {
        total: catalog.len(),
        free: catalog.len() - api,
        api,
    }
}

/// News search feed URL for a query (Japanese locale).
pub fn build_google_news_rss_url(query: &str) -> String {
    match Url::parse_with_params(
        GOOGLE_NEWS_BASE,
        &[("q", query), ("hl", "ja"), ("gl", "JP"), ("ceid", "JP:ja")],
    ) {
        Ok(u) => u.to_string(),
        Err(_) => GOOGLE_NEWS_BASE.to_string(),
    }
}

fn news(
    id: &str,
    name: &str,
    category: SourceCategory,
    priority: u32,
    item_limit: usize,
    template: &str,
) -> SourceDescriptor {
    SourceDescriptor {
        id: id.into(),
        kind: SourceKind::GoogleNews,
        name: name.into(),
        category,
        cost_tier: CostTier::Free,
        priority,
        item_limit,
        url: None,
        fallback_urls: Vec::new(),
        query_template: Some(template.into()),
        max_age_days: None,
    }
}

fn page(
    id: &str,
    kind: SourceKind,
    name: &str,
    category: SourceCategory,
    priority: u32,
    item_limit: usize,
    url: &str,
) -> SourceDescriptor {
    SourceDescriptor {
        id: id.into(),
        kind,
        name: name.into(),
        category,
        cost_tier: CostTier::Free,
        priority,
        item_limit,
        url: Some(url.into()),
        fallback_urls: Vec::new(),
        query_template: None,
        max_age_days: None,
    }
}

/// Built-in catalog.
pub fn default_catalog() -> Vec<SourceDescriptor> {
    use SourceCategory::*;
    use SourceKind::*;

    let mut shinbunka = page(
        "news_shinbunka",
        RssDirect,
        "新文化オンライン",
        IndustryNews,
        4,
        8,
        "https://www.shinbunka.co.jp/feed",
    );
    shinbunka.max_age_days = Some(7);

    vec![
        SourceDescriptor {
            id: "x_grok_social".into(),
            kind: XGrok,
            name: "X / Grok x_search".into(),
            category: Social,
            cost_tier: CostTier::Api,
            priority: 5,
            item_limit: 14,
            url: None,
            fallback_urls: Vec::new(),
            query_template: None,
            max_age_days: None,
        },
        news(
            "news_publish_general",
            "Google News / 出版業界全般",
            IndustryNews,
            4,
            8,
            "{theme} 出版 業界 OR 書籍 OR 書店 OR 電子書籍",
        ),
        news(
            "news_pr_times",
            "Google News / PR TIMES",
            PressRelease,
            4,
            8,
            "{theme} PR TIMES OR プレスリリース 出版",
        ),
        news(
            "news_book_review",
            "Google News / 書評・レビュー",
            BookReview,
            4,
            8,
            "{theme} 書評 OR レビュー OR 読了 OR 感想",
        ),
        news(
            "news_new_release",
            "Google News / 新刊・発売情報",
            NewRelease,
            4,
            8,
            "{theme} 新刊 OR 発売 OR 刊行 OR 重版",
        ),
        news(
            "news_personnel",
            "Google News / 人事・組織変更",
            Personnel,
            3,
            8,
            "{theme} 出版 人事 OR 異動 OR 就任 OR 退任",
        ),
        news(
            "news_tv_publicity",
            "Google News / テレビ露出",
            PublicityTv,
            3,
            8,
            "{theme} 出版 テレビ OR 番組 出演 OR 特集",
        ),
        news(
            "news_radio_publicity",
            "Google News / ラジオ露出",
            PublicityRadio,
            3,
            8,
            "{theme} 出版 ラジオ OR 放送 OR 出演",
        ),
        news(
            "news_bookstore",
            "Google News / 書店・小売",
            Retail,
            3,
            8,
            "{theme} 書店 OR 取次 OR フェア OR 売場",
        ),
        news(
            "news_ebook",
            "Google News / 電子書籍・配信",
            Digital,
            3,
            8,
            "{theme} 電子書籍 OR Kindle OR Kobo OR 配信",
        ),
        news(
            "news_printing",
            "Google News / 印刷・紙・製本",
            SupplyChain,
            3,
            8,
            "{theme} 印刷 OR 用紙 OR 製本 OR 値上げ",
        ),
        news(
            "news_distribution",
            "Google News / 流通・物流",
            SupplyChain,
            3,
            8,
            "{theme} 書籍 物流 OR 配本 OR 流通 OR 在庫",
        ),
        news(
            "news_library_education",
            "Google News / 図書館・教育連携",
            Education,
            2,
            8,
            "{theme} 図書館 OR 学校 図書 OR 教育 出版",
        ),
        news(
            "news_media_mix",
            "Google News / 映像化・メディアミックス",
            Ip,
            2,
            8,
            "{theme} 映像化 OR ドラマ化 OR アニメ化 OR メディアミックス",
        ),
        news(
            "news_awards",
            "Google News / 受賞・ランキング",
            Awards,
            2,
            8,
            "{theme} 受賞 OR ランキング OR ベストセラー",
        ),
        page(
            "ranking_amazon_books",
            AmazonBestseller,
            "Amazonランキング / 本",
            Ranking,
            4,
            15,
            "https://www.amazon.co.jp/gp/bestsellers/books",
        ),
        page(
            "ranking_amazon_kindle",
            AmazonBestseller,
            "Amazonランキング / Kindle",
            Ranking,
            4,
            15,
            "https://www.amazon.co.jp/gp/bestsellers/digital-text",
        ),
        page(
            "ranking_tohan_weekly",
            TohanBestseller,
            "トーハン週間 / 総合",
            Ranking,
            4,
            10,
            "https://www.tohan.jp/bestsellers/",
        ),
        page(
            "ranking_honto_ebook",
            HontoBestseller,
            "hontoランキング / 電子書籍",
            Ranking,
            4,
            10,
            "https://honto.jp/ranking/gr/bestseller_1101_1204_012.html",
        ),
        page(
            "ranking_maruzen",
            HontoBestseller,
            "丸善ランキング",
            Ranking,
            4,
            10,
            "https://honto.jp/ranking/gr/bestseller_1101_1206_011.html?shgcd=HB310",
        ),
        page(
            "ranking_junkudo",
            HontoBestseller,
            "ジュンク堂ランキング",
            Ranking,
            4,
            10,
            "https://honto.jp/ranking/gr/bestseller_1101_1206_011.html?shgcd=HB320",
        ),
        page(
            "ranking_rakuten_books",
            RakutenBestseller,
            "楽天ブックスランキング",
            Ranking,
            4,
            10,
            "https://rdc-api-catalog-gateway-api.rakuten.co.jp/books/rank/001/hourly.json",
        ),
        page(
            "hatenabookmark_books",
            RssDirect,
            "はてブ / 本",
            BookReview,
            3,
            8,
            "https://b.hatena.ne.jp/q/%E8%AA%AD%E6%9B%B8?mode=rss&sort=recent&users=3",
        ),
        page(
            "news_bunshun_online",
            RssDirect,
            "文藝春秋オンライン",
            IndustryNews,
            3,
            6,
            "https://bunshun.jp/list/feed/rss",
        ),
        news(
            "news_gendai_media",
            "Google News / 現代ビジネス",
            IndustryNews,
            3,
            6,
            "現代ビジネス 講談社 出版 OR 書籍 OR 新刊",
        ),
        shinbunka,
        page(
            "news_hon_jp",
            RssDirect,
            "HON.jp News Blog",
            Digital,
            3,
            6,
            "https://hon.jp/news/feed",
        ),
    ]
}
