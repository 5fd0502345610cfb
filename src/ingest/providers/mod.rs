// src/ingest/providers/mod.rs
pub mod news_feed;
pub mod page;
pub mod rakuten;
pub mod sites;
pub mod social;

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::SourceKind;
use crate::ingest::types::SourceAdapter;

use self::news_feed::{DirectFeedAdapter, FeedRankingAdapter, NewsSearchAdapter};
use self::page::{PageAdapter, PageMetric};
use self::rakuten::RakutenRankingAdapter;
use self::sites::{
    AmazonBestsellers, HontoRanking, KinseriDeals, TohanWeekly, YahooFollow, YurindoRanking,
};
use self::social::SocialSearchAdapter;

/// Maps each source kind to the adapter that handles it.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceKind, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every built-in adapter, with production politeness settings.
    pub fn standard() -> Self {
        Self::empty()
            .with(SourceKind::XGrok, SocialSearchAdapter)
            .with(SourceKind::GoogleNews, NewsSearchAdapter)
            .with(SourceKind::RssDirect, DirectFeedAdapter)
            .with(SourceKind::RssRanking, FeedRankingAdapter)
            .with(
                SourceKind::AmazonBestseller,
                PageAdapter::new(AmazonBestsellers, PageMetric::Rank)
                    .with_browser_headers()
                    .with_referer("https://www.amazon.co.jp/")
                    .with_politeness_delay(1_000..3_000),
            )
            .with(
                SourceKind::TohanBestseller,
                PageAdapter::new(TohanWeekly, PageMetric::Rank),
            )
            .with(
                SourceKind::HontoBestseller,
                PageAdapter::new(HontoRanking, PageMetric::Rank),
            )
            .with(
                SourceKind::YurindoBestseller,
                PageAdapter::new(YurindoRanking, PageMetric::Rank),
            )
            .with(SourceKind::RakutenBestseller, RakutenRankingAdapter)
            .with(
                SourceKind::YahooFollow,
                PageAdapter::new(YahooFollow, PageMetric::Mentions).with_browser_headers(),
            )
            .with(
                SourceKind::KinseriDeals,
                PageAdapter::new(KinseriDeals, PageMetric::Unranked).with_browser_headers(),
            )
    }

    pub fn with<A: SourceAdapter + 'static>(mut self, kind: SourceKind, adapter: A) -> Self {
        self.adapters.insert(kind, Arc::new(adapter));
        self
    }

    pub fn with_shared(mut self, kind: SourceKind, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(kind, adapter);
        self
    }

    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_covers_every_kind() {
        let r = AdapterRegistry::standard();
        for kind in [
            SourceKind::XGrok,
            SourceKind::GoogleNews,
            SourceKind::RssDirect,
            SourceKind::RssRanking,
            SourceKind::AmazonBestseller,
            SourceKind::TohanBestseller,
            SourceKind::HontoBestseller,
            SourceKind::YurindoBestseller,
            SourceKind::RakutenBestseller,
            SourceKind::YahooFollow,
            SourceKind::KinseriDeals,
        ] {
            assert!(r.get(kind).is_some(), "missing adapter for {}", kind.as_str());
        }
    }
}
