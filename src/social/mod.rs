// src/social/mod.rs
//! LLM-backed social search: the client boundary and the normalization of
//! its untrusted answers.

pub mod client;
pub mod normalize;

pub use client::{SocialSearchClient, StaticSocialClient, XaiClient};
pub use normalize::{parse_search_response, ParsedSearch, SocialCluster, SocialPost, TrendData};
