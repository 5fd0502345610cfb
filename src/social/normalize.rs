// src/social/normalize.rs
//! Coercion of the social search answer into typed trend data.
//!
//! The answer is an untrusted document: every field is read through
//! defaulting accessors, so normalization never fails. A response that
//! cannot be read at all yields an empty [`TrendData`] with `ok = false`.

use std::cmp::Ordering;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_CLUSTERS: usize = 5;
const MAX_CLUSTER_POSTS: usize = 2;
const MAX_KEYPHRASES: usize = 5;
const MAX_THEMES: usize = 10;
const MAX_MATERIALS: usize = 10;
const UNTITLED_CLUSTER: &str = "無題クラスター";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SocialPost {
    pub url: String,
    pub summary: String,
    pub likes: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SocialCluster {
    pub name: String,
    pub keyphrases: Vec<String>,
    pub posts: Vec<SocialPost>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendData {
    pub clusters: Vec<SocialCluster>,
    pub themes: Vec<String>,
    /// Candidate posts, most liked first.
    pub materials: Vec<SocialPost>,
    pub editorial_summary: String,
}

/// Outcome of reading one raw search response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedSearch {
    /// False when no JSON payload could be read from the answer.
    pub ok: bool,
    pub data: TrendData,
    /// Assistant text as returned (empty when none was found).
    pub raw_text: String,
}

fn items(v: Option<&Value>) -> &[Value] {
    match v {
        Some(Value::Array(a)) => a.as_slice(),
        _ => &[],
    }
}

fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

fn number(v: Option<&Value>) -> f64 {
    let n = match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn post(v: &Value) -> SocialPost {
    SocialPost {
        url: text(v.get("url")),
        summary: text(v.get("summary")),
        likes: number(v.get("likes")),
    }
}

fn cluster(v: &Value) -> SocialCluster {
    let posts = items(v.get("posts"))
        .iter()
        .take(MAX_CLUSTER_POSTS)
        .map(post)
        .filter(|p| !p.url.is_empty())
        .collect();
    let keyphrases = items(v.get("keyphrases"))
        .iter()
        .map(|k| text(Some(k)))
        .filter(|k| !k.is_empty())
        .take(MAX_KEYPHRASES)
        .collect();
    let name = text(v.get("name"));
    SocialCluster {
        name: if name.is_empty() {
            UNTITLED_CLUSTER.to_string()
        } else {
            name
        },
        keyphrases,
        posts,
    }
}

/// Total normalization of a decoded payload. Non-object input yields the
/// empty value.
pub fn normalize_trend_data(raw: &Value) -> TrendData {
    let clusters: Vec<SocialCluster> = items(raw.get("clusters"))
        .iter()
        .take(MAX_CLUSTERS)
        .map(cluster)
        .filter(|c| !c.posts.is_empty() || !c.keyphrases.is_empty())
        .collect();

    let themes = items(raw.get("themes"))
        .iter()
        .map(|t| text(Some(t)))
        .filter(|t| !t.is_empty())
        .take(MAX_THEMES)
        .collect();

    let mut materials: Vec<SocialPost> = items(raw.get("materials"))
        .iter()
        .map(post)
        .filter(|p| !p.url.is_empty())
        .collect();
    if materials.is_empty() {
        materials = clusters.iter().flat_map(|c| c.posts.clone()).collect();
    }
    materials.sort_by(|a, b| b.likes.partial_cmp(&a.likes).unwrap_or(Ordering::Equal));
    materials.truncate(MAX_MATERIALS);

    let editorial_summary = match raw.get("editorialSummary") {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };

    TrendData {
        clusters,
        themes,
        materials,
        editorial_summary,
    }
}

/// Assistant text of a responses-API envelope: the top-level `output_text`,
/// else the first text part of an assistant message in `output`.
pub fn find_assistant_text(envelope: &Value) -> String {
    if let Some(Value::String(s)) = envelope.get("output_text") {
        if !s.trim().is_empty() {
            return s.clone();
        }
    }

    for item in items(envelope.get("output")) {
        let Some(Value::Array(content)) = item.get("content") else {
            continue;
        };
        let is_assistant = item.get("role").and_then(Value::as_str) == Some("assistant")
            || item.get("type").and_then(Value::as_str) == Some("message");
        if !is_assistant {
            continue;
        }
        for part in content {
            let kind = part.get("type").and_then(Value::as_str);
            if !matches!(kind, Some("output_text") | Some("text")) {
                continue;
            }
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                let t = t.trim();
                if !t.is_empty() {
                    return t.to_string();
                }
            }
        }
    }
    String::new()
}

/// Pull the JSON object out of free text: fenced block first, then the
/// outermost brace pair.
pub fn extract_json_text(text: &str) -> String {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re_fence = RE_FENCE.get_or_init(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").unwrap());

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some(body) = re_fence.captures(trimmed).and_then(|c| c.get(1)) {
        if !body.as_str().is_empty() {
            return body.as_str().trim().to_string();
        }
    }
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed.to_string();
    }
    if let (Some(first), Some(last)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if last > first {
            return trimmed[first..=last].to_string();
        }
    }
    trimmed.to_string()
}

/// Read a raw search response. Never fails.
pub fn parse_search_response(raw: &str) -> ParsedSearch {
    let envelope: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "collector", error = %e, "social response is not json");
            return ParsedSearch::default();
        }
    };

    let assistant = find_assistant_text(&envelope);
    if assistant.is_empty() {
        tracing::warn!(target: "collector", "social response has no assistant text");
        return ParsedSearch::default();
    }

    match serde_json::from_str::<Value>(&extract_json_text(&assistant)) {
        Ok(payload) => ParsedSearch {
            ok: true,
            data: normalize_trend_data(&payload),
            raw_text: assistant,
        },
        Err(_) => ParsedSearch {
            ok: false,
            data: TrendData::default(),
            raw_text: assistant,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalization_fills_defaults_and_caps() {
        let raw = json!({
            "clusters": [
                {"name": "", "keyphrases": ["a", " ", 3], "posts": [
                    {"url": "https://x.com/1", "likes": "12"},
                    {"url": "", "likes": 99},
                    {"url": "https://x.com/3", "likes": 1}
                ]},
                {"name": "empty"},
                "not an object"
            ],
            "themes": ["t1", null, "t2"],
            "editorialSummary": 42
        });
        let d = normalize_trend_data(&raw);
        assert_eq!(d.clusters.len(), 1);
        assert_eq!(d.clusters[0].name, UNTITLED_CLUSTER);
        assert_eq!(d.clusters[0].keyphrases, vec!["a", "3"]);
        // only the first two posts are considered, the second has no url
        assert_eq!(d.clusters[0].posts.len(), 1);
        assert_eq!(d.themes, vec!["t1", "t2"]);
        // materials fall back to cluster posts
        assert_eq!(d.materials.len(), 1);
        assert_eq!(d.materials[0].likes, 12.0);
        assert_eq!(d.editorial_summary, "");
    }

    #[test]
    fn materials_sorted_by_likes() {
        let raw = json!({"materials": [
            {"url": "https://x.com/a", "likes": 3},
            {"url": "https://x.com/b", "likes": 30},
            {"url": "https://x.com/c", "likes": "bad"}
        ]});
        let d = normalize_trend_data(&raw);
        let urls: Vec<_> = d.materials.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.com/b", "https://x.com/a", "https://x.com/c"]);
    }

    #[test]
    fn non_object_payload_is_empty() {
        assert_eq!(normalize_trend_data(&json!([1, 2])), TrendData::default());
    }

    #[test]
    fn extracts_json_from_fences_and_prose() {
        assert_eq!(extract_json_text("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json_text("here: {\"a\":1} done"), "{\"a\":1}");
        assert_eq!(extract_json_text("no json"), "no json");
    }
}
