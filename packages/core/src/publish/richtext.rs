//! Link facets for Bluesky rich text.
//!
//! Bluesky does not auto-link plain text; a post must carry a facet per
//! link giving the UTF-8 byte range of the URL inside `text`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const LINK_FEATURE_TYPE: &str = "app.bsky.richtext.facet#link";

/// Characters dropped from the end of a detected URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '\'', '"'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetFeature {
    #[serde(rename = "$type")]
    pub kind: String,
    pub uri: String,
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("URL pattern is valid"))
}

/// Detect `http(s)://` links in `text` and return one link facet each.
pub fn detect_link_facets(text: &str) -> Vec<Facet> {
    url_pattern()
        .find_iter(text)
        .filter_map(|found| {
            let url = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            // "https://" alone is not a link.
            if url.ends_with("://") {
                return None;
            }
            Some(Facet {
                index: ByteSlice {
                    byte_start: found.start(),
                    byte_end: found.start() + url.len(),
                },
                features: vec![FacetFeature {
                    kind: LINK_FEATURE_TYPE.to_string(),
                    uri: url.to_string(),
                }],
            })
        })
        .collect()
}
