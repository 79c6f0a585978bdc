//! Assembly of fragment bodies into a single document.
//!
//! # Data Flow
//! ```text
//! FragmentDefinition tree
//!     → StitchStructure (keys + marker ids, built once per route)
//!
//! FetchResult[] + fragment order
//!     → map_results_to_keys
//!     → stitch: child bodies replace <viewproxy-fragment id="..."> markers, depth first
//! ```
//!
//! # Design Decisions
//! - Only the first marker for a child is replaced
//! - A missing marker leaves the parent unchanged
//! - The concatenating layout joins top-level children in declaration order
//!   and substitutes them for a single content marker

use std::collections::HashMap;

use super::definition::FragmentDefinition;
use crate::multiplexer::FetchResult;

pub const ROOT_KEY: &str = "root";

/// Marker replaced with all child content in the concatenating layout.
pub const CONTENT_MARKER: &[u8] = b"<view-proxy-content></view-proxy-content>";

/// How fragment bodies are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Children replace their own markers, recursively.
    #[default]
    Tree,
    /// Children are concatenated in order into the root's content marker.
    Concatenate,
}

/// Keys and marker ids for one node of a fragment tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchStructure {
    key: String,
    replacement_id: String,
    children: Vec<StitchStructure>,
}

impl StitchStructure {
    pub fn for_root(root: &FragmentDefinition) -> Self {
        Self::build(ROOT_KEY.to_string(), ROOT_KEY.to_string(), root)
    }

    fn build(key: String, replacement_id: String, definition: &FragmentDefinition) -> Self {
        let children = definition
            .children()
            .iter()
            .map(|(name, child)| Self::build(format!("{}.{}", key, name), name.clone(), child))
            .collect();

        Self {
            key,
            replacement_id,
            children,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn replacement_id(&self) -> &str {
        &self.replacement_id
    }

    pub fn children(&self) -> &[StitchStructure] {
        &self.children
    }
}

/// Pair fragment keys with results by position.
pub fn map_results_to_keys<'a>(
    order: &'a [String],
    results: &'a [FetchResult],
) -> HashMap<&'a str, &'a FetchResult> {
    order
        .iter()
        .map(String::as_str)
        .zip(results.iter())
        .collect()
}

/// Recursively replace child markers with child content.
pub fn stitch(structure: &StitchStructure, results: &HashMap<&str, &FetchResult>) -> Vec<u8> {
    let Some(result) = results.get(structure.key()) else {
        tracing::warn!(key = structure.key(), "No result for fragment");
        return Vec::new();
    };

    let mut body = result.body.to_vec();
    for child in structure.children() {
        let content = stitch(child, results);
        body = replace_marker(body, child.replacement_id(), &content);
    }
    body
}

/// Compose the final document for a layout.
pub fn compose(
    structure: &StitchStructure,
    layout: Layout,
    results: &HashMap<&str, &FetchResult>,
) -> Vec<u8> {
    match layout {
        Layout::Tree => stitch(structure, results),
        Layout::Concatenate => {
            let content: Vec<u8> = structure
                .children()
                .iter()
                .flat_map(|child| stitch(child, results))
                .collect();

            let layout_body = results
                .get(structure.key())
                .map(|result| result.body.to_vec())
                .unwrap_or_default();

            if layout_body.is_empty() {
                return content;
            }

            match replace_first(&layout_body, CONTENT_MARKER, &content) {
                Some(body) => body,
                None => layout_body,
            }
        }
    }
}

fn replace_marker(body: Vec<u8>, id: &str, content: &[u8]) -> Vec<u8> {
    let paired = format!("<viewproxy-fragment id=\"{}\"></viewproxy-fragment>", id);
    if let Some(replaced) = replace_first(&body, paired.as_bytes(), content) {
        return replaced;
    }

    for self_closing in [
        format!("<viewproxy-fragment id=\"{}\" />", id),
        format!("<viewproxy-fragment id=\"{}\"/>", id),
    ] {
        if let Some(replaced) = replace_first(&body, self_closing.as_bytes(), content) {
            return replaced;
        }
    }

    tracing::debug!(id, "Fragment marker not found in parent body");
    body
}

/// Replace the first occurrence of `needle`, or `None` if absent.
pub fn replace_first(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Option<Vec<u8>> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    let position = haystack
        .windows(needle.len())
        .position(|window| window == needle)?;

    let mut out = Vec::with_capacity(haystack.len() - needle.len() + replacement.len());
    out.extend_from_slice(&haystack[..position]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&haystack[position + needle.len()..]);
    Some(out)
}
