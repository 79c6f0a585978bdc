//! Route configuration import.
//!
//! # Responsibilities
//! - Deserialize route definitions from JSON
//! - Convert entries into validated `Route`s on a `RouteTable`
//! - Load from a file on disk or from a signed HTTP endpoint
//!
//! # Format
//! ```text
//! [
//!   { "url": "/hello/:name",
//!     "root": { "path": "/layout/:name", "children": { "body": { "path": "/body/:name" } } },
//!     "metadata": { "controller": "hello" } },
//!   { "url": "/legacy",
//!     "layout": { "path": "/layouts/main" },
//!     "fragments": [ { "path": "/header" }, { "path": "/footer" } ] }
//! ]
//! ```
//!
//! # Design Decisions
//! - A `layout` with a `fragments` list is the concatenating layout; the
//!   fragments become children keyed by zero-padded position
//! - Import stops at the first invalid route

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use super::route::{Route, RouteValidationError};
use super::router::RouteTable;
use crate::fragment::{FragmentDefinition, Layout};
use crate::multiplexer::requestable::decode_path;
use crate::security::signing::{self, SigningError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read route config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse route config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("route {0} defines neither a root nor a layout fragment")]
    MissingRoot(String),

    #[error(transparent)]
    Validation(#[from] RouteValidationError),

    #[error("invalid route config url: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not fetch route config: {0}")]
    Http(#[from] reqwest::Error),

    #[error("route config endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FragmentEntry {
    pub path: String,
    pub metadata: HashMap<String, String>,
    pub timing_label: Option<String>,
    pub ignore_validation: bool,
    pub children: BTreeMap<String, FragmentEntry>,
}

impl FragmentEntry {
    pub fn into_definition(self) -> FragmentDefinition {
        let mut definition = FragmentDefinition::define(self.path).with_metadata(self.metadata);

        if let Some(label) = self.timing_label.filter(|label| !label.is_empty()) {
            definition = definition.with_timing_label(label);
        }
        if self.ignore_validation {
            definition = definition.without_validation();
        }

        definition.with_children(
            self.children
                .into_iter()
                .map(|(name, child)| (name, child.into_definition())),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteEntry {
    pub url: String,
    #[serde(default)]
    pub root: Option<FragmentEntry>,
    #[serde(default)]
    pub layout: Option<FragmentEntry>,
    #[serde(default)]
    pub fragments: Vec<FragmentEntry>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RouteEntry {
    pub fn into_route(self) -> Result<Route, ImportError> {
        let (root, layout) = match (self.root, self.layout) {
            (Some(root), _) => (root.into_definition(), Layout::Tree),
            (None, Some(layout)) => {
                let children = self
                    .fragments
                    .into_iter()
                    .enumerate()
                    .map(|(index, fragment)| (format!("{:04}", index), fragment.into_definition()));
                (layout.into_definition().with_children(children), Layout::Concatenate)
            }
            (None, None) => return Err(ImportError::MissingRoot(self.url)),
        };

        Ok(Route::new(self.url, root)
            .with_metadata(self.metadata)
            .with_layout(layout))
    }
}

pub fn parse_routes(json: &[u8]) -> Result<Vec<RouteEntry>, ImportError> {
    Ok(serde_json::from_slice(json)?)
}

/// Register every route in a JSON document. Returns the number registered.
pub fn load_json(table: &mut RouteTable, json: &[u8]) -> Result<usize, ImportError> {
    let entries = parse_routes(json)?;
    let count = entries.len();

    for entry in entries {
        table.register(entry.into_route()?)?;
    }

    Ok(count)
}

pub fn load_json_file(table: &mut RouteTable, path: &Path) -> Result<usize, ImportError> {
    let json = std::fs::read(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let count = load_json(table, &json)?;
    tracing::info!(path = %path.display(), routes = count, "Loaded routes from file");
    Ok(count)
}

/// Fetch the route document from `path` on the target server.
pub async fn load_http(
    table: &mut RouteTable,
    client: &reqwest::Client,
    target: &Url,
    path: &str,
    hmac_secret: Option<&str>,
) -> Result<usize, ImportError> {
    let mut url = target.join("/")?;
    url.set_path(path);

    let mut headers = HeaderMap::new();
    if let Some(secret) = hmac_secret.filter(|s| !s.is_empty()) {
        let decoded = decode_path(url.path()).unwrap_or_else(|| url.path().to_string());
        signing::sign_headers(&mut headers, secret, &decoded)?;
    }

    let response = client.get(url.clone()).headers(headers).send().await?;
    if !response.status().is_success() {
        return Err(ImportError::Status(response.status()));
    }

    let json = response.bytes().await?;
    let count = load_json(table, &json)?;
    tracing::info!(url = %url, routes = count, "Loaded routes from target");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTES: &str = r#"[
        {
            "url": "/hello/:name",
            "root": {
                "path": "/layouts/test_layout",
                "ignoreValidation": true,
                "timingLabel": "layout",
                "children": {
                    "header": { "path": "/header/:name", "metadata": { "foo": "bar" } },
                    "body": { "path": "/body/:name", "timingLabel": "body" }
                }
            },
            "metadata": { "controller": "hello" }
        },
        {
            "url": "/legacy/:name",
            "layout": { "path": "/layouts/test_layout", "ignoreValidation": true },
            "fragments": [
                { "path": "/header/:name" },
                { "path": "/body/:name" }
            ]
        }
    ]"#;

    #[test]
    fn test_load_json() {
        let mut table = RouteTable::new();
        let count = load_json(&mut table, ROUTES.as_bytes()).unwrap();

        assert_eq!(count, 2);
        let route = &table.routes()[0];
        assert_eq!(route.path(), "/hello/:name");
        assert_eq!(route.layout(), Layout::Tree);
        assert_eq!(route.metadata().get("controller").map(String::as_str), Some("hello"));
        assert_eq!(route.fragment_order(), &["root", "root.body", "root.header"]);
        assert_eq!(route.root().timing_label(), Some("layout"));

        let header = route.root().child("header").unwrap();
        assert_eq!(header.metadata().get("foo").map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_legacy_layout() {
        let mut table = RouteTable::new();
        load_json(&mut table, ROUTES.as_bytes()).unwrap();

        let route = &table.routes()[1];
        assert_eq!(route.layout(), Layout::Concatenate);
        assert_eq!(route.fragment_order(), &["root", "root.0000", "root.0001"]);
        assert_eq!(route.root().child("0001").unwrap().path(), "/body/:name");
    }

    #[test]
    fn test_invalid_route_is_rejected() {
        let json = r#"[{ "url": "/hello/:name", "root": { "path": "/layout" } }]"#;
        let err = load_json(&mut RouteTable::new(), json.as_bytes()).unwrap_err();

        assert_eq!(
            err.to_string(),
            "dynamic route /hello/:name has mismatched fragment route /layout"
        );
    }

    #[test]
    fn test_missing_root() {
        let json = r#"[{ "url": "/nothing" }]"#;
        let err = load_json(&mut RouteTable::new(), json.as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::MissingRoot(ref url) if url == "/nothing"));
    }

    #[test]
    fn test_malformed_json() {
        let err = load_json(&mut RouteTable::new(), b"{not json").unwrap_err();
        assert!(matches!(err, ImportError::Json(_)));
    }
}
