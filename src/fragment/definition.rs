//! Fragment definitions: templated upstream paths arranged in a tree.
//!
//! # Responsibilities
//! - Parse a path template into static and `:name` dynamic parts
//! - Hold named children, metadata and an optional timing label
//! - Build a concrete `Requestable` from route parameters and a query
//!
//! # Design Decisions
//! - Children are stored in a sorted map so key order is deterministic
//! - Definitions are immutable once built and shared via `Arc`
//! - Parameter values are inserted as given; `%2f` stays escaped in the URL

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::multiplexer::requestable::{decode_path, Requestable};

/// Route parameters keyed by name without the leading colon.
pub type PathParams = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("no parameter was provided for {parameter} in fragment {path}")]
    MissingParameter { parameter: String, path: String },

    #[error("fragment path {path} contains a malformed percent escape")]
    InvalidEncoding { path: String },
}

#[derive(Debug, Clone, Default)]
pub struct FragmentDefinition {
    path: String,
    parts: Vec<String>,
    dynamic_parts: Vec<String>,
    children: BTreeMap<String, Arc<FragmentDefinition>>,
    metadata: HashMap<String, String>,
    timing_label: Option<String>,
    ignore_validation: bool,
}

impl FragmentDefinition {
    /// Define a fragment for a path template such as `/body/:name`.
    pub fn define(path: impl Into<String>) -> Self {
        let path = path.into();
        let trimmed = path.strip_prefix('/').unwrap_or(&path);
        let parts: Vec<String> = trimmed.split('/').map(str::to_owned).collect();
        let dynamic_parts = parts
            .iter()
            .filter(|part| part.starts_with(':'))
            .cloned()
            .collect();

        Self {
            path,
            parts,
            dynamic_parts,
            ..Self::default()
        }
    }

    pub fn with_child(mut self, name: impl Into<String>, child: FragmentDefinition) -> Self {
        self.children.insert(name.into(), Arc::new(child));
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = (S, FragmentDefinition)>,
        S: Into<String>,
    {
        for (name, child) in children {
            self.children.insert(name.into(), Arc::new(child));
        }
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timing_label(mut self, label: impl Into<String>) -> Self {
        self.timing_label = Some(label.into());
        self
    }

    /// Exclude this fragment from route parameter validation.
    pub fn without_validation(mut self) -> Self {
        self.ignore_validation = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Dynamic parts, colon included (e.g. `:name`).
    pub fn dynamic_parts(&self) -> &[String] {
        &self.dynamic_parts
    }

    pub fn children(&self) -> &BTreeMap<String, Arc<FragmentDefinition>> {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Arc<FragmentDefinition>> {
        self.children.get(name)
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn timing_label(&self) -> Option<&str> {
        self.timing_label.as_deref()
    }

    pub fn ignores_validation(&self) -> bool {
        self.ignore_validation
    }

    /// The path with placeholders left in place, normalized to start with `/`.
    pub fn template_path(&self) -> String {
        format!("/{}", self.parts.join("/"))
    }

    /// Build a concrete request for this fragment.
    ///
    /// Parameters are looked up by bare name first, then by `:name`.
    pub fn requestable(
        &self,
        base: &Url,
        params: &PathParams,
        query: &[(String, String)],
    ) -> Result<Requestable, FragmentError> {
        let mut path = String::with_capacity(self.path.len() + 16);

        for part in &self.parts {
            path.push('/');
            match part.strip_prefix(':') {
                Some(name) => {
                    let value = params
                        .get(name)
                        .or_else(|| params.get(part.as_str()))
                        .ok_or_else(|| FragmentError::MissingParameter {
                            parameter: part.clone(),
                            path: self.path.clone(),
                        })?;
                    path.push_str(value);
                }
                None => path.push_str(part),
            }
        }

        let url = join_url(base, &path, query);
        let template_url = join_url(base, &self.template_path(), query);
        let decoded_path = decode_path(url.path()).ok_or_else(|| FragmentError::InvalidEncoding {
            path: url.path().to_string(),
        })?;

        Ok(Requestable::from_parts(url, decoded_path, template_url.to_string())
            .with_metadata(self.metadata.clone())
            .with_timing_label(self.timing_label.clone()))
    }
}

/// Append `path` to the base URL's path and replace its query.
fn join_url(base: &Url, path: &str, query: &[(String, String)]) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{}{}", prefix, path));
    url.set_fragment(None);

    if query.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(query);
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> PathParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_dynamic_parts() {
        let fragment = FragmentDefinition::define("/hello/:name/:id");
        assert_eq!(fragment.dynamic_parts(), &[":name".to_string(), ":id".to_string()]);
        assert_eq!(fragment.template_path(), "/hello/:name/:id");
    }

    #[test]
    fn test_requestable_substitutes_params() {
        let base = Url::parse("http://localhost:9999").unwrap();
        let fragment = FragmentDefinition::define("/hello/:name");

        let requestable = fragment.requestable(&base, &params(&[("name", "world")]), &[]).unwrap();

        assert_eq!(requestable.url().as_str(), "http://localhost:9999/hello/world");
        assert_eq!(requestable.template_url(), "http://localhost:9999/hello/:name");
    }

    #[test]
    fn test_requestable_accepts_colon_keys() {
        let base = Url::parse("http://localhost:9999").unwrap();
        let fragment = FragmentDefinition::define("/hello/:name");

        let requestable = fragment.requestable(&base, &params(&[(":name", "world")]), &[]).unwrap();
        assert_eq!(requestable.url().path(), "/hello/world");
    }

    #[test]
    fn test_requestable_keeps_escaped_slash() {
        let base = Url::parse("http://fake.net").unwrap();
        let fragment = FragmentDefinition::define("/hello/:name");

        let requestable = fragment
            .requestable(&base, &params(&[("name", "mulder%2fscully")]), &[])
            .unwrap();

        assert_eq!(requestable.url().path(), "/hello/mulder%2fscully");
        assert_eq!(requestable.decoded_path(), "/hello/mulder/scully");
    }

    #[test]
    fn test_requestable_accepts_non_utf8_escape() {
        let base = Url::parse("http://fake.net").unwrap();
        let fragment = FragmentDefinition::define("/hello/:name");

        let requestable = fragment
            .requestable(&base, &params(&[("name", "caf%e9")]), &[])
            .unwrap();

        assert_eq!(requestable.url().path(), "/hello/caf%e9");
        assert_eq!(requestable.decoded_path(), "/hello/caf\u{FFFD}");
    }

    #[test]
    fn test_requestable_rejects_malformed_escape() {
        let base = Url::parse("http://fake.net").unwrap();
        let err = FragmentDefinition::define("/hello/:name")
            .requestable(&base, &params(&[("name", "bad%zz")]), &[])
            .unwrap_err();

        assert!(matches!(err, FragmentError::InvalidEncoding { ref path } if path == "/hello/bad%zz"));
    }

    #[test]
    fn test_requestable_keeps_base_path_and_sets_query() {
        let base = Url::parse("http://fake.net/_view_fragments/").unwrap();
        let fragment = FragmentDefinition::define("/layouts/test_layout");
        let query = vec![("important".to_string(), "true".to_string())];

        let requestable = fragment.requestable(&base, &PathParams::new(), &query).unwrap();

        assert_eq!(
            requestable.url().as_str(),
            "http://fake.net/_view_fragments/layouts/test_layout?important=true"
        );
    }

    #[test]
    fn test_requestable_missing_parameter() {
        let base = Url::parse("http://fake.net").unwrap();
        let err = FragmentDefinition::define("/hello/:name")
            .requestable(&base, &PathParams::new(), &[])
            .unwrap_err();

        assert!(matches!(err, FragmentError::MissingParameter { ref parameter, .. } if parameter == ":name"));
    }

    #[test]
    fn test_requestable_carries_label_and_metadata() {
        let base = Url::parse("http://fake.net").unwrap();
        let metadata: HashMap<String, String> = [("foo".to_string(), "bar".to_string())].into();
        let fragment = FragmentDefinition::define("/footer")
            .with_metadata(metadata)
            .with_timing_label("footer");

        let requestable = fragment.requestable(&base, &PathParams::new(), &[]).unwrap();

        assert_eq!(requestable.timing_label(), Some("footer"));
        assert_eq!(requestable.metadata().get("foo").map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_path_without_leading_slash() {
        let base = Url::parse("http://fake.net").unwrap();
        let requestable = FragmentDefinition::define("layout")
            .requestable(&base, &PathParams::new(), &[])
            .unwrap();
        assert_eq!(requestable.url().path(), "/layout");
    }
}
