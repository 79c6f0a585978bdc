//! A single routable path and the fragment tree behind it.
//!
//! # Responsibilities
//! - Match inbound path segments against a `/a/:b` style template
//! - Extract route parameters
//! - Validate that every fragment uses exactly the route's parameters
//! - Precompute fragment order and stitch structure
//!
//! # Design Decisions
//! - Matching is on raw (still percent-escaped) segments, so `%2f` never splits
//! - Fragment order is the sorted list of keys; "root" always sorts first
//! - Derived data is computed once at construction, routes are immutable

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::fragment::stitch::ROOT_KEY;
use crate::fragment::{FragmentDefinition, FragmentError, Layout, PathParams, StitchStructure};
use crate::multiplexer::Requestable;

/// A fragment whose dynamic parts differ from its route's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteValidationError {
    pub route: String,
    pub fragment: String,
    pub dynamic: bool,
}

impl fmt::Display for RouteValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.dynamic { "dynamic" } else { "static" };
        write!(
            f,
            "{} route {} has mismatched fragment route {}",
            kind, self.route, self.fragment
        )
    }
}

impl std::error::Error for RouteValidationError {}

#[derive(Debug)]
pub struct Route {
    path: String,
    parts: Vec<String>,
    dynamic_parts: Vec<String>,
    root: Arc<FragmentDefinition>,
    metadata: HashMap<String, String>,
    layout: Layout,
    structure: StitchStructure,
    fragment_order: Vec<String>,
    fragments_to_request: Vec<Arc<FragmentDefinition>>,
}

impl Route {
    pub fn new(path: impl Into<String>, root: FragmentDefinition) -> Self {
        Self::with_root(path, Arc::new(root))
    }

    pub fn with_root(path: impl Into<String>, root: Arc<FragmentDefinition>) -> Self {
        let path = path.into();
        let parts: Vec<String> = path.split('/').map(str::to_owned).collect();
        let dynamic_parts = parts
            .iter()
            .filter(|part| part.starts_with(':'))
            .cloned()
            .collect();

        let (fragment_order, fragments_to_request) = mapping(&root).into_iter().unzip();

        Self {
            path,
            parts,
            dynamic_parts,
            structure: StitchStructure::for_root(&root),
            root,
            metadata: HashMap::new(),
            layout: Layout::Tree,
            fragment_order,
            fragments_to_request,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dynamic_parts(&self) -> &[String] {
        &self.dynamic_parts
    }

    pub fn root(&self) -> &Arc<FragmentDefinition> {
        &self.root
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn structure(&self) -> &StitchStructure {
        &self.structure
    }

    /// Fragment keys in request order: "root", then "root.a", "root.a.b", ...
    pub fn fragment_order(&self) -> &[String] {
        &self.fragment_order
    }

    pub fn fragments_to_request(&self) -> &[Arc<FragmentDefinition>] {
        &self.fragments_to_request
    }

    /// Fragment keys paired with their definitions, in fragment order.
    pub fn fragments(&self) -> impl Iterator<Item = (&str, &Arc<FragmentDefinition>)> {
        self.fragment_order
            .iter()
            .map(String::as_str)
            .zip(&self.fragments_to_request)
    }

    /// Check every fragment uses the same set of dynamic parts as the route.
    pub fn validate(&self) -> Result<(), RouteValidationError> {
        let expected: BTreeSet<&str> = self.dynamic_parts.iter().map(String::as_str).collect();

        for fragment in &self.fragments_to_request {
            if fragment.ignores_validation() {
                continue;
            }

            let actual: BTreeSet<&str> = fragment.dynamic_parts().iter().map(String::as_str).collect();
            if actual != expected {
                return Err(RouteValidationError {
                    route: self.path.clone(),
                    fragment: fragment.path().to_string(),
                    dynamic: !self.dynamic_parts.is_empty(),
                });
            }
        }

        Ok(())
    }

    /// Whether the inbound path segments match this route.
    pub fn match_parts(&self, segments: &[&str]) -> bool {
        if segments.len() != self.parts.len() {
            return false;
        }

        self.parts
            .iter()
            .zip(segments)
            .all(|(part, segment)| part.starts_with(':') || part == segment)
    }

    /// Route parameters for matched segments, keyed without the colon.
    pub fn parameters_for(&self, segments: &[&str]) -> PathParams {
        self.parts
            .iter()
            .zip(segments)
            .filter_map(|(part, segment)| {
                part.strip_prefix(':')
                    .map(|name| (name.to_string(), segment.to_string()))
            })
            .collect()
    }

    /// Concrete requests for every fragment, in fragment order.
    pub fn requestables(
        &self,
        base: &Url,
        params: &PathParams,
        query: &[(String, String)],
    ) -> Result<Vec<Requestable>, FragmentError> {
        self.fragments()
            .map(|(key, fragment)| {
                fragment
                    .requestable(base, params, query)
                    .map(|requestable| requestable.with_key(key))
            })
            .collect()
    }
}

/// Flatten a fragment tree into `(key, definition)` pairs sorted by key.
///
/// The root is keyed `root`; children append `.name` to their parent's key.
pub fn mapping(root: &Arc<FragmentDefinition>) -> Vec<(String, Arc<FragmentDefinition>)> {
    let mut out = Vec::new();
    collect_fragments(ROOT_KEY.to_string(), root, &mut out);
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn collect_fragments(
    key: String,
    definition: &Arc<FragmentDefinition>,
    out: &mut Vec<(String, Arc<FragmentDefinition>)>,
) {
    for (name, child) in definition.children() {
        collect_fragments(format!("{}.{}", key, name), child, out);
    }
    out.push((key, Arc::clone(definition)));
}
