//! Route lookup.
//!
//! # Responsibilities
//! - Store validated routes in registration order
//! - Look up the first route matching an inbound path
//! - Optionally ignore a single trailing slash
//!
//! # Design Decisions
//! - Immutable once built; reloads swap a whole new table
//! - O(n) scan over routes (acceptable for typical route counts)
//! - First match wins
//! - Explicit `None` rather than a silent default

use std::sync::Arc;

use super::route::{Route, RouteValidationError};
use crate::fragment::PathParams;

#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    ignore_trailing_slash: bool,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_trailing_slash(mut self, ignore: bool) -> Self {
        self.ignore_trailing_slash = ignore;
        self
    }

    pub fn ignores_trailing_slash(&self) -> bool {
        self.ignore_trailing_slash
    }

    /// Validate and add a route. Invalid routes are rejected.
    pub fn register(&mut self, route: Route) -> Result<(), RouteValidationError> {
        route.validate()?;

        tracing::debug!(
            path = route.path(),
            fragments = route.fragment_order().len(),
            "Registered route"
        );
        self.routes.push(Arc::new(route));
        Ok(())
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route for a raw, still percent-escaped, request path.
    pub fn match_path(&self, path: &str) -> Option<(Arc<Route>, PathParams)> {
        let path = if self.ignore_trailing_slash && path.len() > 1 {
            path.strip_suffix('/').unwrap_or(path)
        } else {
            path
        };

        let segments: Vec<&str> = path.split('/').collect();

        self.routes
            .iter()
            .find(|route| route.match_parts(&segments))
            .map(|route| (Arc::clone(route), route.parameters_for(&segments)))
    }
}
