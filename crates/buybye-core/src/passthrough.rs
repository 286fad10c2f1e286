//! Route table for the HTTP boundary.
//!
//! Every concept operation is addressable at `{base}/{Concept}/{op}`. A
//! route on the inclusion list calls the operation directly; a route on the
//! exclusion list (or unlisted, by default) is reified as a
//! `Requesting.request` occurrence and answered by rules.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::concept::{ActionRef, ConceptRegistry};
use crate::config::PassthroughConfig;
use crate::requesting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Included,
    Excluded,
    Unlisted,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKind::Included => write!(f, "included"),
            RouteKind::Excluded => write!(f, "excluded"),
            RouteKind::Unlisted => write!(f, "unlisted"),
        }
    }
}

/// How one inbound call is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Invoke the operation directly, bypassing rules.
    Direct(ActionRef),
    /// Seed `Requesting.request` with this path (base url stripped).
    Request { path: String },
}

/// One row of [`PassthroughTable::entries`].
#[derive(Debug, Clone, Serialize)]
pub struct RouteEntry {
    pub route: String,
    pub action: ActionRef,
    pub kind: RouteKind,
    pub direct: bool,
    pub justification: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PassthroughTable {
    base_url: String,
    inclusions: BTreeMap<String, String>,
    exclusions: BTreeSet<String>,
    allow_unverified: bool,
}

impl PassthroughTable {
    pub fn new(base_url: &str) -> Self {
        let trimmed = base_url.trim_end_matches('/');
        Self {
            base_url: trimmed.to_string(),
            inclusions: BTreeMap::new(),
            exclusions: BTreeSet::new(),
            allow_unverified: false,
        }
    }

    pub fn include(mut self, route: &str, justification: &str) -> Self {
        self.inclusions
            .insert(route.to_string(), justification.to_string());
        self
    }

    pub fn exclude(mut self, route: &str) -> Self {
        self.exclusions.insert(route.to_string());
        self
    }

    pub fn allow_unverified(mut self, allow: bool) -> Self {
        self.allow_unverified = allow;
        self
    }

    /// Layer the configured additions and the unverified switch on top.
    pub fn with_config(mut self, cfg: &PassthroughConfig) -> Self {
        for (route, why) in &cfg.inclusions {
            self.inclusions.insert(route.clone(), why.clone());
        }
        self.exclusions.extend(cfg.exclusions.iter().cloned());
        self.allow_unverified = cfg.allow_unverified;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full route for an operation, e.g. `/api/UserAuth/login`.
    pub fn route_for(&self, action: &ActionRef) -> String {
        format!("{}/{}/{}", self.base_url, action.concept, action.name)
    }

    /// Exclusion wins when a route is on both lists.
    pub fn classify(&self, route: &str) -> RouteKind {
        if self.exclusions.contains(route) {
            RouteKind::Excluded
        } else if self.inclusions.contains_key(route) {
            RouteKind::Included
        } else {
            RouteKind::Unlisted
        }
    }

    /// Decide how to serve `route`. `None` when it is not under the base url.
    pub fn resolve(&self, route: &str) -> Option<Route> {
        let path = self.strip_base(route)?;
        let as_request = Route::Request {
            path: path.to_string(),
        };

        let Some(action) = operation_of(path) else {
            return Some(as_request);
        };
        if action.concept == requesting::NAME {
            return Some(as_request);
        }

        match self.classify(route) {
            RouteKind::Included => Some(Route::Direct(action)),
            RouteKind::Excluded => Some(as_request),
            RouteKind::Unlisted if self.allow_unverified => {
                tracing::warn!(route, "serving unlisted route directly");
                Some(Route::Direct(action))
            }
            RouteKind::Unlisted => Some(as_request),
        }
    }

    /// Every registered operation with how it would be served.
    pub fn entries(&self, registry: &ConceptRegistry) -> Vec<RouteEntry> {
        registry
            .signatures()
            .into_iter()
            .filter(|sig| sig.action.concept != requesting::NAME)
            .map(|sig| {
                let route = self.route_for(&sig.action);
                let kind = self.classify(&route);
                RouteEntry {
                    direct: kind == RouteKind::Included
                        || (kind == RouteKind::Unlisted && self.allow_unverified),
                    justification: self.inclusions.get(&route).cloned(),
                    action: sig.action.clone(),
                    kind,
                    route,
                }
            })
            .collect()
    }

    fn strip_base<'a>(&self, route: &'a str) -> Option<&'a str> {
        let rest = route.strip_prefix(self.base_url.as_str())?;
        rest.starts_with('/').then_some(rest)
    }
}

/// `/Concept/op` → `Concept.op`; anything else is not an operation path.
fn operation_of(path: &str) -> Option<ActionRef> {
    let mut parts = path.trim_start_matches('/').split('/');
    let concept = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some(ActionRef::new(concept, name))
}
