use crate::extractor::is_valid_path;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Returns false for origins that must never be used as a grouping key.
pub fn is_valid_origin(origin: &str) -> bool {
    !origin.is_empty() && origin != "undefined"
}

/// Discovered routes grouped by origin. Deserialized input goes through
/// [`RouteSet::merge`], so invalid origins and routes never get in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteSet {
    by_origin: BTreeMap<String, BTreeSet<String>>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges routes for one origin and returns how many were new.
    /// Invalid origins and invalid routes are dropped.
    pub fn merge<I, S>(&mut self, origin: &str, routes: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !is_valid_origin(origin) {
            return 0;
        }
        let mut valid = routes
            .into_iter()
            .filter(|r| is_valid_path(r.as_ref()))
            .peekable();
        if valid.peek().is_none() {
            return 0;
        }

        let entry = self.by_origin.entry(origin.to_string()).or_default();
        valid
            .filter(|route| entry.insert(route.as_ref().to_string()))
            .count()
    }

    /// Merges a `{origin: routes}` completion payload.
    pub fn merge_all(&mut self, routes_by_origin: &BTreeMap<String, Vec<String>>) -> usize {
        routes_by_origin
            .iter()
            .map(|(origin, routes)| self.merge(origin, routes))
            .sum()
    }

    pub fn routes(&self, origin: &str) -> Option<&BTreeSet<String>> {
        self.by_origin.get(origin)
    }

    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.by_origin.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.by_origin.iter().map(|(o, r)| (o.as_str(), r))
    }

    /// Total number of routes across all origins.
    pub fn len(&self) -> usize {
        self.by_origin.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.by_origin.clear();
    }

    /// Keeps only the given origin.
    pub fn retain_origin(&mut self, origin: &str) {
        self.by_origin.retain(|o, _| o == origin);
    }

    /// Keeps routes containing `needle`, ignoring case. Origins left without
    /// routes are removed.
    pub fn retain_matching(&mut self, needle: &str) {
        let needle = needle.to_lowercase();
        self.by_origin.retain(|_, routes| {
            routes.retain(|route| route.to_lowercase().contains(&needle));
            !routes.is_empty()
        });
    }
}

impl<'de> Deserialize<'de> for RouteSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        let mut set = RouteSet::new();
        set.merge_all(&payload);
        Ok(set)
    }
}
