// services/payments-dash/src/location.rs
//
// Addressable location: the shareable descriptor carrying the dashboard filters

use reqwest::Url;
use svckit::{DashError, Result, StatusFilter};
use tracing::warn;

pub const SEARCH_PARAM: &str = "search";
pub const STATUS_PARAM: &str = "status";

/// Base every descriptor is resolved against. Bare query strings are accepted too.
pub const LOCATION_BASE: &str = "payments-dash://orders";

/// Key-value store of the two filter parameters, backed by a URL.
///
/// Parameters equal to their default are dropped from the descriptor, so an
/// untouched dashboard serializes to the bare base location.
#[derive(Debug, Clone)]
pub struct FilterLocation {
    url: Url,
    revision: u64,
}

impl FilterLocation {
    /// Location with every filter at its default.
    pub fn empty() -> Result<Self> {
        Self::parse("")
    }

    /// Parse `payments-dash://orders?search=..`, `?search=..` or `search=..`.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let descriptor = descriptor.trim();
        let raw = if descriptor.contains("://") {
            descriptor.to_string()
        } else {
            let query = descriptor.trim_start_matches('?');
            if query.is_empty() {
                LOCATION_BASE.to_string()
            } else {
                format!("{}?{}", LOCATION_BASE, query)
            }
        };

        let url = Url::parse(&raw)
            .map_err(|e| DashError::InvalidLocation(format!("{}: {}", descriptor, e)))?;

        let mut location = Self { url, revision: 0 };
        location.normalize();
        Ok(location)
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Set or remove a parameter. Returns whether the location changed.
    pub fn set(&mut self, name: &str, value: Option<&str>) -> bool {
        let value = value.filter(|v| !v.is_empty());
        if self.get(name).as_deref() == value {
            return false;
        }

        let mut pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != name)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if let Some(value) = value {
            pairs.push((name.to_string(), value.to_string()));
        }
        self.write_pairs(pairs);
        self.revision += 1;
        true
    }

    pub fn search(&self) -> String {
        self.get(SEARCH_PARAM).unwrap_or_default()
    }

    pub fn status(&self) -> StatusFilter {
        self.get(STATUS_PARAM)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    /// Empty search clears the parameter.
    pub fn set_search(&mut self, search: &str) -> bool {
        self.set(SEARCH_PARAM, Some(search))
    }

    pub fn set_status(&mut self, status: StatusFilter) -> bool {
        match status {
            StatusFilter::All => self.set(STATUS_PARAM, None),
            other => self.set(STATUS_PARAM, Some(other.as_str())),
        }
    }

    /// Bumped on every effective change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn query_string(&self) -> String {
        self.url.query().unwrap_or_default().to_string()
    }

    pub fn descriptor(&self) -> &str {
        self.url.as_str()
    }

    // Keep only known parameters at non-default values, in a stable order.
    fn normalize(&mut self) {
        let mut search = None;
        let mut status = None;
        for (key, value) in self.url.query_pairs() {
            match key.as_ref() {
                SEARCH_PARAM if !value.is_empty() => search = Some(value.into_owned()),
                STATUS_PARAM => match value.parse::<StatusFilter>() {
                    Ok(StatusFilter::All) => status = None,
                    Ok(filter) => status = Some(filter.as_str().to_string()),
                    Err(e) => {
                        warn!("Ignoring status in location, falling back to all: {}", e);
                        status = None;
                    }
                },
                _ => {}
            }
        }

        let mut pairs = Vec::new();
        if let Some(search) = search {
            pairs.push((SEARCH_PARAM.to_string(), search));
        }
        if let Some(status) = status {
            pairs.push((STATUS_PARAM.to_string(), status));
        }
        self.write_pairs(pairs);
    }

    fn write_pairs(&mut self, mut pairs: Vec<(String, String)>) {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        if pairs.is_empty() {
            self.url.set_query(None);
        } else {
            self.url.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }
}

impl PartialEq for FilterLocation {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}
