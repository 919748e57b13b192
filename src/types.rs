use serde::{Deserialize, Serialize};

/// Rate-limited resource classes reported by `GET /rate_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RateLimitCategory {
    Core,
    Search,
    Graphql,
    IntegrationManifest,
}

impl RateLimitCategory {
    pub const ALL: [RateLimitCategory; 4] = [
        RateLimitCategory::Core,
        RateLimitCategory::Search,
        RateLimitCategory::Graphql,
        RateLimitCategory::IntegrationManifest,
    ];

    /// Fragment used in metric names, e.g. `integration_manifest`.
    pub fn metric_key(self) -> &'static str {
        match self {
            RateLimitCategory::Core => "core",
            RateLimitCategory::Search => "search",
            RateLimitCategory::Graphql => "graphql",
            RateLimitCategory::IntegrationManifest => "integration_manifest",
        }
    }

    /// Human name used in metric help text.
    pub fn display_name(self) -> &'static str {
        match self {
            RateLimitCategory::Core => "core",
            RateLimitCategory::Search => "search",
            RateLimitCategory::Graphql => "GraphQL",
            RateLimitCategory::IntegrationManifest => "integration manifest",
        }
    }
}

/// One category entry of the GitHub response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateWindow {
    pub limit: i64,
    pub remaining: i64,
    /// Epoch seconds of the next reset.
    pub reset: i64,
}

/// Body of `GET /rate_limit`. Only the categories we export are kept;
/// anything else GitHub adds is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimits {
    #[serde(default)]
    pub resources: Resources,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resources {
    pub core: Option<RateWindow>,
    pub search: Option<RateWindow>,
    pub graphql: Option<RateWindow>,
    pub integration_manifest: Option<RateWindow>,
}

impl RateLimits {
    pub fn get(&self, category: RateLimitCategory) -> Option<&RateWindow> {
        let r = &self.resources;
        match category {
            RateLimitCategory::Core => r.core.as_ref(),
            RateLimitCategory::Search => r.search.as_ref(),
            RateLimitCategory::Graphql => r.graphql.as_ref(),
            RateLimitCategory::IntegrationManifest => r.integration_manifest.as_ref(),
        }
    }

    pub fn set(&mut self, category: RateLimitCategory, window: RateWindow) {
        let r = &mut self.resources;
        let slot = match category {
            RateLimitCategory::Core => &mut r.core,
            RateLimitCategory::Search => &mut r.search,
            RateLimitCategory::Graphql => &mut r.graphql,
            RateLimitCategory::IntegrationManifest => &mut r.integration_manifest,
        };
        *slot = Some(window);
    }

    /// Categories present in the response, paired with their derived facets.
    pub fn facets(&self) -> impl Iterator<Item = (RateLimitCategory, CategoryFacets)> + '_ {
        RateLimitCategory::ALL
            .into_iter()
            .filter_map(|c| self.get(c).map(|w| (c, CategoryFacets::from(*w))))
    }
}

/// The four exported measurements of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryFacets {
    pub limit: i64,
    pub remaining: i64,
    pub used: i64,
    pub reset_at: i64,
}

impl From<RateWindow> for CategoryFacets {
    fn from(w: RateWindow) -> Self {
        Self {
            limit: w.limit,
            remaining: w.remaining,
            used: w.limit.saturating_sub(w.remaining),
            reset_at: w.reset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_github_payload() {
        let body = serde_json::json!({
            "resources": {
                "core": {"limit": 5000, "used": 10, "remaining": 4990, "reset": 1700000000},
                "search": {"limit": 30, "used": 0, "remaining": 30, "reset": 1700000060},
                "graphql": {"limit": 5000, "used": 7, "remaining": 4993, "reset": 1700000120},
                "code_scanning_upload": {"limit": 1000, "used": 0, "remaining": 1000, "reset": 1}
            },
            "rate": {"limit": 5000, "used": 10, "remaining": 4990, "reset": 1700000000}
        });
        let limits: RateLimits = serde_json::from_value(body).unwrap();
        assert_eq!(limits.get(RateLimitCategory::Core).unwrap().remaining, 4990);
        assert!(limits.get(RateLimitCategory::IntegrationManifest).is_none());
        let cats: Vec<_> = limits.facets().map(|(c, _)| c).collect();
        assert_eq!(
            cats,
            vec![
                RateLimitCategory::Core,
                RateLimitCategory::Search,
                RateLimitCategory::Graphql
            ]
        );
    }

    #[test]
    fn used_is_derived() {
        let f = CategoryFacets::from(RateWindow {
            limit: 5000,
            remaining: 4990,
            reset: 1700000000,
        });
        assert_eq!(f.used, 10);
        assert_eq!(f.reset_at, 1700000000);
    }

    #[test]
    fn used_saturates_on_extreme_values() {
        let f = CategoryFacets::from(RateWindow {
            limit: i64::MIN,
            remaining: 1,
            reset: 0,
        });
        assert_eq!(f.used, i64::MIN);
        let f = CategoryFacets::from(RateWindow {
            limit: i64::MAX,
            remaining: -1,
            reset: 0,
        });
        assert_eq!(f.used, i64::MAX);
    }
}
