use crate::types::{CategoryFacets, RateLimitCategory, RateLimits};
use prometheus::{GaugeVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

pub const USER_LABEL: &str = "user";

/// Content type of [`SnapshotStore::export_text`] output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Stored facets of one account, by category.
pub type AccountSnapshot = BTreeMap<RateLimitCategory, CategoryFacets>;

struct FacetGauges {
    limit: GaugeVec,
    remaining: GaugeVec,
    used: GaugeVec,
    reset: GaugeVec,
}

impl FacetGauges {
    fn register(registry: &Registry, category: RateLimitCategory) -> prometheus::Result<Self> {
        let key = category.metric_key();
        let name = category.display_name();
        let gauge = |suffix: &str, help: String| -> prometheus::Result<GaugeVec> {
            let g = GaugeVec::new(
                Opts::new(format!("github_rate_limit_{}_{}", key, suffix), help),
                &[USER_LABEL],
            )?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };
        Ok(Self {
            limit: gauge("limit", format!("GitHub API {} rate limit", name))?,
            remaining: gauge("remaining", format!("GitHub API {} rate limit remaining", name))?,
            used: gauge("used", format!("GitHub API {} rate limit used", name))?,
            reset: gauge(
                "reset_timestamp",
                format!("GitHub API {} rate limit reset timestamp", name),
            )?,
        })
    }

    fn set(&self, account: &str, f: &CategoryFacets) {
        let labels = [account];
        self.limit.with_label_values(&labels).set(f.limit as f64);
        self.remaining.with_label_values(&labels).set(f.remaining as f64);
        self.used.with_label_values(&labels).set(f.used as f64);
        self.reset.with_label_values(&labels).set(f.reset_at as f64);
    }
}

struct Inner {
    registry: Registry,
    gauges: BTreeMap<RateLimitCategory, FacetGauges>,
    accounts: HashMap<String, AccountSnapshot>,
}

/// Per-account rate-limit gauges behind one reader/writer lock.
///
/// Writers hold the exclusive lock for a whole account update so the four
/// facets of every category change together; a scrape holds the shared lock
/// for the full export.
pub struct SnapshotStore {
    inner: RwLock<Inner>,
}

impl SnapshotStore {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let mut gauges = BTreeMap::new();
        for category in RateLimitCategory::ALL {
            gauges.insert(category, FacetGauges::register(&registry, category)?);
        }
        Ok(Self {
            inner: RwLock::new(Inner {
                registry,
                gauges,
                accounts: HashMap::new(),
            }),
        })
    }

    /// Replace the stored facets of every category present in `limits`.
    /// Categories missing from `limits` keep their previous values.
    pub fn record(&self, account: &str, limits: &RateLimits) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Inner {
            gauges, accounts, ..
        } = &mut *inner;
        for (category, facets) in limits.facets() {
            if let Some(g) = gauges.get(&category) {
                g.set(account, &facets);
            }
            accounts
                .entry(account.to_string())
                .or_default()
                .insert(category, facets);
        }
    }

    /// Stored facets for `account`, or `None` before its first successful
    /// update.
    pub fn snapshot(&self, account: &str) -> Option<AccountSnapshot> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.accounts.get(account).cloned()
    }

    pub fn facets(&self, account: &str, category: RateLimitCategory) -> Option<CategoryFacets> {
        self.snapshot(account)
            .and_then(|s| s.get(&category).copied())
    }

    /// Render every stored series in the Prometheus text exposition format.
    pub fn export_text(&self) -> prometheus::Result<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let families = inner.registry.gather();
        let mut out = String::new();
        TextEncoder::new().encode_utf8(&families, &mut out)?;
        Ok(out)
    }
}
