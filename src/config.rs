use anyhow::Context;
use catalog_types::parse_duration;
use log_error::LogError;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_PER_PAGE: u32 = 12;
pub const DEFAULT_TAXONOMY: &str = "equipment-buy";
pub const DEFAULT_LISTING_PATH: &str = "/products";

/// Paths appended to [`ApiConfig::base_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub products: String,
    pub filters: String,
    pub categories: String,
    pub terms: String,
    pub posts: String,
    pub product: String,
    pub enquiry: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            products: "/products".to_string(),
            filters: "/filters".to_string(),
            categories: "/categories".to_string(),
            terms: "/terms".to_string(),
            posts: "/posts".to_string(),
            product: "/product".to_string(),
            enquiry: "/enquiry".to_string(),
        }
    }
}

impl Endpoints {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            products: envmnt::get_or("CATALOG_ENDPOINT_PRODUCTS", &d.products),
            filters: envmnt::get_or("CATALOG_ENDPOINT_FILTERS", &d.filters),
            categories: envmnt::get_or("CATALOG_ENDPOINT_CATEGORIES", &d.categories),
            terms: envmnt::get_or("CATALOG_ENDPOINT_TERMS", &d.terms),
            posts: envmnt::get_or("CATALOG_ENDPOINT_POSTS", &d.posts),
            product: envmnt::get_or("CATALOG_ENDPOINT_PRODUCT", &d.product),
            enquiry: envmnt::get_or("CATALOG_ENDPOINT_ENQUIRY", &d.enquiry),
        }
    }
}

/// Remote API settings, constructed once and passed to the client
/// and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    pub timeout: Duration,
    pub default_per_page: u32,
    pub cache_time: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/wp-json/catalog/v1".to_string(),
            endpoints: Endpoints::default(),
            timeout: DEFAULT_TIMEOUT,
            default_per_page: DEFAULT_PER_PAGE,
            cache_time: DEFAULT_CACHE_TIME,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let d = Self::default();
        let base_url = envmnt::get_or("CATALOG_API_URL", &d.base_url);
        url::Url::parse(&base_url).context(format!("Invalid CATALOG_API_URL {base_url}"))?;
        Ok(Self {
            base_url,
            endpoints: Endpoints::from_env(),
            timeout: env_duration("CATALOG_API_TIMEOUT", d.timeout),
            default_per_page: envmnt::get_parse("CATALOG_PER_PAGE")
                .ok()
                .filter(|v: &u32| *v > 0)
                .unwrap_or(d.default_per_page),
            cache_time: env_duration("CATALOG_CACHE_TIME", d.cache_time),
        })
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

/// Listing page behaviour independent of the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingConfig {
    pub default_taxonomy: String,
    pub path: String,
    pub search_debounce: Duration,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_taxonomy: DEFAULT_TAXONOMY.to_string(),
            path: DEFAULT_LISTING_PATH.to_string(),
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
        }
    }
}

impl ListingConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            default_taxonomy: envmnt::get_or("CATALOG_DEFAULT_TAXONOMY", &d.default_taxonomy),
            path: envmnt::get_or("CATALOG_LISTING_PATH", &d.path),
            search_debounce: env_duration("CATALOG_SEARCH_DEBOUNCE", d.search_debounce),
        }
    }
}

fn env_duration(key: &str, default_value: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_duration(&raw)
            .context(format!("{key} is not a duration"))
            .log_error("Falling back to default")
            .unwrap_or(default_value),
        _ => default_value,
    }
}
