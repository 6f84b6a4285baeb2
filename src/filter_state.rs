//! URL query string <-> listing state codec.
//!
//! The URL is the single source of truth for the listing page. Every
//! mutation produces a new [`QueryString`], and the [`ListingState`] is
//! decoded back from it, so `decode(encode(state))` must be stable.

use catalog_types::facet::FilterOptions;
use derive_more::Display;
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use url::form_urlencoded;

pub const TAXONOMY_KEY: &str = "taxonomy";
pub const TERM_KEY: &str = "term";
pub const TERM_NAME_KEY: &str = "termName";
pub const LABEL_KEY: &str = "label";
pub const PAGE_KEY: &str = "page";
pub const SORT_KEY: &str = "sort";
pub const ORDER_KEY: &str = "order";

pub const RESERVED_KEYS: [&str; 7] = [
    TAXONOMY_KEY,
    TERM_KEY,
    TERM_NAME_KEY,
    LABEL_KEY,
    PAGE_KEY,
    SORT_KEY,
    ORDER_KEY,
];

pub const SEARCH_KEY: &str = "search";
pub const MIN_PRICE_KEY: &str = "min_price";
pub const MAX_PRICE_KEY: &str = "max_price";

/// Free-text keys: never split on commas.
pub const SCALAR_KEYS: [&str; 3] = [SEARCH_KEY, MIN_PRICE_KEY, MAX_PRICE_KEY];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

pub fn is_scalar(key: &str) -> bool {
    SCALAR_KEYS.contains(&key)
}

/// Ordered list of decoded query pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString(Vec<(String, String)>);

impl QueryString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `a=1&b=2`, `?a=1`, `/products?a=1` or an absolute URL.
    pub fn parse(input: &str) -> Self {
        let input = input.split('#').next().unwrap_or_default();
        let query = match input.split_once('?') {
            Some((_, query)) => query,
            None if input.contains('=') => input,
            None => "",
        };
        Self(
            form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// First value for `key`; later duplicates are ignored.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn push<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.push((key.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0
    }
}

impl std::fmt::Display for QueryString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish();
        f.write_str(&encoded)
    }
}

impl FromIterator<(String, String)> for QueryString {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A filter value: free text or a set of slugs.
///
/// Never empty; constructors return `None` instead. Equality is set
/// equality, so `Single("a") == Multi({"a"})`.
#[derive(Debug, Clone)]
pub enum FilterValue {
    Single(String),
    Multi(BTreeSet<String>),
}

impl FilterValue {
    pub fn single<S: AsRef<str>>(value: S) -> Option<Self> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            None
        } else {
            Some(Self::Single(value.to_string()))
        }
    }

    pub fn multi<I, S>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if set.is_empty() {
            None
        } else {
            Some(Self::Multi(set))
        }
    }

    /// Comma-containing values become sets, anything else stays scalar.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.contains(',') {
            Self::multi(raw.split(','))
        } else {
            Self::single(raw)
        }
    }

    /// Facet form of this value: every comma starts a new slug.
    pub fn split_commas(self) -> Option<Self> {
        match self {
            Self::Single(v) if !v.contains(',') => Some(Self::Single(v)),
            value => Self::multi(value.values().into_iter().flat_map(|v| v.split(','))),
        }
    }

    pub fn values(&self) -> BTreeSet<&str> {
        match self {
            Self::Single(v) => BTreeSet::from([v.as_str()]),
            Self::Multi(set) => set.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(v) => v == value,
            Self::Multi(set) => set.contains(value),
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multi(set) if set.len() == 1 => set.iter().next().map(String::as_str),
            Self::Multi(_) => None,
        }
    }

    pub fn to_param(&self) -> String {
        match self {
            Self::Single(v) => v.clone(),
            Self::Multi(set) => set.iter().join(","),
        }
    }
}

impl PartialEq for FilterValue {
    fn eq(&self, other: &Self) -> bool {
        self.values() == other.values()
    }
}

impl Eq for FilterValue {}

/// Filter key to value. A key is present only with a non-empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState(BTreeMap<String, FilterValue>);

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FilterValue::as_scalar)
    }

    /// Sets or, when `value` is `None`, removes `key`. Facet values are
    /// split on commas so they decode back to the same set.
    pub fn set<K: Into<String>>(&mut self, key: K, value: Option<FilterValue>) {
        let key = key.into();
        let value = if is_scalar(&key) {
            value
        } else {
            value.and_then(FilterValue::split_commas)
        };
        match value {
            Some(value) => {
                self.0.insert(key, value);
            }
            None => {
                self.0.remove(&key);
            }
        }
    }

    pub fn with<K: Into<String>>(mut self, key: K, value: Option<FilterValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
        self.0.remove(key)
    }

    /// Adds `slug` to a multi-select facet, or removes it if already selected.
    pub fn toggle(&mut self, key: &str, slug: &str) {
        let mut values: BTreeSet<String> = self
            .get(key)
            .map(|v| v.values().into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        if !values.remove(slug.trim()) {
            values.insert(slug.to_string());
        }
        self.set(key, FilterValue::multi(values));
    }

    /// Removes one slug from a facet, dropping the key when it empties.
    pub fn remove_value(&mut self, key: &str, slug: &str) {
        if let Some(value) = self.get(key) {
            let rest = value
                .values()
                .into_iter()
                .filter(|v| *v != slug)
                .map(str::to_string)
                .collect::<Vec<_>>();
            self.set(key, FilterValue::multi(rest));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Facet filters only: everything except the free-text keys.
    pub fn facets(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter().filter(|(k, _)| !is_scalar(k))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum OrderBy {
    #[default]
    #[display("date")]
    Date,
    #[display("price")]
    Price,
    #[display("title")]
    Title,
    #[display("popularity")]
    Popularity,
    #[display("rating")]
    Rating,
}

impl FromStr for OrderBy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "price" => Ok(Self::Price),
            "title" => Ok(Self::Title),
            "popularity" => Ok(Self::Popularity),
            "rating" => Ok(Self::Rating),
            other => Err(anyhow::anyhow!("Unknown sort field {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum SortOrder {
    #[display("asc")]
    Asc,
    #[default]
    #[display("desc")]
    Desc,
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(anyhow::anyhow!("Unknown sort order {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SortState {
    pub orderby: OrderBy,
    pub order: SortOrder,
}

impl SortState {
    pub fn new(orderby: OrderBy, order: SortOrder) -> Self {
        Self { orderby, order }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything the listing page derives from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingState {
    pub taxonomy: String,
    pub term: Option<String>,
    pub term_name: Option<String>,
    pub label: Option<String>,
    pub filters: FilterState,
    pub page: u32,
    pub sort: SortState,
}

impl ListingState {
    pub fn new<S: Into<String>>(taxonomy: S) -> Self {
        Self {
            taxonomy: taxonomy.into(),
            term: None,
            term_name: None,
            label: None,
            filters: FilterState::default(),
            page: 1,
            sort: SortState::default(),
        }
    }

    pub fn decode(params: &QueryString, default_taxonomy: &str) -> Self {
        let reserved = |key: &str| params.get(key).map(str::trim).filter(|v| !v.is_empty());

        let mut filters = FilterState::default();
        for (key, raw) in params.iter() {
            if is_reserved(key) || filters.get(key).is_some() {
                continue;
            }
            let value = if is_scalar(key) {
                FilterValue::single(raw)
            } else {
                FilterValue::parse(raw)
            };
            filters.set(key, value);
        }

        Self {
            taxonomy: reserved(TAXONOMY_KEY)
                .unwrap_or(default_taxonomy)
                .to_string(),
            term: reserved(TERM_KEY).map(str::to_string),
            term_name: reserved(TERM_NAME_KEY).map(str::to_string),
            label: reserved(LABEL_KEY).map(str::to_string),
            filters,
            page: reserved(PAGE_KEY).map(parse_page).unwrap_or(1),
            sort: SortState {
                orderby: reserved(SORT_KEY)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default(),
                order: reserved(ORDER_KEY)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default(),
            },
        }
    }

    pub fn encode(&self) -> QueryString {
        let mut params = QueryString::new();
        if !self.taxonomy.is_empty() {
            params.push(TAXONOMY_KEY, self.taxonomy.as_str());
        }
        let optional = [
            (TERM_KEY, &self.term),
            (TERM_NAME_KEY, &self.term_name),
            (LABEL_KEY, &self.label),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                params.push(key, value);
            }
        }
        for (key, value) in self.filters.iter() {
            if is_reserved(key) {
                continue;
            }
            let value = value.to_param();
            if !value.is_empty() {
                params.push(key.as_str(), value);
            }
        }
        if !self.sort.is_default() {
            params.push(SORT_KEY, self.sort.orderby.to_string());
            params.push(ORDER_KEY, self.sort.order.to_string());
        }
        if self.page > 1 {
            params.push(PAGE_KEY, self.page.to_string());
        }
        params
    }

    pub fn to_url(&self, path: &str) -> String {
        let params = self.encode();
        if params.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{params}")
        }
    }

    /// New filters always land on the first page.
    pub fn with_filters(&self, filters: FilterState) -> Self {
        Self {
            filters,
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    pub fn with_sort(&self, sort: SortState) -> Self {
        Self {
            sort,
            ..self.clone()
        }
    }

    /// Facets are scoped to a taxonomy, so switching it drops them.
    pub fn with_term(
        &self,
        taxonomy: &str,
        term: Option<&str>,
        term_name: Option<&str>,
    ) -> Self {
        let taxonomy_changed = taxonomy != self.taxonomy;
        Self {
            taxonomy: taxonomy.to_string(),
            term: term.map(str::to_string),
            term_name: term_name.map(str::to_string),
            label: if taxonomy_changed { None } else { self.label.clone() },
            filters: FilterState::default(),
            page: 1,
            sort: self.sort,
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.filters.scalar(SEARCH_KEY)
    }
}

// "2.7" -> 2, junk or < 1 -> 1
fn parse_page(raw: &str) -> u32 {
    raw.parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .map(|p| p.floor().clamp(1.0, u32::MAX as f64) as u32)
        .unwrap_or(1)
}

/// A removable "chip" describing one applied filter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveFilter {
    pub key: String,
    pub value: String,
    pub label: String,
}

/// Resolves the applied filters to display labels via the fetched facet options.
pub fn active_filters(filters: &FilterState, options: &FilterOptions) -> Vec<ActiveFilter> {
    filters
        .iter()
        .flat_map(|(key, value)| {
            value
                .values()
                .into_iter()
                .map(|v| {
                    let label = match key.as_str() {
                        SEARCH_KEY => format!("Search: {v}"),
                        MIN_PRICE_KEY => format!("From {v}"),
                        MAX_PRICE_KEY => format!("Up to {v}"),
                        _ => format!("{}: {}", options.label(key), options.option_name(key, v)),
                    };
                    ActiveFilter {
                        key: key.clone(),
                        value: v.to_string(),
                        label,
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
