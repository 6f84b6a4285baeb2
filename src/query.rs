use crate::filter_state::{
    FilterState, FilterValue, ListingState, OrderBy, SortOrder, MAX_PRICE_KEY, MIN_PRICE_KEY,
    SEARCH_KEY,
};
use derive_more::{Display, Error};
use std::collections::BTreeMap;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[display("Taxonomy is required")]
    MissingTaxonomy,
}

/// Input to [`build_query`]. `search` is passed separately so the
/// orchestrator can substitute its debounced value.
#[derive(Debug, Clone)]
pub struct QueryInput<'a> {
    pub taxonomy: Option<&'a str>,
    pub term: Option<&'a str>,
    pub filters: &'a FilterState,
    pub page: u32,
    pub per_page: u32,
    pub orderby: OrderBy,
    pub order: SortOrder,
    pub search: Option<&'a str>,
}

impl<'a> QueryInput<'a> {
    pub fn from_state(state: &'a ListingState, per_page: u32) -> Self {
        Self {
            taxonomy: Some(state.taxonomy.as_str()),
            term: state.term.as_deref(),
            filters: &state.filters,
            page: state.page,
            per_page,
            orderby: state.sort.orderby,
            order: state.sort.order,
            search: state.search(),
        }
    }

    pub fn with_search(self, search: Option<&'a str>) -> Self {
        Self { search, ..self }
    }
}

/// Normalized request for the remote listing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameters {
    pub taxonomy: String,
    pub term: Option<String>,
    pub page: u32,
    pub per_page: u32,
    pub orderby: OrderBy,
    pub order: SortOrder,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub facets: BTreeMap<String, FilterValue>,
}

impl QueryParameters {
    /// Wire form: sets are comma-joined here and nowhere earlier.
    /// Pair order is fixed, so the result doubles as a cache/request key.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("taxonomy".to_string(), self.taxonomy.clone())];
        if let Some(term) = &self.term {
            pairs.push(("term".to_string(), term.clone()));
        }
        pairs.push(("page".to_string(), self.page.to_string()));
        pairs.push(("per_page".to_string(), self.per_page.to_string()));
        pairs.push(("orderby".to_string(), self.orderby.to_string()));
        pairs.push(("order".to_string(), self.order.to_string()));
        if let Some(search) = &self.search {
            pairs.push((SEARCH_KEY.to_string(), search.clone()));
        }
        if let Some(min) = self.min_price {
            pairs.push((MIN_PRICE_KEY.to_string(), min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push((MAX_PRICE_KEY.to_string(), max.to_string()));
        }
        for (key, value) in &self.facets {
            pairs.push((key.clone(), value.to_param()));
        }
        pairs
    }

    pub fn key(&self) -> QueryKey {
        QueryKey(self.to_pairs())
    }
}

/// Identity of a product request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(pub Vec<(String, String)>);

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self
            .0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        f.write_str(&s)
    }
}

/// Free-text price to a number; only finite, non-negative values survive.
pub fn parse_price(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
}

pub fn build_query(input: QueryInput<'_>) -> Result<QueryParameters, QueryError> {
    let taxonomy = input
        .taxonomy
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(QueryError::MissingTaxonomy)?;

    let price = |key: &str| input.filters.scalar(key).and_then(parse_price);

    let facets = input
        .filters
        .facets()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(QueryParameters {
        taxonomy: taxonomy.to_string(),
        term: input
            .term
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        page: input.page.max(1),
        per_page: input.per_page.max(1),
        orderby: input.orderby,
        order: input.order,
        search: input
            .search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        min_price: price(MIN_PRICE_KEY),
        max_price: price(MAX_PRICE_KEY),
        facets,
    })
}
