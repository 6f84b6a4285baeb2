use crate::config::ListingConfig;
use crate::filter_state::{
    is_reserved, FilterValue, ListingState, QueryString, SortState, MAX_PRICE_KEY, MIN_PRICE_KEY,
    SEARCH_KEY,
};
use tokio::sync::watch;

/// Owns the listing URL and publishes every decoded change.
///
/// Mutations compute the next URL, skip the commit when it encodes to the
/// current parameters, and otherwise re-decode the state from that URL.
pub struct ListingStore {
    path: String,
    default_taxonomy: String,
    state: watch::Sender<ListingState>,
}

impl ListingStore {
    pub fn new(config: &ListingConfig, url: &str) -> Self {
        let state = ListingState::decode(&QueryString::parse(url), &config.default_taxonomy);
        let (state, _) = watch::channel(state);
        Self {
            path: config.path.clone(),
            default_taxonomy: config.default_taxonomy.clone(),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ListingState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ListingState {
        self.state.borrow().clone()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn url(&self) -> String {
        self.state.borrow().to_url(&self.path)
    }

    /// Browser navigation (back/forward, link click) to `url`.
    pub fn navigate(&self, url: &str) -> bool {
        let next = ListingState::decode(&QueryString::parse(url), &self.default_taxonomy);
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            log::debug!("Navigated to {}", next.to_url(&self.path));
            *current = next;
            true
        })
    }

    fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&ListingState) -> ListingState,
    {
        self.state.send_if_modified(|current| {
            let params = f(current).encode();
            if params == current.encode() {
                return false;
            }
            *current = ListingState::decode(&params, &self.default_taxonomy);
            log::debug!("Listing url is now {}", current.to_url(&self.path));
            true
        })
    }

    fn update_filter<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(&mut crate::filter_state::FilterState),
    {
        if is_reserved(key) {
            log::warn!("Refusing to use reserved key {key} as a filter");
            return false;
        }
        self.update(|state| {
            let mut filters = state.filters.clone();
            f(&mut filters);
            state.with_filters(filters)
        })
    }

    pub fn toggle_facet(&self, key: &str, slug: &str) -> bool {
        self.update_filter(key, |filters| filters.toggle(key, slug))
    }

    pub fn set_facet<I, S>(&self, key: &str, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let value = FilterValue::multi(values);
        self.update_filter(key, |filters| filters.set(key, value))
    }

    pub fn remove_filter_value(&self, key: &str, value: &str) -> bool {
        self.update_filter(key, |filters| filters.remove_value(key, value))
    }

    pub fn clear_filter(&self, key: &str) -> bool {
        self.update_filter(key, |filters| {
            filters.remove(key);
        })
    }

    pub fn clear_filters(&self) -> bool {
        self.update(|state| state.with_filters(Default::default()))
    }

    pub fn set_search(&self, text: &str) -> bool {
        let value = FilterValue::single(text);
        self.update_filter(SEARCH_KEY, |filters| filters.set(SEARCH_KEY, value))
    }

    /// Prices stay raw text in the URL; the query builder decides validity.
    pub fn set_price_range(&self, min: &str, max: &str) -> bool {
        let (min, max) = (FilterValue::single(min), FilterValue::single(max));
        self.update_filter(MIN_PRICE_KEY, |filters| {
            filters.set(MIN_PRICE_KEY, min);
            filters.set(MAX_PRICE_KEY, max);
        })
    }

    pub fn set_page(&self, page: u32) -> bool {
        self.update(|state| state.with_page(page))
    }

    pub fn set_sort(&self, sort: SortState) -> bool {
        self.update(|state| state.with_sort(sort))
    }

    pub fn select_term(
        &self,
        taxonomy: &str,
        term: Option<&str>,
        term_name: Option<&str>,
    ) -> bool {
        self.update(|state| state.with_term(taxonomy, term, term_name))
    }
}
