//! Debounced, superseding loader for the listing page.
//!
//! Two independent streams are kept: facet options keyed by taxonomy and
//! product pages keyed by the normalized query. A response is applied only
//! if its key is still the one the listing wants; anything else is stale.

use crate::api::{ApiError, CatalogApi};
use crate::filter_state::{ListingState, SEARCH_KEY};
use crate::listing::ListingStore;
use crate::pagination::PaginationState;
use crate::query::{build_query, QueryInput, QueryKey, QueryParameters};
use catalog_types::facet::{FilterOptions, FilterOptionsResult};
use catalog_types::product::{Product, ProductListResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamPhase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// What the listing page renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingView {
    pub products: Vec<Product>,
    pub total_products: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub filter_options: FilterOptions,
    pub products_phase: StreamPhase,
    pub filters_phase: StreamPhase,
    pub error: Option<String>,
    pub filters_error: Option<String>,
    /// Key of the request whose products are shown.
    pub query: Option<QueryKey>,
}

impl ListingView {
    pub fn products_loading(&self) -> bool {
        self.products_phase == StreamPhase::Loading
    }

    pub fn filters_loading(&self) -> bool {
        self.filters_phase == StreamPhase::Loading
    }

    /// Products finished, successfully or not, and no facet request is pending.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.products_phase,
            StreamPhase::Success | StreamPhase::Error
        ) && !self.filters_loading()
    }

    pub fn pagination(&self) -> PaginationState {
        PaginationState::new(self.current_page, self.total_pages)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub per_page: u32,
    pub search_debounce: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            per_page: crate::config::DEFAULT_PER_PAGE,
            search_debounce: crate::config::DEFAULT_SEARCH_DEBOUNCE,
        }
    }
}

enum Event {
    Products {
        key: QueryKey,
        result: Result<ProductListResult, ApiError>,
    },
    Filters {
        taxonomy: String,
        result: Result<FilterOptionsResult, ApiError>,
    },
}

#[derive(Debug)]
enum Command {
    Retry,
}

/// The last dispatched key of a stream and the task serving it.
struct InFlight<K> {
    key: Option<K>,
    task: Option<JoinHandle<()>>,
}

impl<K: PartialEq> InFlight<K> {
    fn new() -> Self {
        Self {
            key: None,
            task: None,
        }
    }

    fn supersede(&mut self, key: K, task: JoinHandle<()>) {
        self.abort();
        self.key = Some(key);
        self.task = Some(task);
    }

    fn is_current(&self, key: &K) -> bool {
        self.key.as_ref() == Some(key)
    }

    fn finish(&mut self) {
        self.task = None;
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn reset(&mut self) {
        self.abort();
        self.key = None;
    }
}

/// Search text together with the page it applies to. Typing resets the
/// page, so both wait for the debounce.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchInput {
    text: Option<String>,
    page: u32,
}

impl SearchInput {
    fn of(state: &ListingState) -> Self {
        Self {
            text: state.search().map(str::to_string),
            page: state.page,
        }
    }
}

impl Default for SearchInput {
    fn default() -> Self {
        Self {
            text: None,
            page: 1,
        }
    }
}

#[derive(Default)]
struct SearchDebounce {
    settled: SearchInput,
    pending: Option<(SearchInput, Instant)>,
}

impl SearchDebounce {
    fn schedule(&mut self, typed: SearchInput, delay: Duration) {
        if typed == self.settled {
            self.pending = None;
        } else {
            self.pending = Some((typed, Instant::now() + delay));
        }
    }

    fn settle_to(&mut self, typed: SearchInput) {
        self.settled = typed;
        self.pending = None;
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn settle(&mut self) {
        if let Some((typed, _)) = self.pending.take() {
            self.settled = typed;
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }
}

/// Remote handle to a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ListingView>,
}

impl OrchestratorHandle {
    /// Re-dispatches whichever stream last failed.
    pub fn retry(&self) -> bool {
        self.commands.send(Command::Retry).is_ok()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListingView> {
        self.view.clone()
    }

    pub fn view(&self) -> ListingView {
        self.view.borrow().clone()
    }
}

pub struct FetchOrchestrator {
    api: Arc<dyn CatalogApi>,
    store: Arc<ListingStore>,
    options: OrchestratorOptions,
    view: watch::Sender<ListingView>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    products: InFlight<QueryKey>,
    filters: InFlight<String>,
    search: SearchDebounce,
    state: ListingState,
}

impl FetchOrchestrator {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        store: Arc<ListingStore>,
        options: OrchestratorOptions,
    ) -> Self {
        let state = store.state();
        let (view, _) = watch::channel(ListingView {
            current_page: state.page,
            ..Default::default()
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            api,
            store,
            options,
            view,
            events_tx,
            events_rx,
            commands_tx,
            commands_rx,
            products: InFlight::new(),
            filters: InFlight::new(),
            search: SearchDebounce::default(),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ListingView> {
        self.view.subscribe()
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            commands: self.commands_tx.clone(),
            view: self.view.subscribe(),
        }
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    pub async fn run(mut self, token: CancellationToken) {
        let mut changes = self.store.subscribe();
        self.state = changes.borrow_and_update().clone();
        self.search.settle_to(SearchInput::of(&self.state));
        self.refresh_filters(false);
        self.refresh_products(false);

        loop {
            let deadline = self.search.deadline();
            tokio::select! {
                _ = token.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = changes.borrow_and_update().clone();
                    self.on_state(state);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.search.settle();
                    self.refresh_products(false);
                }
                Some(event) = self.events_rx.recv() => self.apply(event),
                Some(command) = self.commands_rx.recv() => self.execute(command),
            }
        }

        self.products.abort();
        self.filters.abort();
        log::debug!("Listing orchestrator stopped");
    }

    fn on_state(&mut self, state: ListingState) {
        let previous = std::mem::replace(&mut self.state, state);
        let typed = SearchInput::of(&self.state);
        if is_search_edit(&previous, &self.state) {
            self.search.schedule(typed, self.options.search_debounce);
        } else {
            // other changes fetch immediately and take the typed search along
            self.search.settle_to(typed);
        }
        if previous.taxonomy != self.state.taxonomy {
            self.refresh_filters(false);
        }
        self.refresh_products(false);
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Retry => {
                if self.view.borrow().products_phase == StreamPhase::Error {
                    self.refresh_products(true);
                }
                if self.view.borrow().filters_phase == StreamPhase::Error {
                    self.refresh_filters(true);
                }
            }
        }
    }

    fn refresh_products(&mut self, force: bool) {
        let settled = &self.search.settled;
        let input = QueryInput {
            page: settled.page,
            ..QueryInput::from_state(&self.state, self.options.per_page)
                .with_search(settled.text.as_deref())
        };
        let query = match build_query(input) {
            Ok(query) => query,
            Err(err) => {
                log::warn!("Not fetching products: {err}");
                self.products.reset();
                let message = ApiError::from(err).user_message();
                self.view.send_modify(|v| {
                    v.products.clear();
                    v.total_products = 0;
                    v.total_pages = 0;
                    v.products_phase = StreamPhase::Error;
                    v.error = Some(message);
                    v.query = None;
                });
                return;
            }
        };
        if !force && self.products.is_current(&query.key()) {
            return;
        }
        self.dispatch_products(query);
    }

    fn dispatch_products(&mut self, query: QueryParameters) {
        let key = query.key();
        let page = query.page;
        log::debug!("Fetching products {key}");
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let event_key = key.clone();
        let task = tokio::spawn(async move {
            let result = api.products(&query).await;
            if tx
                .send(Event::Products {
                    key: event_key,
                    result,
                })
                .is_err()
            {
                log::debug!("Listing closed before products arrived");
            }
        });
        self.products.supersede(key, task);
        self.view.send_modify(|v| {
            v.products_phase = StreamPhase::Loading;
            v.current_page = page;
        });
    }

    fn refresh_filters(&mut self, force: bool) {
        let taxonomy = self.state.taxonomy.trim().to_string();
        if taxonomy.is_empty() {
            self.filters.reset();
            self.view.send_modify(|v| {
                v.filter_options = FilterOptions::default();
                v.filters_phase = StreamPhase::Idle;
            });
            return;
        }
        if !force && self.filters.is_current(&taxonomy) {
            return;
        }
        log::debug!("Fetching filter options for {taxonomy}");
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let event_taxonomy = taxonomy.clone();
        let task = tokio::spawn(async move {
            let result = api.filter_options(&event_taxonomy).await;
            if tx
                .send(Event::Filters {
                    taxonomy: event_taxonomy,
                    result,
                })
                .is_err()
            {
                log::debug!("Listing closed before filter options arrived");
            }
        });
        self.filters.supersede(taxonomy, task);
        self.view
            .send_modify(|v| v.filters_phase = StreamPhase::Loading);
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::Products { key, result } => self.apply_products(key, result),
            Event::Filters { taxonomy, result } => self.apply_filters(taxonomy, result),
        }
    }

    fn apply_products(&mut self, key: QueryKey, result: Result<ProductListResult, ApiError>) {
        if !self.products.is_current(&key) {
            log::debug!("Discarding stale products for {key}");
            return;
        }
        self.products.finish();
        match result {
            Ok(list) => {
                let total_pages = u32::try_from(list.total_pages).unwrap_or(u32::MAX);
                let requested = self.search.settled.page;
                let pagination = PaginationState::new(requested, total_pages);
                self.view.send_modify(|v| {
                    v.products = list.products;
                    v.total_products = list.total;
                    v.total_pages = total_pages;
                    v.current_page = pagination.current_page;
                    v.products_phase = StreamPhase::Success;
                    v.error = None;
                    v.query = Some(key);
                });
                // a pending search already moves the listing to page 1
                if pagination.current_page != requested && !self.search.is_pending() {
                    log::info!(
                        "Page {requested} is out of range, moving to {}",
                        pagination.current_page
                    );
                    self.store.set_page(pagination.current_page);
                }
            }
            Err(err) => {
                log::warn!("Unable to load products for {key}: {err}");
                let message = err.user_message();
                self.view.send_modify(|v| {
                    v.products.clear();
                    v.total_products = 0;
                    v.total_pages = 0;
                    v.products_phase = StreamPhase::Error;
                    v.error = Some(message);
                    v.query = Some(key);
                });
            }
        }
    }

    fn apply_filters(&mut self, taxonomy: String, result: Result<FilterOptionsResult, ApiError>) {
        if !self.filters.is_current(&taxonomy) {
            log::debug!("Discarding stale filter options for {taxonomy}");
            return;
        }
        self.filters.finish();
        match result {
            Ok(options) => self.view.send_modify(|v| {
                v.filter_options = options.filters;
                v.filters_phase = StreamPhase::Success;
                v.filters_error = None;
            }),
            Err(err) => {
                log::warn!("Unable to load filter options for {taxonomy}: {err}");
                let message = err.user_message();
                self.view.send_modify(|v| {
                    v.filters_phase = StreamPhase::Error;
                    v.filters_error = Some(message);
                });
            }
        }
    }
}

/// True when only the search text changed, possibly with the page reset
/// that every filter edit implies.
fn is_search_edit(previous: &ListingState, next: &ListingState) -> bool {
    let strip = |s: &ListingState| {
        let mut filters = s.filters.clone();
        filters.remove(SEARCH_KEY);
        ListingState {
            filters,
            page: 1,
            ..s.clone()
        }
    };
    let page_kept_or_reset = next.page == previous.page || next.page == 1;
    previous.search() != next.search() && page_kept_or_reset && strip(previous) == strip(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListingConfig;
    use async_trait::async_trait;
    use catalog_types::category::{Category, Term};
    use catalog_types::enquiry::{Enquiry, EnquiryReceipt};
    use catalog_types::facet::{FacetGroup, FacetOption};
    use catalog_types::post::PostListResult;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::sleep;

    struct MockApi {
        calls: Mutex<Vec<QueryParameters>>,
        filter_calls: AtomicUsize,
        fail_products: AtomicBool,
        fail_filters: AtomicBool,
        total_pages: u64,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                calls: Mutex::new(vec![]),
                filter_calls: AtomicUsize::new(0),
                fail_products: AtomicBool::new(false),
                fail_filters: AtomicBool::new(false),
                total_pages: 3,
            }
        }

        fn searches(&self) -> Vec<Option<String>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|q| q.search.clone())
                .collect()
        }
    }

    #[async_trait]
    impl CatalogApi for MockApi {
        async fn products(&self, query: &QueryParameters) -> Result<ProductListResult, ApiError> {
            self.calls.lock().unwrap().push(query.clone());
            let delay = if query.taxonomy == "equipment-buy" { 300 } else { 50 };
            sleep(Duration::from_millis(delay)).await;
            if self.fail_products.load(Ordering::SeqCst) {
                return Err(ApiError::Http {
                    status: 500,
                    message: "HTTP error! status: 500".to_string(),
                });
            }
            let name = format!(
                "{}-{}",
                query.taxonomy,
                query.search.clone().unwrap_or_default()
            );
            Ok(ProductListResult {
                products: vec![Product {
                    name,
                    ..Default::default()
                }],
                total: 1,
                total_pages: self.total_pages,
                current_page: u64::from(query.page),
                per_page: u64::from(query.per_page),
            })
        }

        async fn filter_options(&self, taxonomy: &str) -> Result<FilterOptionsResult, ApiError> {
            self.filter_calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            if self.fail_filters.load(Ordering::SeqCst) {
                return Err(ApiError::Timeout {
                    timeout: Duration::from_secs(10),
                });
            }
            Ok(FilterOptionsResult {
                taxonomy: taxonomy.to_string(),
                filters: FilterOptions(BTreeMap::from([(
                    "pa_brand".to_string(),
                    FacetGroup {
                        label: "Brand".to_string(),
                        options: vec![FacetOption {
                            slug: "heli".to_string(),
                            name: "Heli".to_string(),
                            count: Some(2),
                        }],
                    },
                )])),
                total: 1,
            })
        }

        async fn categories(&self) -> Result<Vec<Category>, ApiError> {
            Ok(vec![])
        }

        async fn terms(&self, _taxonomy: &str) -> Result<Vec<Term>, ApiError> {
            Ok(vec![])
        }

        async fn posts(&self, _page: u32, _per_page: u32) -> Result<PostListResult, ApiError> {
            Ok(PostListResult::default())
        }

        async fn product(&self, _slug: &str) -> Result<Product, ApiError> {
            Ok(Product::default())
        }

        async fn submit_enquiry(&self, _enquiry: &Enquiry) -> Result<EnquiryReceipt, ApiError> {
            Ok(EnquiryReceipt::default())
        }
    }

    struct Harness {
        api: Arc<MockApi>,
        store: Arc<ListingStore>,
        view: watch::Receiver<ListingView>,
        handle: OrchestratorHandle,
        token: CancellationToken,
    }

    fn start_with(api: MockApi, config: ListingConfig, url: &str) -> Harness {
        let api = Arc::new(api);
        let store = Arc::new(ListingStore::new(&config, url));
        let orchestrator = FetchOrchestrator::new(
            api.clone(),
            store.clone(),
            OrchestratorOptions {
                per_page: 12,
                search_debounce: Duration::from_millis(500),
            },
        );
        let view = orchestrator.subscribe();
        let handle = orchestrator.handle();
        let token = CancellationToken::new();
        orchestrator.spawn(token.clone());
        Harness {
            api,
            store,
            view,
            handle,
            token,
        }
    }

    fn start(url: &str) -> Harness {
        start_with(MockApi::new(), ListingConfig::default(), url)
    }

    async fn settled(view: &mut watch::Receiver<ListingView>) -> ListingView {
        view.wait_for(|v| v.is_settled() && !v.products_loading())
            .await
            .unwrap()
            .clone()
    }

    fn first_name(view: &ListingView) -> Option<&str> {
        view.products.first().map(|p| p.name.as_str())
    }

    #[tokio::test(start_paused = true)]
    async fn loads_products_and_facets_on_mount() {
        let mut h = start("/products?taxonomy=equipment-rent&pa_brand=heli");
        let view = settled(&mut h.view).await;
        assert_eq!(first_name(&view), Some("equipment-rent-"));
        assert_eq!(view.total_pages, 3);
        assert_eq!(view.filter_options.option_name("pa_brand", "heli"), "Heli");
        let calls = h.api.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].facets.get("pa_brand").and_then(|v| v.as_scalar()),
            Some("heli")
        );
        h.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn newer_request_wins_over_slow_stale_one() {
        let mut h = start("/products?taxonomy=equipment-buy");
        sleep(Duration::from_millis(10)).await;
        assert!(h.store.select_term("equipment-rent", None, None));

        let view = h
            .view
            .wait_for(|v| v.products_phase == StreamPhase::Success)
            .await
            .unwrap()
            .clone();
        assert_eq!(first_name(&view), Some("equipment-rent-"));

        sleep(Duration::from_secs(1)).await;
        let view = h.handle.view();
        assert_eq!(first_name(&view), Some("equipment-rent-"));
        assert_eq!(h.api.calls.lock().unwrap().len(), 2);
        h.token.cancel();
    }

    #[test]
    fn late_response_for_old_key_is_discarded() {
        let store = Arc::new(ListingStore::new(
            &ListingConfig::default(),
            "/products?taxonomy=equipment-rent",
        ));
        let mut orchestrator =
            FetchOrchestrator::new(Arc::new(MockApi::new()), store, Default::default());
        let query = |taxonomy: &str| {
            let state = ListingState::new(taxonomy);
            build_query(QueryInput::from_state(&state, 12)).unwrap()
        };
        let (old, new) = (query("equipment-buy"), query("equipment-rent"));
        orchestrator.products.key = Some(new.key());

        orchestrator.apply_products(
            old.key(),
            Ok(ProductListResult {
                products: vec![Product::default()],
                total: 1,
                ..Default::default()
            }),
        );
        assert!(orchestrator.view.borrow().products.is_empty());
        assert_eq!(orchestrator.view.borrow().products_phase, StreamPhase::Idle);

        orchestrator.apply_products(new.key(), Ok(ProductListResult::default()));
        assert_eq!(
            orchestrator.view.borrow().products_phase,
            StreamPhase::Success
        );
    }

    #[tokio::test(start_paused = true)]
    async fn typing_is_debounced_into_one_fetch() {
        let mut h = start("/products?taxonomy=equipment-rent");
        settled(&mut h.view).await;

        h.store.set_search("a");
        sleep(Duration::from_millis(100)).await;
        h.store.set_search("ab");
        sleep(Duration::from_millis(100)).await;
        h.store.set_search("abc");

        let view = h
            .view
            .wait_for(|v| first_name(v) == Some("equipment-rent-abc"))
            .await
            .unwrap()
            .clone();
        assert_eq!(view.products_phase, StreamPhase::Success);
        assert_eq!(h.api.searches(), vec![None, Some("abc".to_string())]);
        h.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn typing_on_later_page_waits_with_page_reset() {
        let mut h = start("/products?taxonomy=equipment-rent&page=2");
        let view = settled(&mut h.view).await;
        assert_eq!(view.current_page, 2);

        h.store.set_search("a");
        assert_eq!(h.store.state().page, 1);
        sleep(Duration::from_millis(100)).await;
        h.store.set_search("ab");
        sleep(Duration::from_millis(100)).await;
        h.store.set_search("abc");
        sleep(Duration::from_millis(100)).await;
        // still showing page 2 of the unfiltered listing
        assert_eq!(h.api.calls.lock().unwrap().len(), 1);
        assert_eq!(h.handle.view().current_page, 2);

        let view = h
            .view
            .wait_for(|v| first_name(v) == Some("equipment-rent-abc"))
            .await
            .unwrap()
            .clone();
        assert_eq!(view.current_page, 1);
        assert_eq!(h.api.searches(), vec![None, Some("abc".to_string())]);
        let pages = h
            .api
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.page)
            .collect::<Vec<_>>();
        assert_eq!(pages, vec![2, 1]);
        h.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn facet_changes_are_not_debounced() {
        let mut h = start("/products?taxonomy=equipment-rent");
        settled(&mut h.view).await;

        h.store.toggle_facet("pa_brand", "heli");
        let started = Instant::now();
        h.view
            .wait_for(|v| {
                v.products_phase == StreamPhase::Success
                    && v
                        .query
                        .as_ref()
                        .is_some_and(|k| k.0.iter().any(|(key, _)| key == "pa_brand"))
            })
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        // taxonomy did not change, so facets are not refetched
        assert_eq!(h.api.filter_calls.load(Ordering::SeqCst), 1);
        h.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn product_failure_clears_list_but_keeps_facets() {
        let api = MockApi::new();
        api.fail_products.store(true, Ordering::SeqCst);
        let mut h = start_with(api, ListingConfig::default(), "/products?taxonomy=equipment-rent");

        let view = settled(&mut h.view).await;
        assert_eq!(view.products_phase, StreamPhase::Error);
        assert!(view.products.is_empty());
        assert_eq!(view.error.as_deref(), Some("HTTP error! status: 500"));
        assert!(!view.filter_options.is_empty());

        h.api.fail_products.store(false, Ordering::SeqCst);
        assert!(h.handle.retry());
        let view = h
            .view
            .wait_for(|v| v.products_phase == StreamPhase::Success)
            .await
            .unwrap()
            .clone();
        assert_eq!(view.error, None);
        assert_eq!(first_name(&view), Some("equipment-rent-"));
        h.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn facet_failure_does_not_block_products() {
        let api = MockApi::new();
        api.fail_filters.store(true, Ordering::SeqCst);
        let mut h = start_with(api, ListingConfig::default(), "/products?taxonomy=equipment-rent");

        let view = settled(&mut h.view).await;
        assert_eq!(view.products_phase, StreamPhase::Success);
        assert_eq!(view.filters_phase, StreamPhase::Error);
        assert!(view.filters_error.is_some());
        assert_eq!(first_name(&view), Some("equipment-rent-"));
        h.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_page_is_clamped() {
        let mut h = start("/products?taxonomy=equipment-rent&page=7");
        let view = h
            .view
            .wait_for(|v| v.products_phase == StreamPhase::Success && v.current_page == 3)
            .await
            .unwrap()
            .clone();
        assert_eq!(view.total_pages, 3);
        assert_eq!(h.store.state().page, 3);
        assert_eq!(h.store.url(), "/products?taxonomy=equipment-rent&page=3");
        h.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_taxonomy_never_hits_network() {
        let config = ListingConfig {
            default_taxonomy: String::new(),
            ..Default::default()
        };
        let mut h = start_with(MockApi::new(), config, "/products?pa_brand=heli");
        let view = h
            .view
            .wait_for(|v| v.products_phase == StreamPhase::Error)
            .await
            .unwrap()
            .clone();
        assert_eq!(view.error.as_deref(), Some("Taxonomy is required"));
        sleep(Duration::from_secs(1)).await;
        assert!(h.api.calls.lock().unwrap().is_empty());
        assert_eq!(h.api.filter_calls.load(Ordering::SeqCst), 0);
        h.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn no_op_mutations_do_not_refetch() {
        let mut h = start("/products?taxonomy=equipment-rent");
        settled(&mut h.view).await;
        assert!(!h.store.navigate("/products?taxonomy=equipment-rent"));
        assert!(!h.store.set_page(1));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(h.api.calls.lock().unwrap().len(), 1);
        h.token.cancel();
    }
}
