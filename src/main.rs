use anyhow::Context;
use catalog_sync::api::HttpCatalogApi;
use catalog_sync::catalog_types::enquiry::Enquiry;
use catalog_sync::catalog_types::product::Product;
use catalog_sync::config::{ApiConfig, ListingConfig};
use catalog_sync::enquiry::{submit_enquiry, EnquiryError};
use catalog_sync::filter_state::{active_filters, ActiveFilter};
use catalog_sync::listing::ListingStore;
use catalog_sync::orchestrator::{FetchOrchestrator, ListingView, OrchestratorOptions};
use catalog_sync::pagination::PaginationItem;
use catalog_sync::query::{build_query, QueryInput};
use itertools::Itertools;
use serde::Serialize;
use std::env;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

const USAGE: &str = "usage: catalog-sync [--json] [listing-url]
       catalog-sync enquiry <name> <email> <phone> <interest>";

#[derive(Serialize)]
struct ListingSummary<'a> {
    url: String,
    total_products: u64,
    current_page: u32,
    total_pages: u32,
    pages: Vec<String>,
    products: &'a [Product],
    active_filters: Vec<ActiveFilter>,
    error: Option<&'a str>,
    filters_error: Option<&'a str>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    let api_config = Arc::new(ApiConfig::from_env()?);
    let listing_config = ListingConfig::from_env();
    let api = Arc::new(
        HttpCatalogApi::new(api_config.clone()).context("Unable to build http client")?,
    );
    log::info!("Using catalog api at {}", api_config.base_url);

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    let json = match args.iter().position(|a| a == "--json") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };

    match args.first().map(String::as_str) {
        Some("-h" | "--help") => {
            println!("{USAGE}");
            Ok(())
        }
        Some("enquiry") => enquiry(api, &listing_config, &args[1..]).await,
        url => {
            let url = url.unwrap_or(&listing_config.path).to_string();
            listing(api, &api_config, &listing_config, &url, json).await
        }
    }
}

async fn listing(
    api: Arc<HttpCatalogApi>,
    api_config: &ApiConfig,
    listing_config: &ListingConfig,
    url: &str,
    json: bool,
) -> Result<(), anyhow::Error> {
    let store = Arc::new(ListingStore::new(listing_config, url));
    let per_page = api_config.default_per_page;
    let orchestrator = FetchOrchestrator::new(
        api,
        store.clone(),
        OrchestratorOptions {
            per_page,
            search_debounce: listing_config.search_debounce,
        },
    );
    let mut view = orchestrator.subscribe();
    let token = CancellationToken::new();
    let task = orchestrator.spawn(token.clone());
    log::info!("Loading {}", store.url());

    // out-of-range pages are clamped through the store, so wait until the
    // shown products belong to the current url
    let settled = tokio::select! {
        ready = view.wait_for(|v| {
            let wanted = build_query(QueryInput::from_state(&store.state(), per_page))
                .ok()
                .map(|q| q.key());
            v.is_settled() && v.query == wanted
        }) => Some(ready.context("Listing stopped unexpectedly")?.clone()),
        _ = signal::ctrl_c() => None,
    };
    token.cancel();
    task.await?;

    let Some(view) = settled else {
        log::info!("Interrupted");
        return Ok(());
    };
    let state = store.state();
    let chips = active_filters(&state.filters, &view.filter_options);
    let pages = view
        .pagination()
        .items()
        .into_iter()
        .map(|item| match item {
            PaginationItem::Page(p) if p == view.current_page => format!("[{p}]"),
            item => item.to_string(),
        })
        .collect::<Vec<_>>();

    if json {
        let summary = ListingSummary {
            url: store.url(),
            total_products: view.total_products,
            current_page: view.current_page,
            total_pages: view.total_pages,
            pages,
            products: &view.products,
            active_filters: chips,
            error: view.error.as_deref(),
            filters_error: view.filters_error.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_listing(&view, &chips, &pages);
    Ok(())
}

fn print_listing(view: &ListingView, chips: &[ActiveFilter], pages: &[String]) {
    if let Some(error) = &view.error {
        println!("Error: {error}");
    } else {
        println!(
            "{} products, page {} of {}",
            view.total_products,
            view.current_page,
            view.total_pages.max(1)
        );
        for product in &view.products {
            let price = product
                .price
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            let sale = if product.on_sale() { " (sale)" } else { "" };
            let image = product
                .main_image()
                .map(|i| format!(" | {}", i.src))
                .unwrap_or_default();
            println!(
                "  {} | {price}{sale} | {}{image}",
                product.name, product.stock_status
            );
        }
    }
    if !pages.is_empty() {
        println!("Pages: {}", pages.join(" "));
    }
    if !chips.is_empty() {
        println!("Active: {}", chips.iter().map(|c| &c.label).join(", "));
    }
    match &view.filters_error {
        Some(error) => println!("Filters unavailable: {error}"),
        None => {
            for (key, group) in view.filter_options.iter() {
                let options = group
                    .options
                    .iter()
                    .map(|o| match o.count {
                        Some(count) => format!("{} ({count})", o.name),
                        None => o.name.clone(),
                    })
                    .join(", ");
                println!("{} [{key}]: {options}", view.filter_options.label(key));
            }
        }
    }
}

async fn enquiry(
    api: Arc<HttpCatalogApi>,
    listing_config: &ListingConfig,
    args: &[String],
) -> Result<(), anyhow::Error> {
    let [name, email, phone, interest] = args else {
        return Err(anyhow::anyhow!("{USAGE}"));
    };
    let enquiry = Enquiry {
        name: name.clone(),
        email: email.clone(),
        phone: phone.clone(),
        interest: interest.clone(),
        page_url: listing_config.path.clone(),
        source_page: Some("cli".to_string()),
    };
    match submit_enquiry(api.as_ref(), &enquiry).await {
        Ok(receipt) => {
            println!(
                "{}",
                receipt
                    .message
                    .unwrap_or_else(|| "Thank you, we will be in touch.".to_string())
            );
            Ok(())
        }
        Err(EnquiryError::Invalid(errors)) => {
            for error in &errors {
                println!("{error}");
            }
            Err(anyhow::anyhow!("Enquiry has {} invalid field(s)", errors.len()))
        }
        Err(err) => {
            if err.is_retryable() {
                log::warn!("Enquiry failed, it can be sent again: {err}");
            }
            Err(err.into())
        }
    }
}
