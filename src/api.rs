use crate::config::ApiConfig;
use crate::query::{QueryError, QueryParameters};
use async_trait::async_trait;
use catalog_types::category::{parse_list_response, Category, Term};
use catalog_types::enquiry::{Enquiry, EnquiryReceipt};
use catalog_types::facet::{parse_filter_options_response, FilterOptionsResult};
use catalog_types::post::{parse_post_list_response, PostListResult};
use catalog_types::product::{
    parse_product_list_response, parse_product_response, Product, ProductListResult,
};
use derive_more::{Display, Error};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Display, Error)]
pub enum ApiError {
    Validation(QueryError),
    #[error(ignore)]
    #[display("Request timed out after {}ms", timeout.as_millis())]
    Timeout { timeout: Duration },
    #[error(ignore)]
    #[display("{message}")]
    Http { status: u16, message: String },
    #[display("Network error: {_0}")]
    Network(reqwest::Error),
    #[display("Invalid response: {_0}")]
    InvalidResponse(serde_json::Error),
    #[display("Invalid request url: {_0}")]
    InvalidUrl(url::ParseError),
}

impl ApiError {
    /// Text suitable for an error banner or inline form message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Timeout { .. } => {
                "The server took too long to respond. Please try again.".to_string()
            }
            Self::Http { message, .. } => message.clone(),
            Self::Network(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            Self::InvalidResponse(_) | Self::InvalidUrl(_) => {
                "Unexpected response from the server.".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::InvalidUrl(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidResponse(err)
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidUrl(err)
    }
}

/// Message from a `{"message": ...}` error body, or a generic status line.
pub fn http_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP error! status: {status}"))
}

pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ApiError::Timeout { timeout })?
}

/// Remote content/commerce API.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn products(&self, query: &QueryParameters) -> Result<ProductListResult, ApiError>;
    async fn filter_options(&self, taxonomy: &str) -> Result<FilterOptionsResult, ApiError>;
    async fn categories(&self) -> Result<Vec<Category>, ApiError>;
    async fn terms(&self, taxonomy: &str) -> Result<Vec<Term>, ApiError>;
    async fn posts(&self, page: u32, per_page: u32) -> Result<PostListResult, ApiError>;
    async fn product(&self, slug: &str) -> Result<Product, ApiError>;
    async fn submit_enquiry(&self, enquiry: &Enquiry) -> Result<EnquiryReceipt, ApiError>;
}

struct CacheEntry {
    body: serde_json::Value,
    cached_at: Instant,
}

pub struct HttpCatalogApi {
    client: reqwest::Client,
    config: Arc<ApiConfig>,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl HttpCatalogApi {
    pub fn new(config: Arc<ApiConfig>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.append(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            config,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn url<I, K, V>(&self, endpoint: &str, params: I) -> Result<Url, ApiError>
    where
        I: IntoIterator,
        I::Item: std::borrow::Borrow<(K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Url::parse_with_params(
            &self.config.endpoint_url(endpoint),
            params,
        )?)
    }

    pub fn plain_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        Ok(Url::parse(&self.config.endpoint_url(endpoint))?)
    }

    async fn get_json(&self, url: Url) -> Result<serde_json::Value, ApiError> {
        log::debug!("GET {url}");
        with_timeout(self.config.timeout, async {
            let resp = self.client.get(url).send().await?;
            read_json(resp).await
        })
        .await
    }

    /// Same as `get_json`, served from memory for `cache_time`.
    async fn get_json_cached(&self, url: Url) -> Result<serde_json::Value, ApiError> {
        let key = url.to_string();
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.cached_at.elapsed() < self.config.cache_time {
                    log::debug!("Cache hit for {key}");
                    return Ok(entry.body.clone());
                }
            }
        }
        let body = self.get_json(url).await?;
        let mut cache = self.cache.write().await;
        cache.retain(|_, e| e.cached_at.elapsed() < self.config.cache_time);
        cache.insert(
            key,
            CacheEntry {
                body: body.clone(),
                cached_at: Instant::now(),
            },
        );
        Ok(body)
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }
}

async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, ApiError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(http_error(status, &body));
    }
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

fn http_error(status: StatusCode, body: &str) -> ApiError {
    ApiError::Http {
        status: status.as_u16(),
        message: http_error_message(status.as_u16(), body),
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogApi {
    async fn products(&self, query: &QueryParameters) -> Result<ProductListResult, ApiError> {
        let url = self.url(&self.config.endpoints.products, query.to_pairs())?;
        Ok(parse_product_list_response(self.get_json(url).await?)?)
    }

    async fn filter_options(&self, taxonomy: &str) -> Result<FilterOptionsResult, ApiError> {
        if taxonomy.trim().is_empty() {
            return Err(QueryError::MissingTaxonomy.into());
        }
        let url = self.url(&self.config.endpoints.filters, [("taxonomy", taxonomy)])?;
        Ok(parse_filter_options_response(
            self.get_json_cached(url).await?,
        )?)
    }

    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let url = self.plain_url(&self.config.endpoints.categories)?;
        Ok(parse_list_response(self.get_json_cached(url).await?)?)
    }

    async fn terms(&self, taxonomy: &str) -> Result<Vec<Term>, ApiError> {
        let url = self.url(&self.config.endpoints.terms, [("taxonomy", taxonomy)])?;
        Ok(parse_list_response(self.get_json_cached(url).await?)?)
    }

    async fn posts(&self, page: u32, per_page: u32) -> Result<PostListResult, ApiError> {
        let url = self.url(
            &self.config.endpoints.posts,
            [
                ("page", page.max(1).to_string()),
                ("per_page", per_page.max(1).to_string()),
            ],
        )?;
        Ok(parse_post_list_response(self.get_json(url).await?)?)
    }

    async fn product(&self, slug: &str) -> Result<Product, ApiError> {
        let mut url = self.plain_url(&self.config.endpoints.product)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(slug.trim());
        Ok(parse_product_response(self.get_json(url).await?)?)
    }

    async fn submit_enquiry(&self, enquiry: &Enquiry) -> Result<EnquiryReceipt, ApiError> {
        let url = self.plain_url(&self.config.endpoints.enquiry)?;
        log::debug!("POST {url}");
        let body = with_timeout(self.config.timeout, async {
            let resp = self.client.post(url).json(enquiry).send().await?;
            read_json(resp).await
        })
        .await?;
        match body {
            serde_json::Value::Null => Ok(EnquiryReceipt::default()),
            body => Ok(serde_json::from_value(body)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    type Requests = Arc<Mutex<Vec<String>>>;

    /// Reads the head and, when announced, the whole body.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    /// Serves the same response to every connection and records each raw request.
    async fn serve(status: &'static str, body: &'static str) -> (String, Requests) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Requests::default();
        let log = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}/wp-json/catalog/v1"), requests)
    }

    fn api(base_url: String, timeout: Duration) -> HttpCatalogApi {
        HttpCatalogApi::new(Arc::new(ApiConfig {
            base_url,
            timeout,
            ..Default::default()
        }))
        .unwrap()
    }

    #[test]
    fn extracts_error_messages() {
        assert_eq!(
            http_error_message(400, r#"{"code":"bad","message":"Unknown taxonomy"}"#),
            "Unknown taxonomy"
        );
        assert_eq!(http_error_message(502, "<html>Bad gateway</html>"), "HTTP error! status: 502");
        assert_eq!(http_error_message(500, r#"{"message":""}"#), "HTTP error! status: 500");
    }

    #[test]
    fn builds_listing_urls() {
        let api = api(
            "https://shop.example/wp-json/catalog/v1".to_string(),
            Duration::from_secs(1),
        );
        let url = api
            .url("/products", [("taxonomy", "equipment-buy"), ("pa_brand", "heli,toyota")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://shop.example/wp-json/catalog/v1/products?taxonomy=equipment-buy&pa_brand=heli%2Ctoyota"
        );
    }

    #[test]
    fn timeouts_have_their_own_message() {
        let timeout = ApiError::Timeout {
            timeout: Duration::from_secs(10),
        };
        let http = ApiError::Http {
            status: 503,
            message: "HTTP error! status: 503".to_string(),
        };
        assert_ne!(timeout.user_message(), http.user_message());
        assert_eq!(timeout.to_string(), "Request timed out after 10000ms");
        assert!(timeout.is_retryable());
        assert!(!ApiError::from(QueryError::MissingTaxonomy).is_retryable());
    }

    #[tokio::test]
    async fn reads_defaulted_listing() {
        let (base, _) = serve(
            "200 OK",
            r#"{"products":[{"id":1,"name":"Heli"}],"total":"1"}"#,
        )
        .await;
        let res = api(base, Duration::from_secs(5))
            .products(&crate::query::build_query(crate::query::QueryInput::from_state(
                &crate::filter_state::ListingState::new("equipment-buy"),
                12,
            ))
            .unwrap())
            .await
            .unwrap();
        assert_eq!(res.products[0].name, "Heli");
        assert_eq!(res.total, 1);
        assert_eq!(res.total_pages, 0);
    }

    #[tokio::test]
    async fn surfaces_http_errors() {
        let (base, _) = serve("404 Not Found", r#"{"message":"No such taxonomy"}"#).await;
        let err = api(base, Duration::from_secs(5))
            .filter_options("nope")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message(), "No such taxonomy");
    }

    #[tokio::test]
    async fn reads_wrapped_terms_once() {
        let (base, requests) = serve(
            "200 OK",
            r#"{"terms":[{"id":"3","name":"Forklifts","slug":"forklifts","count":7}]}"#,
        )
        .await;
        let api = api(base, Duration::from_secs(5));
        let terms = api.terms("pa_type").await.unwrap();
        assert_eq!(
            terms,
            vec![Term {
                id: 3,
                name: "Forklifts".to_string(),
                slug: "forklifts".to_string(),
                count: 7,
            }]
        );
        api.terms("pa_type").await.unwrap();
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(
            requests[0].starts_with("GET /wp-json/catalog/v1/terms?taxonomy=pa_type HTTP/1.1"),
            "{}",
            requests[0]
        );
    }

    #[tokio::test]
    async fn product_slug_is_one_path_segment() {
        let (base, requests) = serve(
            "200 OK",
            r#"{"product":{"id":"9","name":"Reach truck","price":"1200.50"}}"#,
        )
        .await;
        let product = api(base, Duration::from_secs(5))
            .product(" reach truck/2t ")
            .await
            .unwrap();
        assert_eq!(product.id, 9);
        assert_eq!(product.name, "Reach truck");
        let requests = requests.lock().unwrap();
        assert!(
            requests[0].starts_with("GET /wp-json/catalog/v1/product/reach%20truck%2F2t HTTP/1.1"),
            "{}",
            requests[0]
        );
    }

    #[tokio::test]
    async fn posts_enquiry_as_json() {
        let (base, requests) = serve("200 OK", r#"{"id":"15","status":"received"}"#).await;
        let enquiry = Enquiry {
            name: "Ann Lee".to_string(),
            email: "ann@example.com".to_string(),
            phone: "+44 20 7946 0958".to_string(),
            interest: "Forklift rental".to_string(),
            page_url: "/products".to_string(),
            source_page: None,
        };
        let receipt = api(base, Duration::from_secs(5))
            .submit_enquiry(&enquiry)
            .await
            .unwrap();
        assert_eq!(receipt.id, Some(15));
        assert_eq!(receipt.status.as_deref(), Some("received"));
        let requests = requests.lock().unwrap();
        assert!(requests[0].starts_with("POST /wp-json/catalog/v1/enquiry HTTP/1.1"));
        assert!(requests[0].contains(r#""interest":"Forklift rental""#));
    }

    #[tokio::test]
    async fn rejected_enquiry_is_retryable() {
        let (base, _) = serve(
            "503 Service Unavailable",
            r#"{"code":"mail_failed","message":"Unable to send your enquiry"}"#,
        )
        .await;
        let err = api(base, Duration::from_secs(5))
            .submit_enquiry(&Enquiry::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.user_message(), "Unable to send your enquiry");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn caches_filter_options() {
        let (base, requests) = serve(
            "200 OK",
            r#"{"taxonomy":"equipment-buy","filters":{"pa_brand":{"label":"Brand","options":[]}}}"#,
        )
        .await;
        let api = api(base, Duration::from_secs(5));
        let first = api.filter_options("equipment-buy").await.unwrap();
        let second = api.filter_options("equipment-buy").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(requests.lock().unwrap().len(), 1);
        api.clear_cache().await;
        api.filter_options("equipment-buy").await.unwrap();
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn times_out_silent_servers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = vec![];
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let err = api(format!("http://{addr}"), Duration::from_millis(100))
            .categories()
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = api(format!("http://{addr}"), Duration::from_secs(5))
            .posts(1, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network(_)), "{err:?}");
    }
}
