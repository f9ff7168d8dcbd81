//! Nominatim geocoding client
//!
//! Thin wrapper over the `/search` endpoint. All requests go through
//! `fetcher::fetch_with_retry`; responses that are not JSON (some Nominatim
//! deployments answer throttled clients with an HTML error page) degrade to
//! an empty result set instead of failing the caller.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::services::fetcher::{
    fetch_with_retry, http_client, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES,
};

/// One match from the Nominatim result array. Coordinates arrive as strings;
/// `boundingbox` is `[latMin, latMax, lonMin, lonMax]`.
#[derive(Debug, Clone, Deserialize)]
pub struct NominatimPlace {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub boundingbox: Option<[String; 4]>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
    initial_delay: Duration,
}

impl NominatimClient {
    /// Create a new client with the default retry policy.
    pub fn new(base_url: &str) -> Self {
        Self::with_retry(base_url, DEFAULT_MAX_RETRIES, DEFAULT_INITIAL_DELAY)
    }

    pub fn with_retry(base_url: &str, max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(),
            max_retries,
            initial_delay,
        }
    }

    /// Free-text address search.
    pub async fn search(&self, query: &str) -> Result<Vec<NominatimPlace>, FetchError> {
        let url = format!(
            "{}/search?q={}&format=json&addressdetails=1&limit=1",
            self.base_url,
            urlencoding::encode(query)
        );
        self.fetch_places(&url).await
    }

    /// Structured country lookup. Returns the country match with its
    /// bounding box rather than an arbitrary street-level hit.
    pub async fn search_country(&self, country: &str) -> Result<Vec<NominatimPlace>, FetchError> {
        let url = format!(
            "{}/search?country={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(country)
        );
        self.fetch_places(&url).await
    }

    async fn fetch_places(&self, url: &str) -> Result<Vec<NominatimPlace>, FetchError> {
        debug!(url, "querying geocoding service");
        let response =
            fetch_with_retry(&self.client, url, self.max_retries, self.initial_delay).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("application/json") {
            warn!(content_type, "non-JSON response from geocoding service");
            return Ok(Vec::new());
        }

        match response.json::<Vec<NominatimPlace>>().await {
            Ok(places) => Ok(places),
            Err(e) => {
                warn!(error = %e, "unparseable geocoding response body");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve every connection the same canned HTTP response.
    async fn spawn_one_response_server(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    fn json_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[tokio::test]
    async fn search_parses_result_array() {
        let body = r#"[{"lat":"40.0","lon":"-88.0","display_name":"10 Main St, Springfield"}]"#;
        let base_url = spawn_one_response_server(json_response(body)).await;
        let client = NominatimClient::with_retry(&base_url, 3, Duration::from_millis(1));

        let places = client.search("10 Main St, Springfield").await.unwrap();

        assert_eq!(places.len(), 1);
        assert_eq!(places[0].lat, "40.0");
        assert_eq!(places[0].lon, "-88.0");
        assert!(places[0].boundingbox.is_none());
    }

    #[tokio::test]
    async fn country_result_carries_bounding_box() {
        let body = r#"[{"lat":"15.0","lon":"105.0","boundingbox":["10","20","100","110"]}]"#;
        let base_url = spawn_one_response_server(json_response(body)).await;
        let client = NominatimClient::with_retry(&base_url, 3, Duration::from_millis(1));

        let places = client.search_country("Laos").await.unwrap();

        let bbox = places[0].boundingbox.as_ref().unwrap();
        assert_eq!(bbox[0], "10");
        assert_eq!(bbox[3], "110");
    }

    #[tokio::test]
    async fn non_json_response_degrades_to_empty() {
        let html = "<html>Blocked</html>";
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            html.len(),
            html
        );
        let base_url = spawn_one_response_server(response).await;
        let client = NominatimClient::with_retry(&base_url, 3, Duration::from_millis(1));

        let places = client.search("anything").await.unwrap();
        assert!(places.is_empty());
    }

    #[tokio::test]
    async fn garbled_json_body_degrades_to_empty() {
        let base_url = spawn_one_response_server(json_response(r#"[{"lat": "#)).await;
        let client = NominatimClient::with_retry(&base_url, 3, Duration::from_millis(1));

        let places = client.search("anything").await.unwrap();
        assert!(places.is_empty());
    }

    // Hits the public Nominatim API — run manually with --ignored.
    #[tokio::test]
    #[ignore]
    async fn live_search_finds_springfield() {
        let client = NominatimClient::new("https://nominatim.openstreetmap.org");
        let places = client.search("Springfield, Illinois").await.unwrap();
        assert!(!places.is_empty());
    }
}
