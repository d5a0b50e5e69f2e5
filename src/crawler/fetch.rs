// src/crawler/fetch.rs
// =============================================================================
// Single-page HTTP GET with bounded timeouts.
//
// One shared reqwest client serves every worker (connection pooling). The
// connect timeout bounds the dial, the overall timeout bounds the handshake
// and the body read, so one unreachable host can never stall a crawl.
// Unverifiable TLS certificates are accepted: coverage over strictness.
// =============================================================================

use bytes::Bytes;
use futures::Stream;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use super::engine::CrawlerConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

// Builds the HTTP client shared by all workers of a crawler
pub fn build_client(config: &CrawlerConfig) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
}

// Performs one GET and hands back the body as a byte stream
//
// Transport failures and non-2xx statuses both surface as FetchError; the
// caller degrades the affected node instead of aborting the crawl.
pub async fn fetch(
    client: &Client,
    url: &str,
) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    Ok(response.bytes_stream())
}
