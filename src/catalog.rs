//! Browse MCP servers from the catalog endpoint.

use std::time::Duration;

use tracing::debug;

use crate::models::{CatalogPage, CatalogServer};

/// Entries requested per catalog query.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

fn build_http_client() -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("mcp-installer/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(30))
        .build()
}

/// Query parameters for one catalog request. A blank query is omitted.
pub fn query_params(query: Option<&str>, page_size: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![("pageSize", page_size.to_string())];
    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
        params.push(("q", q.to_string()));
    }
    params
}

/// Fetch one page of servers matching `query`.
pub fn fetch_servers(
    url: &str,
    query: Option<&str>,
    page_size: u32,
) -> Result<Vec<CatalogServer>, CatalogError> {
    let client = build_http_client().map_err(CatalogError::HttpClient)?;
    let params = query_params(query, page_size);
    debug!(url, ?params, "fetching catalog");

    let fetch = || -> Result<CatalogPage, reqwest::Error> {
        client
            .get(url)
            .query(&params)
            .send()?
            .error_for_status()?
            .json()
    };
    let page = fetch().map_err(|cause| CatalogError::FetchFailed {
        url: url.to_string(),
        cause,
    })?;
    Ok(page.servers)
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to fetch {url}: {cause}")]
    FetchFailed {
        url: String,
        #[source]
        cause: reqwest::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_always_sent() {
        assert_eq!(query_params(None, 20), vec![("pageSize", "20".to_string())]);
    }

    #[test]
    fn blank_query_is_omitted() {
        assert_eq!(query_params(Some("   "), 5).len(), 1);
    }

    #[test]
    fn query_is_trimmed() {
        let params = query_params(Some(" weather "), DEFAULT_PAGE_SIZE);
        assert_eq!(params[1], ("q", "weather".to_string()));
    }
}
