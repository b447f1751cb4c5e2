//! Shared HTTP plumbing for every REST upstream
//!
//! One client per process (user agent, gzip, timeout), plus a JSON GET helper
//! that classifies the two statuses every adapter treats specially:
//! 404 is "not found" (neutral) and 429 is "rate limited" (unchecked).

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

/// Outcome of an upstream GET that answered
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Found(T),
    NotFound,
    RateLimited,
}

/// Build HTTP client with custom headers and gzip
pub fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))
}

/// GET `url` with query parameters and decode the JSON body
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    service: &str,
    url: &str,
    query: &[(&str, String)],
) -> AppResult<Fetched<T>> {
    debug!(service, url, "GET");

    let response = client.get(url).query(query).send().await?;
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(Fetched::NotFound);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Ok(Fetched::RateLimited);
    }
    if !status.is_success() {
        return Err(AppError::upstream(format!("{} HTTP error: {}", service, status)));
    }

    let body = response.text().await?;
    let parsed = serde_json::from_str::<T>(&body).map_err(|e| {
        AppError::invalid_response(format!("{} returned unparseable body: {}", service, e))
    })?;
    Ok(Fetched::Found(parsed))
}

/// True when the service answers at all (any status below 500)
pub async fn probe(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(resp) => !resp.status().is_server_error(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Body {
        ok: bool,
    }

    fn client() -> reqwest::Client {
        build_client(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/found"))
            .and(query_param("a", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/limited"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let c = client();
        let found: Fetched<Body> =
            get_json(&c, "test", &format!("{}/found", server.uri()), &[("a", "1".to_string())])
                .await
                .unwrap();
        assert_eq!(found, Fetched::Found(Body { ok: true }));

        let missing: Fetched<Body> = get_json(&c, "test", &format!("{}/missing", server.uri()), &[])
            .await
            .unwrap();
        assert_eq!(missing, Fetched::NotFound);

        let limited: Fetched<Body> = get_json(&c, "test", &format!("{}/limited", server.uri()), &[])
            .await
            .unwrap();
        assert_eq!(limited, Fetched::RateLimited);

        let broken = get_json::<Body>(&c, "test", &format!("{}/broken", server.uri()), &[]).await;
        assert!(broken.is_err());
        assert!(probe(&c, &format!("{}/missing", server.uri())).await);
        assert!(!probe(&c, &format!("{}/broken", server.uri())).await);
    }
}
