use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::TransferError;

/// Boxed response body stream
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// A response whose body has not been read yet
pub struct HttpResponse {
    pub status: u16,
    pub body: BoxStream<'static, Result<Bytes, TransferError>>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Minimal HTTP client seam.
///
/// One streamed GET with session defaults: no custom headers, no auth, no
/// retry. A non-success status is *not* an error here; the caller decides.
pub trait HttpClient: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, TransferError>> + Send;
}

/// Production client backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(TransferError::Client)?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransferError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransferError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let url = url.to_string();
        let body = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| TransferError::Stream {
                url: url.clone(),
                message: e.to_string(),
            })
        });

        Ok(HttpResponse {
            status,
            body: Box::pin(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_names_no_url() {
        let source = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();

        let message = TransferError::Client(source).to_string();
        assert!(message.starts_with("failed to build HTTP client: "));
        assert!(!message.contains("request to"));
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::new().is_ok());
    }
}
