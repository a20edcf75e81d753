//! HTTP(S) URL source.

use crate::io::sources::{ByteReader, ByteSource};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::collections::BTreeMap;
use tokio_util::io::StreamReader;

/// Fetches data from an HTTP(S) URL with a GET request.
///
/// Any status other than 200 is an error; the response body is dropped
/// before the error is returned.
pub struct UrlSource {
    url: String,
    headers: BTreeMap<String, String>,
}

impl UrlSource {
    /// Creates a new URL source with caller-supplied request headers.
    #[must_use]
    pub const fn new(url: String, headers: BTreeMap<String, String>) -> Self {
        Self { url, headers }
    }
}

#[async_trait]
impl ByteSource for UrlSource {
    async fn open(&self) -> Result<ByteReader> {
        let client = reqwest::Client::new();
        let mut request = client.get(&self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::op("fetch_url", format!("{}: {e}", self.url)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            // Dropping the response closes the body.
            return Err(Error::op(
                "fetch_url",
                format!("unexpected status code {} for {}", status.as_u16(), self.url),
            ));
        }

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single canned HTTP response, then closes.
    async fn one_shot_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/data.csv")
    }

    #[tokio::test]
    async fn test_fetches_body_on_200() {
        let url = one_shot_server(
            "HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\nq,a\n2+2,4\n",
        )
        .await;

        let source = UrlSource::new(url, BTreeMap::new());
        let mut reader = source.open().await.unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "q,a\n2+2,4\n");
    }

    #[tokio::test]
    async fn test_non_200_status_is_an_error() {
        let url = one_shot_server(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let source = UrlSource::new(url, BTreeMap::new());
        let err = match source.open().await {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("404"), "{err}");
    }
}
