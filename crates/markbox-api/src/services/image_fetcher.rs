//! Remote image download for bookmark thumbnails and favicons.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use markbox_core::{create_slug, defaults, Error, Result};

/// Downloads the bytes behind an image URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct HttpImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_bytes })
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_bytes: defaults::MAX_IMAGE_BYTES,
        }
    }

    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self, url: &str) -> Error {
        Error::Request(format!("Image exceeds {} bytes: {}", self.max_bytes, url))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let start = std::time::Instant::now();
        let mut response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "Image fetch returned {}: {}",
                response.status(),
                url
            )));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(self.too_large(url));
        }

        // Content-Length may be absent or wrong, so count while streaming.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            bytes.extend_from_slice(&chunk);
        }
        debug!(
            url = %url,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched image"
        );
        Ok(bytes)
    }
}

/// File name for an image saved from `url`: `<slug(title)>.<extension>`.
///
/// The extension is the text after the last `.` of the final path segment.
/// Without one the name is the slug alone.
pub fn image_file_name(title: &str, url: &str) -> String {
    let mut stem = create_slug(title);
    if stem.is_empty() {
        stem = "image".to_string();
    }

    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("{}.{}", stem, ext),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve_image(server: &MockServer, route: &str, size: usize) -> String {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; size]))
            .mount(server)
            .await;
        format!("{}{}", server.uri(), route)
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_image() {
        let server = MockServer::start().await;
        let url = serve_image(&server, "/big.png", 2048).await;
        let fetcher = HttpImageFetcher::new(Duration::from_secs(5), 1024).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::Request(ref msg) if msg.contains("exceeds 1024 bytes")));
    }

    #[tokio::test]
    async fn test_fetch_accepts_image_at_limit() {
        let server = MockServer::start().await;
        let url = serve_image(&server, "/ok.png", 1024).await;
        let fetcher = HttpImageFetcher::with_client(Client::new()).max_bytes(1024);

        assert_eq!(fetcher.fetch(&url).await.unwrap().len(), 1024);
    }

    #[test]
    fn test_image_file_name_uses_url_extension() {
        assert_eq!(
            image_file_name("Hello World", "https://cdn.example.com/a/b/photo.large.jpg"),
            "hello-world.jpg"
        );
    }

    #[test]
    fn test_image_file_name_ignores_query_and_fragment() {
        assert_eq!(
            image_file_name("Post", "https://example.com/img.png?w=300#top"),
            "post.png"
        );
    }

    #[test]
    fn test_image_file_name_without_extension() {
        assert_eq!(image_file_name("Post", "https://example.com/favicon"), "post");
        assert_eq!(image_file_name("Post", "https://example.com/"), "post");
        assert_eq!(image_file_name("!!!", "https://example.com/i.gif"), "image.gif");
    }
}
