//! Chart image delivery: turn a `ChartImage` into bytes that can be sent to
//! the chat, either by decoding inline base64 or by fetching its URL.

use crate::ai::types::ChartImage;
use crate::error::BotError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, header};
use url::Url;

/// Maximum number of redirects followed for a chart URL
pub const MAX_REDIRECTS: usize = 3;

const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Resolved chart, ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverableImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
    pub caption: Option<String>,
}

/// Strip an optional `data:<mime>;base64,` prefix.
fn strip_data_url(data: &str) -> &str {
    let data = data.trim();
    if data.starts_with("data:") {
        if let Some((_, payload)) = data.split_once(";base64,") {
            return payload.trim();
        }
    }
    data
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, BotError> {
    let payload = strip_data_url(data);
    if payload.is_empty() {
        return Err(BotError::NoImageData("base64 payload is empty".to_string()));
    }
    Ok(BASE64.decode(payload)?)
}

fn declared_mime(image: &ChartImage) -> String {
    let mime = image.mime_type.trim();
    if mime.is_empty() {
        DEFAULT_CONTENT_TYPE.to_string()
    } else {
        mime.to_string()
    }
}

pub struct ImageDeliveryResolver {
    client: Client,
}

impl Default for ImageDeliveryResolver {
    fn default() -> Self {
        Self::new(crate::http::no_redirect_client().clone())
    }
}

impl ImageDeliveryResolver {
    /// `client` must not follow redirects itself.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, image: &ChartImage) -> Result<DeliverableImage, BotError> {
        let (bytes, content_type) = self.resolve_bytes(image).await?;
        Ok(DeliverableImage {
            bytes,
            content_type,
            file_name: image.file_name.clone(),
            caption: image.caption.clone(),
        })
    }

    async fn resolve_bytes(&self, image: &ChartImage) -> Result<(Vec<u8>, String), BotError> {
        if let Some(data) = image.base64_data.as_deref().filter(|_| image.has_base64()) {
            match decode_base64(data) {
                Ok(bytes) => return Ok((bytes, declared_mime(image))),
                Err(e) if image.has_url() => {
                    log::warn!(
                        "[DELIVERY] {}: inline base64 unusable ({}), falling back to URL",
                        image.file_name,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(url) = image.image_url.as_deref().filter(|_| image.has_url()) {
            let (bytes, content_type) = self.fetch(url.trim()).await?;
            return Ok((bytes, content_type.unwrap_or_else(|| declared_mime(image))));
        }

        Err(BotError::NoImageData(format!(
            "{} has neither base64 data nor an image URL",
            image.file_name
        )))
    }

    /// GET `url`, following at most `MAX_REDIRECTS` redirects by hand.
    ///
    /// Returns the body and the response's declared content type, if any.
    pub async fn fetch(&self, url: &str) -> Result<(Vec<u8>, Option<String>), BotError> {
        let mut current = Url::parse(url)
            .map_err(|e| BotError::Download(format!("invalid chart URL {}: {}", url, e)))?;
        let mut redirects = 0;

        loop {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let Some(location) = location else {
                    return Err(BotError::Download(format!(
                        "{} returned HTTP {} without a Location header",
                        current, status
                    )));
                };
                if redirects >= MAX_REDIRECTS {
                    return Err(BotError::TooManyRedirects {
                        url: url.to_string(),
                        limit: MAX_REDIRECTS,
                    });
                }
                redirects += 1;
                current = current.join(&location).map_err(|e| {
                    BotError::Download(format!("bad redirect location {}: {}", location, e))
                })?;
                log::debug!("[DELIVERY] Redirect {} -> {}", redirects, current);
                continue;
            }

            if status.as_u16() >= 400 {
                return Err(BotError::Download(format!(
                    "{} returned HTTP {}",
                    current, status
                )));
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
                .filter(|v| !v.is_empty());
            let bytes = response.bytes().await?.to_vec();

            log::debug!(
                "[DELIVERY] Fetched {} ({} bytes after {} redirect(s))",
                current,
                bytes.len(),
                redirects
            );
            return Ok((bytes, content_type));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubResponse, serve};

    fn chart(base64_data: Option<&str>, image_url: Option<String>) -> ChartImage {
        ChartImage {
            file_name: "bar_chart.png".to_string(),
            mime_type: "image/png".to_string(),
            base64_data: base64_data.map(str::to_string),
            image_url,
            caption: Some("本月开销".to_string()),
        }
    }

    fn resolver() -> ImageDeliveryResolver {
        ImageDeliveryResolver::new(
            Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("client"),
        )
    }

    #[tokio::test]
    async fn test_data_url_prefix_is_stripped() {
        let with_prefix = resolver()
            .resolve(&chart(Some("data:image/png;base64,AAAA"), None))
            .await
            .expect("resolve");
        let bare = resolver()
            .resolve(&chart(Some("AAAA"), None))
            .await
            .expect("resolve");

        assert_eq!(with_prefix.bytes, bare.bytes);
        assert_eq!(with_prefix.bytes, vec![0, 0, 0]);
        assert_eq!(with_prefix.content_type, "image/png");
        assert_eq!(with_prefix.file_name, "bar_chart.png");
        assert_eq!(with_prefix.caption.as_deref(), Some("本月开销"));
    }

    #[tokio::test]
    async fn test_no_usable_field() {
        let err = resolver()
            .resolve(&chart(Some("   "), Some(" ".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::NoImageData(_)));

        let err = resolver().resolve(&chart(None, None)).await.unwrap_err();
        assert!(matches!(err, BotError::NoImageData(_)));
    }

    #[tokio::test]
    async fn test_invalid_base64_without_url() {
        let err = resolver()
            .resolve(&chart(Some("not base64 !!"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::ImageDecode(_)));
    }

    #[tokio::test]
    async fn test_invalid_base64_falls_back_to_url() {
        let server = serve(vec![
            StubResponse::ok(b"png-bytes".to_vec()).with_header("Content-Type", "image/jpeg"),
        ])
        .await;
        let image = resolver()
            .resolve(&chart(Some("not base64 !!"), Some(server.url("/c.png"))))
            .await
            .expect("resolve");
        assert_eq!(image.bytes, b"png-bytes".to_vec());
        assert_eq!(image.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_url_fetch_uses_declared_mime_when_header_missing() {
        let server = serve(vec![StubResponse::ok(b"chart".to_vec())]).await;
        let mut image = chart(None, Some(server.url("/c.webp")));
        image.mime_type = "image/webp".to_string();

        let resolved = resolver().resolve(&image).await.expect("resolve");
        assert_eq!(resolved.bytes, b"chart".to_vec());
        assert_eq!(resolved.content_type, "image/webp");
    }

    #[tokio::test]
    async fn test_content_type_parameters_are_dropped() {
        let server = serve(vec![
            StubResponse::ok(b"chart".to_vec()).with_header("Content-Type", "image/png; charset=binary"),
        ])
        .await;
        let (_, content_type) = resolver().fetch(&server.url("/c.png")).await.expect("fetch");
        assert_eq!(content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_three_redirects_succeed() {
        let server = serve(vec![
            StubResponse::redirect("/r1"),
            StubResponse::redirect("/r2"),
            StubResponse::redirect("/r3"),
            StubResponse::ok(b"final".to_vec()),
        ])
        .await;

        let (bytes, _) = resolver().fetch(&server.url("/start")).await.expect("fetch");
        assert_eq!(bytes, b"final".to_vec());

        let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/start", "/r1", "/r2", "/r3"]);
    }

    #[tokio::test]
    async fn test_four_redirects_fail() {
        let server = serve(vec![
            StubResponse::redirect("/r1"),
            StubResponse::redirect("/r2"),
            StubResponse::redirect("/r3"),
            StubResponse::redirect("/r4"),
            StubResponse::ok(b"never".to_vec()),
        ])
        .await;

        let err = resolver()
            .resolve(&chart(None, Some(server.url("/start"))))
            .await
            .unwrap_err();
        match err {
            BotError::TooManyRedirects { limit, .. } => assert_eq!(limit, MAX_REDIRECTS),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(server.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = serve(vec![StubResponse::status(404, "Not Found", "missing")]).await;
        let err = resolver()
            .resolve(&chart(None, Some(server.url("/missing.png"))))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Download(_)));
    }

    #[tokio::test]
    async fn test_redirect_without_location_fails() {
        let server = serve(vec![StubResponse::status(302, "Found", Vec::new())]).await;
        let err = resolver()
            .resolve(&chart(None, Some(server.url("/moved.png"))))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Download(ref m) if m.contains("Location")));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_redirect_to_error_status() {
        let server = serve(vec![
            StubResponse::redirect("/gone"),
            StubResponse::status(500, "Internal Server Error", "oops"),
        ])
        .await;
        let err = resolver().fetch(&server.url("/start")).await.unwrap_err();
        assert!(matches!(err, BotError::Download(_)));
    }
}
