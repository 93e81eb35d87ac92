//! Inbound photo ingestion: pick the best resolution, download it from the chat
//! transport and keep it in memory until the chat sends its accompanying text.

use crate::channels::transport::ChatTransport;
use crate::channels::types::PhotoVariant;
use crate::error::BotError;

/// A photo downloaded from the chat transport, owned by the pending buffer
/// until it is uploaded to the agent runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedPhoto {
    pub source_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Choose the variant with the largest pixel area. Ties keep the first seen.
pub fn select_largest(variants: &[PhotoVariant]) -> Option<&PhotoVariant> {
    variants.iter().fold(None, |best: Option<&PhotoVariant>, candidate| match best {
        Some(current) if current.area() >= candidate.area() => Some(current),
        _ => Some(candidate),
    })
}

/// Guess a MIME type from a file name's extension.
pub fn guess_mime_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Last path segment of the resolved file path, or `<id>.jpg`.
fn file_name_for(path: &str, source_id: &str) -> String {
    path.rsplit('/')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.jpg", source_id))
}

pub struct PhotoIngestor {
    client: reqwest::Client,
}

impl PhotoIngestor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download one photo variant into memory.
    pub async fn download(
        &self,
        transport: &dyn ChatTransport,
        variant: &PhotoVariant,
    ) -> Result<IngestedPhoto, BotError> {
        let resolved = transport.resolve_file(&variant.file_id).await.map_err(|e| {
            BotError::Download(format!("cannot resolve file {}: {}", variant.file_id, e))
        })?;

        log::debug!("[PHOTO] Fetching {} (path {})", variant.file_id, resolved.path);

        let response = self.client.get(&resolved.url).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(BotError::Download(format!(
                "photo {} returned HTTP {}",
                variant.file_id, status
            )));
        }
        let bytes = response.bytes().await?.to_vec();

        let file_name = file_name_for(&resolved.path, &variant.file_id);
        let mime_type = guess_mime_type(&file_name).to_string();

        log::info!(
            "[PHOTO] Downloaded {} ({} bytes, {})",
            file_name,
            bytes.len(),
            mime_type
        );

        Ok(IngestedPhoto {
            source_id: variant.file_id.clone(),
            file_name,
            mime_type,
            bytes,
        })
    }
}
