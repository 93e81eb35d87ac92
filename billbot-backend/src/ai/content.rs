use crate::ai::runtime::AgentRuntime;
use crate::ai::types::ContentPart;
use crate::error::BotError;
use crate::media::IngestedPhoto;

/// Turns user text plus buffered photos into the agent's content parts.
pub struct ContentPartBuilder;

impl ContentPartBuilder {
    /// Upload each photo in arrival order, then emit one image part per upload
    /// followed by exactly one trailing text part.
    ///
    /// Uploads are sequential so the resulting file handles keep the photos'
    /// order; the first failed upload aborts the build.
    pub async fn build(
        runtime: &dyn AgentRuntime,
        text: &str,
        photos: Vec<IngestedPhoto>,
    ) -> Result<Vec<ContentPart>, BotError> {
        let mut parts = Vec::with_capacity(photos.len() + 1);

        for photo in photos {
            let IngestedPhoto {
                source_id,
                file_name,
                mime_type,
                bytes,
            } = photo;
            let size = bytes.len();
            let file_id = runtime.upload_file(bytes, &file_name, &mime_type).await?;
            log::debug!(
                "[WORKFLOW] Uploaded photo {} ({} bytes) as {}",
                source_id,
                size,
                file_id
            );
            parts.push(ContentPart::image(file_id));
        }

        parts.push(ContentPart::text(text));
        Ok(parts)
    }
}
