//! Request attachments: images become vision parts, documents become text
//! appended to the user message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use lexia_config::AttachmentConfig;
use lexia_core::{Attachment, AttachmentKind, ContentPart, ImageUrl, MessageContent, estimate_tokens};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

/// Turns downloaded document bytes into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// UTF-8 text documents, decoded lossily.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// PDF documents, text pulled from every page in order.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        // The decoder panics on some malformed documents.
        let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| anyhow::anyhow!("PDF decoder crashed on this document"))?;
        let text = extracted.map_err(|e| anyhow::anyhow!("Failed to extract PDF text: {e}"))?;
        Ok(text.trim().to_string())
    }
}

/// Accept only absolute http(s) URLs.
pub fn validate_url(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw.trim()).with_context(|| format!("Invalid URL: {raw}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("Only http and https URLs are supported: {raw}");
    }
    Ok(parsed)
}

/// Heading placed above extracted document text.
#[must_use]
pub const fn content_label(kind: AttachmentKind) -> &'static str {
    match kind {
        AttachmentKind::Pdf => "PDF Content",
        AttachmentKind::Image | AttachmentKind::Text => "File Content",
    }
}

/// Downloads attachments and merges them into the current user message.
///
/// Text and PDF documents are handled out of the box; other extractors can
/// be swapped in with [`AttachmentLoader::with_extractor`].
pub struct AttachmentLoader {
    client: Client,
    max_bytes: usize,
    extractors: HashMap<AttachmentKind, Arc<dyn TextExtractor>>,
}

impl AttachmentLoader {
    pub fn new(max_bytes: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let mut extractors: HashMap<AttachmentKind, Arc<dyn TextExtractor>> = HashMap::new();
        extractors.insert(AttachmentKind::Text, Arc::new(PlainTextExtractor));
        extractors.insert(AttachmentKind::Pdf, Arc::new(PdfExtractor));

        Ok(Self {
            client,
            max_bytes,
            extractors,
        })
    }

    pub fn from_config(config: &AttachmentConfig) -> Result<Self> {
        Self::new(config.max_bytes, Duration::from_secs(config.timeout_secs))
    }

    #[must_use]
    pub fn with_extractor(mut self, kind: AttachmentKind, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractors.insert(kind, extractor);
        self
    }

    #[must_use]
    pub fn supports(&self, kind: AttachmentKind) -> bool {
        kind == AttachmentKind::Image || self.extractors.contains_key(&kind)
    }

    /// Download the body, failing once it grows past the size cap.
    pub async fn download(&self, raw_url: &str) -> Result<Vec<u8>> {
        let url = validate_url(raw_url)?;
        debug!("Downloading attachment: {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?
            .error_for_status()?;

        if let Some(len) = response.content_length() {
            if !usize::try_from(len).is_ok_and(|len| len <= self.max_bytes) {
                anyhow::bail!(
                    "Attachment too large: {len} bytes (max: {})",
                    self.max_bytes
                );
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read attachment")?;
            if body.len() + chunk.len() > self.max_bytes {
                anyhow::bail!("Attachment too large: exceeds {} bytes", self.max_bytes);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    /// Download a document attachment and extract its text.
    pub async fn extract_text(&self, attachment: &Attachment) -> Result<String> {
        let extractor = self.extractors.get(&attachment.kind).ok_or_else(|| {
            anyhow::anyhow!(
                "No text extractor registered for {:?} attachments",
                attachment.kind
            )
        })?;

        let bytes = self.download(&attachment.url).await?;
        let text = extractor.extract(&bytes)?;
        info!(
            "Attachment text extracted. Length: {} characters",
            text.chars().count()
        );
        Ok(text)
    }

    /// Content for the current user message with `attachment` applied.
    pub async fn apply(&self, attachment: &Attachment, message: &str) -> Result<MessageContent> {
        if attachment.kind == AttachmentKind::Image {
            validate_url(&attachment.url)?;
            let url = attachment.url.clone();
            info!("Image attached: {url}");
            return Ok(MessageContent::Parts(vec![
                ContentPart::Text {
                    text: message.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                },
            ]));
        }

        let text = self.extract_text(attachment).await?;
        let combined = format!("{message}\n\n{}:\n{text}", content_label(attachment.kind));
        info!(
            "Attachment content added to request. Estimated tokens: {}",
            estimate_tokens(&combined)
        );
        Ok(MessageContent::Text(combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation() {
        assert!(validate_url("https://example.com/a.pdf").is_ok());
        assert!(validate_url("http://localhost:8080/x").is_ok());
        assert!(validate_url("ftp://example.com/a.pdf").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn labels() {
        assert_eq!(content_label(AttachmentKind::Pdf), "PDF Content");
        assert_eq!(content_label(AttachmentKind::Text), "File Content");
    }

    #[test]
    fn supported_kinds() -> Result<()> {
        let loader = AttachmentLoader::new(1024, Duration::from_secs(1))?;
        assert!(loader.supports(AttachmentKind::Image));
        assert!(loader.supports(AttachmentKind::Text));
        assert!(loader.supports(AttachmentKind::Pdf));
        Ok(())
    }

    #[tokio::test]
    async fn image_attachment_becomes_parts() -> Result<()> {
        let loader = AttachmentLoader::new(1024, Duration::from_secs(1))?;
        let attachment = Attachment {
            url: "https://example.com/cat.png".to_string(),
            kind: AttachmentKind::Image,
        };

        let content = loader.apply(&attachment, "what is this?").await?;
        assert_eq!(
            content,
            MessageContent::Parts(vec![
                ContentPart::Text {
                    text: "what is this?".to_string()
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "https://example.com/cat.png".to_string()
                    }
                },
            ])
        );
        Ok(())
    }

    #[tokio::test]
    async fn image_url_is_forwarded_unchanged() -> Result<()> {
        let loader = AttachmentLoader::new(1024, Duration::from_secs(1))?;
        let raw = "https://Example.com/a b.png";
        let attachment = Attachment {
            url: raw.to_string(),
            kind: AttachmentKind::Image,
        };

        let MessageContent::Parts(parts) = loader.apply(&attachment, "hi").await? else {
            panic!("image attachment should produce parts");
        };
        assert_eq!(
            parts[1],
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: raw.to_string()
                }
            }
        );
        Ok(())
    }

    #[test]
    fn garbage_pdf_is_an_error() {
        assert!(PdfExtractor.extract(b"%PDF-1.7 not really").is_err());
    }
}
