use std::io;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Text,
    Image,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Text => "text",
            PayloadKind::Image => "image",
        }
    }
}

/// Where the message came from, used for logging and the reply.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    pub chat_id: i64,
    pub message_id: i64,
    pub username: Option<String>,
}

/// Downloaded image, deleted when released or dropped.
#[derive(Debug)]
pub struct ImageAttachment {
    path: TempPath,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: String,
}

impl ImageAttachment {
    pub fn new(path: TempPath, width: Option<u32>, height: Option<u32>) -> Self {
        Self { path, width, height, mime_type: "image/jpeg".to_owned() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Deletes the file now and reports a failure, unlike a silent drop.
    pub fn release(self) -> io::Result<()> {
        self.path.close()
    }
}

/// One inbound message, normalized. Consumed by a single dispatch.
#[derive(Debug)]
pub struct DispatchRequest {
    pub text: Option<String>,
    pub image: Option<ImageAttachment>,
    pub source: SourceMetadata,
}

impl DispatchRequest {
    pub fn text(text: impl Into<String>, source: SourceMetadata) -> Self {
        Self { text: Some(text.into()), image: None, source }
    }

    pub fn image(image: ImageAttachment, caption: Option<String>, source: SourceMetadata) -> Self {
        Self { text: caption, image: Some(image), source }
    }

    /// An image wins over text; `None` when there is nothing to publish.
    pub fn payload_kind(&self) -> Option<PayloadKind> {
        if self.image.is_some() {
            Some(PayloadKind::Image)
        } else if self.text.as_deref().is_some_and(|t| !t.trim().is_empty()) {
            Some(PayloadKind::Text)
        } else {
            None
        }
    }
}

/// Image bytes as handed to adapters, after the local file was read.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub bytes: Arc<Vec<u8>>,
    pub file_name: String,
    pub mime_type: String,
    /// public URL from the hosting collaborator, if the upload happened and succeeded
    pub hosted_url: Option<String>,
}

/// What every adapter of one dispatch publishes; shared read-only between tasks.
#[derive(Debug, Clone)]
pub struct PublishPayload {
    pub kind: PayloadKind,
    /// message text, or the caption for images
    pub text: Option<String>,
    pub image: Option<ImageData>,
}

impl PublishPayload {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_wins_over_text_and_blank_text_is_nothing() {
        let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
        let with_image = DispatchRequest::image(ImageAttachment::new(file, Some(1), Some(1)), Some("hi".into()), SourceMetadata::default());
        assert_eq!(with_image.payload_kind(), Some(PayloadKind::Image));

        assert_eq!(DispatchRequest::text("hello", SourceMetadata::default()).payload_kind(), Some(PayloadKind::Text));
        assert_eq!(DispatchRequest::text("  ", SourceMetadata::default()).payload_kind(), None);
    }

    #[test]
    fn release_deletes_the_file() {
        let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
        let attachment = ImageAttachment::new(file, None, None);
        let path = attachment.path().to_path_buf();
        assert!(path.exists());
        attachment.release().unwrap();
        assert!(!path.exists());
    }
}
