use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bongchun_llm::Part;

use crate::error::AttachmentError;

/// An image that passed validation, ready to send inline.
#[derive(Clone)]
pub struct InlineImage {
    pub path: PathBuf,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineImage")
            .field("path", &self.path)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl InlineImage {
    #[must_use]
    pub fn to_part(&self) -> Part {
        Part::inline_data(self.mime_type.clone(), STANDARD.encode(&self.data))
    }
}

/// Check that `path` is an existing image file and load it.
///
/// The MIME type is guessed from the extension and must be `image/*`; the
/// bytes must then decode as an image.
///
/// # Errors
///
/// Returns an `AttachmentError` describing the first check that failed.
pub fn load_image(path: &Path) -> Result<InlineImage, AttachmentError> {
    let metadata = std::fs::metadata(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            AttachmentError::NotFound {
                path: path.to_owned(),
            }
        } else {
            AttachmentError::Read {
                path: path.to_owned(),
                source,
            }
        }
    })?;
    if !metadata.is_file() {
        return Err(AttachmentError::NotAFile {
            path: path.to_owned(),
        });
    }

    let mime = mime_guess::from_path(path).first();
    let mime_type = match mime {
        Some(m) if m.type_() == mime_guess::mime::IMAGE => m.essence_str().to_owned(),
        other => {
            return Err(AttachmentError::NotAnImage {
                path: path.to_owned(),
                mime: other.map_or_else(|| "unknown".to_owned(), |m| m.essence_str().to_owned()),
            });
        }
    };

    let data = std::fs::read(path).map_err(|source| AttachmentError::Read {
        path: path.to_owned(),
        source,
    })?;
    let decoded = image::load_from_memory(&data).map_err(|source| AttachmentError::Decode {
        path: path.to_owned(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        mime_type,
        width = decoded.width(),
        height = decoded.height(),
        "attachment validated"
    );

    Ok(InlineImage {
        path: path.to_owned(),
        mime_type,
        data,
    })
}

/// [`load_image`] on the blocking pool.
///
/// # Errors
///
/// Same as [`load_image`].
pub async fn load_image_async(path: PathBuf) -> Result<InlineImage, AttachmentError> {
    tokio::task::spawn_blocking(move || load_image(&path))
        .await
        .map_err(|_| AttachmentError::Interrupted)?
}
