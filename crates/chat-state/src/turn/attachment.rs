//! Image attachments and the policy that admits them.

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default maximum attachment size: 5 MiB.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

/// Attachment types accepted unless configured otherwise.
pub const DEFAULT_ALLOWED_IMAGE_TYPES: &[&str] = &["jpg", "jpeg", "png"];

/// Image formats the model API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Parse a declared type, either an extension (`png`, `.JPG`) or a MIME
    /// type (`image/jpeg`). Returns `None` for anything unrecognised.
    pub fn parse(declared: &str) -> Option<Self> {
        let normalized = declared.trim().to_ascii_lowercase();
        let subtype = normalized
            .rsplit('/')
            .next()
            .unwrap_or(&normalized)
            .trim_start_matches('.');

        match subtype {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Subtype used in `data:image/<subtype>;base64,` URLs.
    pub fn subtype(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subtype())
    }
}

/// Size and format constraints applied to every attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPolicy {
    pub max_bytes: usize,
    /// Declared types accepted, as lowercase extensions.
    pub allowed_types: Vec<String>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            allowed_types: DEFAULT_ALLOWED_IMAGE_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl AttachmentPolicy {
    pub fn new(max_bytes: usize, allowed_types: Vec<String>) -> Self {
        Self {
            max_bytes,
            allowed_types: allowed_types
                .into_iter()
                .map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    fn allows(&self, declared: &str) -> bool {
        let normalized = declared.trim().to_ascii_lowercase();
        let subtype = normalized
            .rsplit('/')
            .next()
            .unwrap_or(&normalized)
            .trim_start_matches('.');
        self.allowed_types.iter().any(|t| t == subtype)
    }

    /// Check a payload against this policy and resolve its format.
    pub fn check(
        &self,
        name: &str,
        declared_type: &str,
        size: usize,
    ) -> Result<ImageFormat, ValidationError> {
        let format = ImageFormat::parse(declared_type)
            .filter(|_| self.allows(declared_type))
            .ok_or_else(|| ValidationError::UnsupportedFormat {
                name: name.to_string(),
                format: declared_type.trim().to_string(),
                allowed: self.allowed_types.join(", "),
            })?;

        if size > self.max_bytes {
            return Err(ValidationError::AttachmentTooLarge {
                name: name.to_string(),
                size,
                max: self.max_bytes,
            });
        }

        Ok(format)
    }
}

/// A validated image payload. Can only be built through a policy check.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    name: String,
    format: ImageFormat,
    data: Bytes,
}

impl ImageAttachment {
    pub fn new(
        name: impl Into<String>,
        declared_type: &str,
        data: impl Into<Bytes>,
        policy: &AttachmentPolicy,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let data = data.into();
        let format = policy.check(&name, declared_type, data.len())?;
        Ok(Self { name, format, data })
    }

    /// Read an image from disk, taking the declared type from its extension.
    pub fn from_path(path: &Path, policy: &AttachmentPolicy) -> Result<Self, ValidationError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();

        // Reject on metadata first so an oversized file is never read.
        let metadata = std::fs::metadata(path).map_err(|e| ValidationError::Unreadable {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        policy.check(&name, &extension, size)?;

        let data = std::fs::read(path).map_err(|e| ValidationError::Unreadable {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        Self::new(name, &extension, data, policy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("size", &self.data.len())
            .finish()
    }
}
