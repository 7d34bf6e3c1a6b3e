//! Conversation turns and their attachments.

pub mod attachment;
pub mod types;

pub use attachment::{
    AttachmentPolicy, ImageAttachment, ImageFormat, DEFAULT_ALLOWED_IMAGE_TYPES,
    DEFAULT_MAX_ATTACHMENT_BYTES,
};
pub use types::{Role, Turn, TurnContent};
