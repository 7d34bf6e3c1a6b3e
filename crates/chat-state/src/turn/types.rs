use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attachment::ImageAttachment;
use crate::budget::counter::TokenCounter;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a turn carries. Always non-empty: either text, images, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnContent {
    Text(String),
    Images(Vec<ImageAttachment>),
    Mixed {
        text: String,
        images: Vec<ImageAttachment>,
    },
}

impl TurnContent {
    /// Build content from an optional text and a list of already validated
    /// attachments. Blank text counts as no text.
    pub fn from_parts(
        text: Option<&str>,
        images: Vec<ImageAttachment>,
    ) -> Result<Self, ValidationError> {
        let text = text.map(str::trim).filter(|t| !t.is_empty());
        match (text, images.is_empty()) {
            (Some(text), true) => Ok(Self::Text(text.to_string())),
            (Some(text), false) => Ok(Self::Mixed {
                text: text.to_string(),
                images,
            }),
            (None, false) => Ok(Self::Images(images)),
            (None, true) => Err(ValidationError::EmptyContent),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Mixed { text, .. } => Some(text),
            Self::Images(_) => None,
        }
    }

    pub fn images(&self) -> &[ImageAttachment] {
        match self {
            Self::Text(_) => &[],
            Self::Images(images) | Self::Mixed { images, .. } => images,
        }
    }

    pub fn has_images(&self) -> bool {
        !self.images().is_empty()
    }

    /// Same attachments, different text. Used when text is rewritten before
    /// it leaves the process.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        let text = text.into();
        match self {
            Self::Text(_) => Self::Text(text),
            Self::Images(images) | Self::Mixed { images, .. } => Self::Mixed {
                text,
                images: images.clone(),
            },
        }
    }
}

impl From<String> for TurnContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for TurnContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// One message of the conversation. Immutable once built: the token count is
/// computed at construction and cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    id: String,
    role: Role,
    content: TurnContent,
    token_count: u32,
    created_at: DateTime<Utc>,
}

impl Turn {
    /// Build a turn, counting its tokens once with `counter`.
    pub fn new(role: Role, content: impl Into<TurnContent>, counter: &dyn TokenCounter) -> Self {
        let content = content.into();
        let token_count = counter.count_content(&content);
        Self::with_token_count(role, content, token_count)
    }

    /// Build a turn whose token count was computed elsewhere.
    pub fn with_token_count(role: Role, content: impl Into<TurnContent>, token_count: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            token_count,
            created_at: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>, counter: &dyn TokenCounter) -> Self {
        Self::new(Role::System, TurnContent::Text(text.into()), counter)
    }

    /// Build a user turn from raw input, validating that it is not empty.
    pub fn user(
        text: Option<&str>,
        images: Vec<ImageAttachment>,
        counter: &dyn TokenCounter,
    ) -> Result<Self, ValidationError> {
        let content = TurnContent::from_parts(text, images)?;
        Ok(Self::new(Role::User, content, counter))
    }

    pub fn assistant(text: impl Into<String>, counter: &dyn TokenCounter) -> Self {
        Self::new(Role::Assistant, TurnContent::Text(text.into()), counter)
    }

    /// A copy of this turn carrying different content. Identity and the
    /// cached token count are kept.
    pub fn with_content(&self, content: TurnContent) -> Self {
        Self {
            content,
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &TurnContent {
        &self.content
    }

    pub fn text(&self) -> Option<&str> {
        self.content.text()
    }

    pub fn token_count(&self) -> u32 {
        self.token_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
