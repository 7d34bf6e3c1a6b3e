//! Token counting for budget management.
//!
//! [`TiktokenCounter`] uses the BPE tables of the target model family via
//! `tiktoken-rs`. [`HeuristicTokenCounter`] is a deterministic chars/4
//! estimate for offline use and as a fallback.

use std::sync::{Arc, OnceLock};

use tiktoken_rs::CoreBPE;

use crate::turn::TurnContent;

/// Tokens charged per image attachment (low-detail image cost of the GPT-4o family).
pub const IMAGE_TOKEN_ESTIMATE: u32 = 85;

/// Fixed framing cost of one chat message (role marker and separators).
pub const TOKENS_PER_TURN: u32 = 3;

/// Trait for token counting implementations.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a plain text string.
    fn count_text(&self, text: &str) -> u32;

    /// Count tokens for a whole turn body, including framing and images.
    fn count_content(&self, content: &TurnContent) -> u32;
}

/// Arc-wrapped token counter for easy sharing.
pub type SharedTokenCounter = Arc<dyn TokenCounter>;

/// BPE encodings the counter knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// GPT-4o, GPT-4.1, o-series
    O200kBase,
    /// GPT-4, GPT-3.5 Turbo
    Cl100kBase,
}

impl Encoding {
    /// Pick the encoding for a model identifier. Unknown models get the
    /// newest encoding.
    pub fn for_model(model: &str) -> Self {
        let model = model.trim().to_ascii_lowercase();
        if model.starts_with("gpt-4o") || model.starts_with("gpt-4.") {
            return Self::O200kBase;
        }
        if model == "gpt-4" || model.starts_with("gpt-4-") || model.starts_with("gpt-3.5") {
            return Self::Cl100kBase;
        }
        Self::O200kBase
    }

    /// Cached BPE table, loaded once per process. `None` if loading failed.
    fn bpe(&self) -> Option<&'static CoreBPE> {
        static O200K_BASE: OnceLock<Option<CoreBPE>> = OnceLock::new();
        static CL100K_BASE: OnceLock<Option<CoreBPE>> = OnceLock::new();

        match self {
            Self::O200kBase => {
                O200K_BASE.get_or_init(|| loaded("o200k_base", tiktoken_rs::o200k_base()))
            }
            Self::Cl100kBase => {
                CL100K_BASE.get_or_init(|| loaded("cl100k_base", tiktoken_rs::cl100k_base()))
            }
        }
        .as_ref()
    }
}

fn loaded<E: std::fmt::Display>(name: &str, result: Result<CoreBPE, E>) -> Option<CoreBPE> {
    match result {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            tracing::warn!(
                "Failed to initialize {} tokenizer, falling back to heuristic counting: {}",
                name,
                e
            );
            None
        }
    }
}

fn saturating_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn image_tokens(content: &TurnContent) -> u32 {
    saturating_len(content.images().len()).saturating_mul(IMAGE_TOKEN_ESTIMATE)
}

/// Count tokens in `text` with the GPT-4o family tokenizer (`o200k_base`).
///
/// Pure and deterministic; the BPE table is cached globally after first use.
pub fn count_tokens(text: &str) -> u32 {
    TiktokenCounter::new(Encoding::O200kBase).count_text(text)
}

/// BPE token counter matching the model's own tokenizer.
#[derive(Debug, Clone, Copy)]
pub struct TiktokenCounter {
    encoding: Encoding,
}

impl TiktokenCounter {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    pub fn for_model(model: &str) -> Self {
        Self::new(Encoding::for_model(model))
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Default for TiktokenCounter {
    fn default() -> Self {
        Self::new(Encoding::O200kBase)
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        match self.encoding.bpe() {
            Some(bpe) => saturating_len(bpe.encode_with_special_tokens(text).len()),
            None => HeuristicTokenCounter::new(4.0, 1.0, 0).count_text(text),
        }
    }

    fn count_content(&self, content: &TurnContent) -> u32 {
        self.count_text(content.text().unwrap_or_default())
            .saturating_add(TOKENS_PER_TURN)
            .saturating_add(image_tokens(content))
    }
}

/// Heuristic token counter using character-based estimation.
///
/// Uses the approximation: tokens ≈ characters / 4, with a 10% safety margin
/// plus additional overhead for message metadata.
#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    /// Characters per token ratio (default: 4)
    chars_per_token: f64,
    /// Safety margin multiplier (default: 1.1 = 10% extra)
    safety_margin: f64,
    /// Metadata overhead per turn in tokens
    metadata_overhead: u32,
}

impl HeuristicTokenCounter {
    /// Create a new heuristic counter with custom parameters.
    pub fn new(chars_per_token: f64, safety_margin: f64, metadata_overhead: u32) -> Self {
        Self {
            chars_per_token,
            safety_margin,
            metadata_overhead,
        }
    }

    /// Create with default parameters (chars/4 + 10% margin + 10 metadata overhead).
    pub fn with_defaults() -> Self {
        Self::new(4.0, 1.1, 10)
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }

        let char_count = text.chars().count() as f64;
        let base_tokens = char_count / self.chars_per_token;
        let adjusted_tokens = base_tokens * self.safety_margin;

        adjusted_tokens.ceil() as u32
    }

    fn count_content(&self, content: &TurnContent) -> u32 {
        self.count_text(content.text().unwrap_or_default())
            .saturating_add(self.metadata_overhead)
            .saturating_add(image_tokens(content))
    }
}
