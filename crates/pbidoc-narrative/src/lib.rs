//! pbidoc narrative enrichment
//!
//! The port through which report-model fragments are turned into prose by an
//! external text generator (Gemini, OpenAI, Anthropic, Ollama, or a mock).
//!
//! ```text
//!   ReportModel ──► fragments / JSON ──► Narrator::summarize ──► TextGenerator
//!                                              │
//!                                   error / empty / panic
//!                                              ▼
//!                                        fallback text
//! ```
//!
//! Narrative is best effort. [`Narrator::summarize`] always returns non-empty
//! text; a failing generator degrades the document, it never stops it.

pub mod enrich;
pub mod error;
pub mod fragments;
pub mod prompts;
pub mod providers;

pub use enrich::{enrich, ContentBlock, EnrichOptions, Narration, NarrativeMode, SectionTitles};
pub use error::NarrativeError;
pub use prompts::{render_prompt, NarrativeKind};
pub use providers::{create_generator, MockGenerator, MockReply, ProviderConfig, ProviderKind};

use std::panic::{catch_unwind, AssertUnwindSafe};

/// Text returned when the generator fails.
pub const FALLBACK_ON_ERROR: &str = "AI analysis unavailable due to an error.";

/// Text returned when the generator answers with nothing.
pub const FALLBACK_ON_EMPTY: &str = "No response from AI.";

/// Text in, text out. Transport, authentication and retries are the
/// implementation's business.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, NarrativeError>;

    /// Short label for logs.
    fn label(&self) -> &str;
}

/// The narrative port: renders the prompt for a kind and shields callers from
/// every generator failure.
pub struct Narrator<'g> {
    generator: &'g dyn TextGenerator,
}

impl<'g> Narrator<'g> {
    pub fn new(generator: &'g dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// Summarize a serialized fragment. Never fails and never returns empty text.
    pub fn summarize(&self, payload: &str, kind: NarrativeKind) -> String {
        let prompt = render_prompt(kind, payload);
        let outcome = catch_unwind(AssertUnwindSafe(|| self.generator.generate(&prompt)));

        match outcome {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::warn!(generator = self.generator.label(), kind = kind.as_str(), "empty narrative response");
                    FALLBACK_ON_EMPTY.to_string()
                } else {
                    text.to_string()
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(generator = self.generator.label(), kind = kind.as_str(), error = %err, "narrative call failed");
                FALLBACK_ON_ERROR.to_string()
            }
            Err(_) => {
                tracing::error!(generator = self.generator.label(), kind = kind.as_str(), "narrative generator panicked");
                FALLBACK_ON_ERROR.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_is_trimmed() {
        let gen = MockGenerator::always("  A sales overview page.\n");
        let narrator = Narrator::new(&gen);
        assert_eq!(narrator.summarize("p", NarrativeKind::Page), "A sales overview page.");
    }

    #[test]
    fn whitespace_only_is_empty() {
        let gen = MockGenerator::always(" \n\t");
        assert_eq!(
            Narrator::new(&gen).summarize("p", NarrativeKind::Table),
            FALLBACK_ON_EMPTY
        );
    }

    #[test]
    fn prompt_carries_instruction_and_payload() {
        let gen = MockGenerator::always("ok");
        Narrator::new(&gen).summarize("Table name: Sales", NarrativeKind::Table);
        let prompts = gen.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Analyze the structure of the following table"));
        assert!(prompts[0].ends_with("Table name: Sales"));
    }
}
