//! Reading interpretation: prompt composition, model call, and fallback.
//!
//! [`generate`] makes exactly one call to a [`ChatModel`]. When no model is
//! configured, the call fails, or the reply cannot be parsed, it returns the
//! deterministic [`fallback_interpretation`] instead. Callers receive the
//! same [`Interpretation`] shape either way; the [`Provenance`] says which
//! path produced it.

pub mod parse;
pub mod prompt;
pub mod template;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{DrawnCard, Interpretation, Language, RetrievedChunk, Tone};
use crate::spread::SpreadType;

pub use parse::{extract_json_object, parse_model_output, ModelReply, ParseOutcome};
pub use template::fallback_interpretation;

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send one system + user exchange and return the assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Everything needed to interpret one reading.
#[derive(Debug, Clone)]
pub struct InterpretationRequest {
    pub question: String,
    pub spread: SpreadType,
    pub drawn_cards: Vec<DrawnCard>,
    pub tone: Tone,
    pub language: Language,
    pub focus_areas: Vec<String>,
}

/// Why the template was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    NoModel,
    CallFailed,
    Unparseable,
}

/// Which path produced an interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Model,
    Fallback(FallbackReason),
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Model => "model",
            Provenance::Fallback(FallbackReason::NoModel) => "fallback:no_model",
            Provenance::Fallback(FallbackReason::CallFailed) => "fallback:call_failed",
            Provenance::Fallback(FallbackReason::Unparseable) => "fallback:unparseable",
        }
    }
}

/// Result of [`generate`].
#[derive(Debug, Clone)]
pub struct Generated {
    pub interpretation: Interpretation,
    pub provenance: Provenance,
}

fn fallback(req: &InterpretationRequest, reason: FallbackReason) -> Generated {
    Generated {
        interpretation: fallback_interpretation(req),
        provenance: Provenance::Fallback(reason),
    }
}

/// Produce an interpretation for `req`, grounded on `context` when given.
pub async fn generate(
    model: Option<&dyn ChatModel>,
    req: &InterpretationRequest,
    context: &[RetrievedChunk],
) -> Generated {
    let Some(model) = model else {
        tracing::debug!("no chat model configured, using template interpretation");
        return fallback(req, FallbackReason::NoModel);
    };

    let system = prompt::system_prompt(req.tone, req.language, &req.focus_areas);
    let user = prompt::user_prompt(req, context);

    let reply = match model.complete(&system, &user).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(model = model.model_name(), error = %e, "interpretation call failed");
            return fallback(req, FallbackReason::CallFailed);
        }
    };

    match parse_model_output(&reply) {
        ParseOutcome::Parsed(parsed) => Generated {
            interpretation: Interpretation {
                overall: parsed.overall,
                cards: parsed.cards,
                synthesis: parsed.synthesis,
                tone: req.tone,
                generated_at: Utc::now(),
            },
            provenance: Provenance::Model,
        },
        ParseOutcome::Unparseable(reason) => {
            tracing::warn!(model = model.model_name(), %reason, "unusable interpretation reply");
            fallback(req, FallbackReason::Unparseable)
        }
    }
}
