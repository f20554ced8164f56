//! Extraction of the interpretation JSON from free-form model output.
//!
//! Models are asked for a bare JSON object but often wrap it in prose or
//! markdown fences. [`extract_json_object`] finds the first balanced
//! `{ ... }` span, ignoring braces inside string literals, and
//! [`parse_model_output`] decodes it into the expected shape. Anything else
//! is reported as [`ParseOutcome::Unparseable`].

use std::collections::BTreeMap;

use serde::Deserialize;

/// Fields the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelReply {
    pub overall: String,
    #[serde(default)]
    pub cards: BTreeMap<String, String>,
    pub synthesis: String,
}

/// Result of [`parse_model_output`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(ModelReply),
    /// The reason the output was rejected.
    Unparseable(String),
}

/// Return the first balanced-brace substring of `text`.
///
/// Braces inside JSON string literals (including escaped quotes) do not
/// count. Returns `None` when no `{` exists or the object never closes.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode model output into a [`ModelReply`].
pub fn parse_model_output(text: &str) -> ParseOutcome {
    let Some(object) = extract_json_object(text) else {
        return ParseOutcome::Unparseable("no JSON object in model output".to_string());
    };
    let reply: ModelReply = match serde_json::from_str(object) {
        Ok(r) => r,
        Err(e) => return ParseOutcome::Unparseable(format!("invalid interpretation JSON: {}", e)),
    };
    if reply.overall.trim().is_empty() || reply.synthesis.trim().is_empty() {
        return ParseOutcome::Unparseable("empty overall or synthesis".to_string());
    }
    ParseOutcome::Parsed(reply)
}
