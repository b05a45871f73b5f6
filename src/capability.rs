//! Model capability classification.
//!
//! Backend model generations accept mutually incompatible request parameters;
//! sending the wrong token-limit field or an unsupported control is a hard
//! backend error. Every completion request is therefore shaped from the model
//! identifier's class before it is built.

use crate::models::{ChatRequest, ReasoningEffort, Verbosity};

/// Older models that still take `max_tokens`.
const LEGACY_MODELS: &[&str] = &["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo"];

/// Prefixes of reasoning-family models.
const REASONING_PREFIXES: &[&str] = &["o1", "o3", "o4", "gpt-5"];

/// Prefix of the newest reasoning sub-family, the only one accepting `verbosity`.
const VERBOSITY_PREFIX: &str = "gpt-5";

/// Which request parameters a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClass {
    Legacy,
    Modern,
    Reasoning,
}

impl ModelClass {
    /// Classifies a model identifier.
    pub fn classify(model: &str) -> Self {
        if LEGACY_MODELS.contains(&model) {
            ModelClass::Legacy
        } else if REASONING_PREFIXES.iter().any(|prefix| model.starts_with(prefix)) {
            ModelClass::Reasoning
        } else {
            ModelClass::Modern
        }
    }
}

/// Name of the field carrying the completion token limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLimitField {
    /// `max_tokens`
    MaxTokens,
    /// `max_completion_tokens`
    MaxCompletionTokens,
}

/// The legal parameter set for one completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestShape {
    pub class: ModelClass,
    pub token_limit: TokenLimitField,
    /// Whether a temperature may be sent
    pub temperature: bool,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub verbosity: Option<Verbosity>,
}

impl RequestShape {
    /// Builds the shape for `model` from the caller's optional controls.
    ///
    /// Reasoning models always get an effort, defaulting to medium. Only the
    /// newest reasoning sub-family also gets a verbosity. Controls the model
    /// does not accept are dropped.
    pub fn for_model(
        model: &str,
        reasoning_effort: Option<ReasoningEffort>,
        verbosity: Option<Verbosity>,
    ) -> Self {
        match ModelClass::classify(model) {
            ModelClass::Legacy => Self {
                class: ModelClass::Legacy,
                token_limit: TokenLimitField::MaxTokens,
                temperature: true,
                reasoning_effort: None,
                verbosity: None,
            },
            ModelClass::Modern => Self {
                class: ModelClass::Modern,
                token_limit: TokenLimitField::MaxCompletionTokens,
                temperature: true,
                reasoning_effort: None,
                verbosity: None,
            },
            ModelClass::Reasoning => Self {
                class: ModelClass::Reasoning,
                token_limit: TokenLimitField::MaxCompletionTokens,
                temperature: false,
                reasoning_effort: Some(reasoning_effort.unwrap_or_default()),
                verbosity: model
                    .starts_with(VERBOSITY_PREFIX)
                    .then(|| verbosity.unwrap_or_default()),
            },
        }
    }

    /// Writes the shaped parameters into `request`, clearing anything illegal.
    pub(crate) fn apply(&self, request: &mut ChatRequest, max_tokens: u32, temperature: f32) {
        match self.token_limit {
            TokenLimitField::MaxTokens => {
                request.max_tokens = Some(max_tokens);
                request.max_completion_tokens = None;
            }
            TokenLimitField::MaxCompletionTokens => {
                request.max_tokens = None;
                request.max_completion_tokens = Some(max_tokens);
            }
        }
        request.temperature = self.temperature.then_some(temperature);
        request.reasoning_effort = self.reasoning_effort;
        request.verbosity = self.verbosity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shaped(model: &str, effort: Option<ReasoningEffort>, verbosity: Option<Verbosity>) -> serde_json::Value {
        let mut request = ChatRequest::new(model, Vec::new());
        RequestShape::for_model(model, effort, verbosity).apply(&mut request, 2000, 0.7);
        serde_json::to_value(&request).unwrap()
    }

    #[test]
    fn legacy_models_use_max_tokens_without_reasoning_controls() {
        for model in LEGACY_MODELS {
            let body = shaped(model, Some(ReasoningEffort::High), Some(Verbosity::High));
            assert_eq!(body["max_tokens"], json!(2000), "{model}");
            assert!(body.get("max_completion_tokens").is_none(), "{model}");
            assert!(body.get("reasoning_effort").is_none(), "{model}");
            assert!(body.get("verbosity").is_none(), "{model}");
        }
    }

    #[test]
    fn legacy_membership_is_exact() {
        assert_eq!(ModelClass::classify("gpt-4"), ModelClass::Legacy);
        assert_eq!(ModelClass::classify("gpt-4o"), ModelClass::Modern);
        assert_eq!(ModelClass::classify("gpt-4.1-mini"), ModelClass::Modern);
        assert_eq!(ModelClass::classify("gpt-3.5-turbo-0125"), ModelClass::Modern);
    }

    #[test]
    fn modern_models_use_max_completion_tokens() {
        let body = shaped("gpt-4o-mini", Some(ReasoningEffort::Low), None);
        assert_eq!(body["max_completion_tokens"], json!(2000));
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("reasoning_effort").is_none());
        assert!(body["temperature"].is_number());
    }

    #[test]
    fn reasoning_models_always_carry_effort() {
        for model in ["o1", "o3-mini", "o4-mini", "gpt-5", "gpt-5-mini"] {
            let body = shaped(model, None, None);
            assert_eq!(body["reasoning_effort"], json!("medium"), "{model}");
            assert_eq!(body["max_completion_tokens"], json!(2000), "{model}");
            assert!(body.get("temperature").is_none(), "{model}");
        }
        let body = shaped("o3-mini", Some(ReasoningEffort::Minimal), None);
        assert_eq!(body["reasoning_effort"], json!("minimal"));
    }

    #[test]
    fn verbosity_only_for_newest_reasoning_family() {
        assert_eq!(shaped("gpt-5", None, None)["verbosity"], json!("medium"));
        assert_eq!(shaped("gpt-5-nano", None, Some(Verbosity::Low))["verbosity"], json!("low"));
        assert!(shaped("o4-mini", None, Some(Verbosity::High)).get("verbosity").is_none());
    }
}
