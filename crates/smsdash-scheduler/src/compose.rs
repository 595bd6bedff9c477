//! AI drafting of scheduled message text.

use serde::Serialize;
use smsdash_core::error::{GenerationError, Result, SmsDashError, ValidationError};
use smsdash_core::traits::TextGenerator;
use smsdash_core::types::MAX_MESSAGE_LEN;

/// Drafted SMS text, ready to be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draft {
    pub text: String,
    /// Produced by the model (as opposed to the static fallback).
    pub ai_generated: bool,
    pub used_fallback: bool,
    /// Why generation failed, when the fallback was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wrap the user's request in SMS-specific instructions.
pub fn build_prompt(request: &str) -> String {
    format!(
        "Write one SMS message for the following request. \
         Reply with the message text only, no quotes or explanations, \
         at most {MAX_MESSAGE_LEN} characters.\n\nRequest: {}",
        request.trim()
    )
}

/// Trim, drop wrapping quotes, collapse whitespace and cut to the SMS limit.
pub fn clean_generated(raw: &str) -> String {
    let mut text = raw.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('`', '`')] {
        if text.len() >= 2 && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
        }
    }
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_MESSAGE_LEN {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(MAX_MESSAGE_LEN).collect();
    cut.trim_end().to_string()
}

/// Draft message text for `request`.
///
/// With a `fallback`, generation failures (including a missing generator)
/// produce the fallback text; without one the error is returned.
pub async fn draft_message(
    generator: Option<&dyn TextGenerator>,
    request: &str,
    fallback: Option<&str>,
) -> Result<Draft> {
    if request.trim().is_empty() {
        return Err(ValidationError::EmptyMessage.into());
    }

    let generated = match generator {
        Some(g) => g.generate(&build_prompt(request)).await.and_then(|raw| {
            let text = clean_generated(&raw);
            if text.is_empty() {
                Err(GenerationError::EmptyText)
            } else {
                Ok(text)
            }
        }),
        None => Err(GenerationError::ApiKeyMissing),
    };

    match (generated, fallback) {
        (Ok(text), _) => Ok(Draft {
            text,
            ai_generated: true,
            used_fallback: false,
            error: None,
        }),
        (Err(e), Some(fallback)) => {
            tracing::warn!("⚠️ Message generation failed, using fallback: {e}");
            Ok(Draft {
                text: clean_generated(fallback),
                ai_generated: false,
                used_fallback: true,
                error: Some(e.to_string()),
            })
        }
        (Err(e), None) => Err(SmsDashError::Generation(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(std::result::Result<String, GenerationError>);

    #[async_trait]
    impl TextGenerator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
            assert!(prompt.contains("Request:"));
            self.0.clone()
        }
    }

    #[test]
    fn test_clean_generated() {
        assert_eq!(clean_generated("  \"Hello there!\"\n"), "Hello there!");
        assert_eq!(clean_generated("“Hi”"), "Hi");
        assert_eq!(clean_generated("Line one\n\nline   two"), "Line one line two");
        let long = "word ".repeat(100);
        let out = clean_generated(&long);
        assert!(out.chars().count() <= MAX_MESSAGE_LEN);
        assert!(!out.ends_with(' '));
    }

    #[tokio::test]
    async fn test_draft_from_model() {
        let g = Fixed(Ok("\"Sale ends Friday!\"".into()));
        let draft = draft_message(Some(&g), "promo", Some("fallback")).await.unwrap();
        assert_eq!(draft.text, "Sale ends Friday!");
        assert!(draft.ai_generated);
        assert!(!draft.used_fallback);
    }

    #[tokio::test]
    async fn test_failure_uses_fallback() {
        let g = Fixed(Err(GenerationError::MalformedResponse("no candidates".into())));
        let draft = draft_message(Some(&g), "promo", Some("Default text")).await.unwrap();
        assert_eq!(draft.text, "Default text");
        assert!(!draft.ai_generated);
        assert!(draft.used_fallback);
        assert!(draft.error.unwrap().contains("no candidates"));
    }

    #[tokio::test]
    async fn test_failure_without_fallback_is_error() {
        let g = Fixed(Ok("   ".into()));
        let err = draft_message(Some(&g), "promo", None).await.unwrap_err();
        assert!(matches!(
            err,
            SmsDashError::Generation(GenerationError::EmptyText)
        ));
    }

    #[tokio::test]
    async fn test_no_generator() {
        let err = draft_message(None, "promo", None).await.unwrap_err();
        assert!(matches!(
            err,
            SmsDashError::Generation(GenerationError::ApiKeyMissing)
        ));
        let draft = draft_message(None, "promo", Some("x")).await.unwrap();
        assert!(draft.used_fallback);
    }

    #[tokio::test]
    async fn test_empty_request_rejected() {
        let err = draft_message(None, " ", Some("x")).await.unwrap_err();
        assert!(matches!(
            err,
            SmsDashError::Validation(ValidationError::EmptyMessage)
        ));
    }
}
