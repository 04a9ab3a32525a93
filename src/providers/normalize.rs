//! Response normalization.
//!
//! Pure functions turning each vendor's 2xx JSON into plain text. A missing
//! top-level container is a shape error; an empty or null text field is an
//! empty answer.

use serde_json::Value;

use crate::types::responses::TokenUsage;

/// The useful part of a vendor reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    /// Model reported by the vendor, when it reports one.
    pub model: Option<String>,
    pub tokens: Option<TokenUsage>,
}

/// Joins text fragments with `\n`, dropping empty ones.
pub fn join_fragments<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    fragments
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of a value that is either a string or an array of text parts.
fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => join_fragments(parts.iter().filter_map(|p| match p {
            Value::String(s) => Some(s.as_str()),
            other => other.get("text").and_then(Value::as_str),
        })),
        _ => String::new(),
    }
}

fn usage(body: &Value, container: &str, input: &str, output: &str) -> Option<TokenUsage> {
    let usage = body.get(container)?;
    let input = usage.get(input).and_then(Value::as_u64);
    let output = usage.get(output).and_then(Value::as_u64);
    if input.is_none() && output.is_none() {
        return None;
    }
    Some(TokenUsage::new(input.unwrap_or(0), output.unwrap_or(0)))
}

/// OpenAI-compatible chat completions (OpenAI, xAI).
///
/// Text at `choices[0].message.content`.
pub fn chat_completions(body: &Value) -> Result<Normalized, String> {
    let choices = body
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| "response has no 'choices' array".to_string())?;

    let content = choices
        .first()
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"));

    Ok(Normalized {
        text: text_of(content),
        model: body
            .get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        tokens: usage(body, "usage", "prompt_tokens", "completion_tokens"),
    })
}

/// Gemini `generateContent`.
///
/// Text is every `candidates[0].content.parts[*].text`, joined.
pub fn gemini(body: &Value) -> Result<Normalized, String> {
    let candidates = body.get("candidates").and_then(Value::as_array).ok_or_else(|| {
        match body
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(Value::as_str)
        {
            Some(reason) => format!("prompt blocked: {}", reason),
            None => "response has no 'candidates' array".to_string(),
        }
    })?;

    let parts = candidates
        .first()
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"));

    Ok(Normalized {
        text: text_of(parts),
        model: None,
        tokens: usage(body, "usageMetadata", "promptTokenCount", "candidatesTokenCount"),
    })
}

/// Anthropic messages.
///
/// Text is every `content[*].text`, joined.
pub fn anthropic(body: &Value) -> Result<Normalized, String> {
    let content = body
        .get("content")
        .filter(|c| c.is_array())
        .ok_or_else(|| "response has no 'content' array".to_string())?;

    Ok(Normalized {
        text: text_of(Some(content)),
        model: body
            .get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        tokens: usage(body, "usage", "input_tokens", "output_tokens"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_completions_text_and_model() {
        let body = json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "4"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 1}
        });

        let normalized = chat_completions(&body).unwrap();
        assert_eq!(normalized.text, "4");
        assert_eq!(normalized.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
        assert_eq!(normalized.tokens, Some(TokenUsage::new(9, 1)));
    }

    #[test]
    fn test_chat_completions_null_content_is_empty() {
        let body = json!({"choices": [{"message": {"content": null}}]});
        assert_eq!(chat_completions(&body).unwrap().text, "");

        let body = json!({"choices": []});
        assert_eq!(chat_completions(&body).unwrap().text, "");
    }

    #[test]
    fn test_chat_completions_missing_choices_is_shape_error() {
        assert!(chat_completions(&json!({"id": "x"})).is_err());
        assert!(chat_completions(&json!({"choices": "nope"})).is_err());
    }

    #[test]
    fn test_chat_completions_content_parts() {
        let body = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "a"},
            {"type": "text", "text": ""},
            {"type": "text", "text": "b"}
        ]}}]});
        assert_eq!(chat_completions(&body).unwrap().text, "a\nb");
    }

    #[test]
    fn test_gemini_joins_parts() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "Paris"}, {"text": ""}, {"text": "is the capital"}]}}],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 6}
        });

        let normalized = gemini(&body).unwrap();
        assert_eq!(normalized.text, "Paris\nis the capital");
        assert!(normalized.model.is_none());
        assert_eq!(normalized.tokens.map(|t| t.total()), Some(10));
    }

    #[test]
    fn test_gemini_empty_candidate_is_empty_text() {
        let body = json!({"candidates": [{"finishReason": "SAFETY"}]});
        assert_eq!(gemini(&body).unwrap().text, "");
    }

    #[test]
    fn test_gemini_blocked_prompt() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = gemini(&body).unwrap_err();
        assert!(err.contains("SAFETY"));
    }

    #[test]
    fn test_anthropic_joins_text_blocks() {
        let body = json!({
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "Hello"}, {"type": "text", "text": "world"}],
            "usage": {"input_tokens": 3, "output_tokens": 2}
        });

        let normalized = anthropic(&body).unwrap();
        assert_eq!(normalized.text, "Hello\nworld");
        assert_eq!(normalized.model.as_deref(), Some("claude-3-5-sonnet-20241022"));
        assert_eq!(normalized.tokens, Some(TokenUsage::new(3, 2)));
    }

    #[test]
    fn test_anthropic_missing_content() {
        assert!(anthropic(&json!({"type": "message"})).is_err());
        assert_eq!(anthropic(&json!({"content": []})).unwrap().text, "");
    }

    #[test]
    fn test_join_fragments() {
        assert_eq!(join_fragments(["a", "", "b"]), "a\nb");
        assert_eq!(join_fragments(Vec::<&str>::new()), "");
    }
}
