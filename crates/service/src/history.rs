//! Chat history rendering.

use serde_json::Value;

/// Render chat history for a prompt.
///
/// Accepts either raw text, used as-is, or a JSON array of messages with a
/// `type` or `role` of `user`/`assistant` and a `content` string.
pub fn format_history(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let Ok(Value::Array(messages)) = serde_json::from_str::<Value>(trimmed) else {
        return trimmed.to_string();
    };

    let mut out = String::from("Previous conversation:\n");
    for message in &messages {
        let role = message
            .get("type")
            .or_else(|| message.get("role"))
            .and_then(Value::as_str)
            .unwrap_or("user");
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let speaker = if role.eq_ignore_ascii_case("user") || role.eq_ignore_ascii_case("human") {
            "User"
        } else {
            "Assistant"
        };
        out.push_str(speaker);
        out.push_str(": ");
        out.push_str(content);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_messages_are_rendered() {
        let raw = r#"[
            {"type": "user", "content": "My name is Ken"},
            {"role": "assistant", "content": "Hi Ken"}
        ]"#;
        assert_eq!(
            format_history(raw),
            "Previous conversation:\nUser: My name is Ken\nAssistant: Hi Ken\n"
        );
    }

    #[test]
    fn raw_text_passes_through() {
        assert_eq!(format_history("  User said hi  "), "User said hi");
        assert_eq!(format_history("{\"not\": \"an array\"}"), "{\"not\": \"an array\"}");
    }

    #[test]
    fn empty_history_is_empty() {
        assert_eq!(format_history(""), "");
        assert_eq!(format_history("   \n"), "");
    }
}
