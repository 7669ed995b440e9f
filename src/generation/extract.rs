use serde_json::Value;

/// Where a provider may put the assistant text in its response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// `choices[0].message.content`
    ChatCompletion,
    /// `result.output_text`, or `output_text` at the top level
    OutputText,
    /// `result[0].content`
    IndexedResult,
    /// the whole body is a JSON string
    BareString,
    /// `text`
    TextField,
}

impl ExtractionStrategy {
    pub const ORDERED: [ExtractionStrategy; 5] = [
        ExtractionStrategy::ChatCompletion,
        ExtractionStrategy::OutputText,
        ExtractionStrategy::IndexedResult,
        ExtractionStrategy::BareString,
        ExtractionStrategy::TextField,
    ];

    pub fn extract<'a>(self, body: &'a Value) -> Option<&'a str> {
        let found = match self {
            Self::ChatCompletion => body.pointer("/choices/0/message/content"),
            Self::OutputText => body
                .pointer("/result/output_text")
                .or_else(|| body.get("output_text")),
            Self::IndexedResult => body.pointer("/result/0/content"),
            Self::BareString => Some(body),
            Self::TextField => body.get("text"),
        };
        found
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// First non-empty text found by the strategies, in order.
pub fn extract_text(body: &Value) -> Option<&str> {
    ExtractionStrategy::ORDERED
        .iter()
        .find_map(|strategy| strategy.extract(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_completion_shape() {
        let body = json!({"choices":[{"message":{"role":"assistant","content":"hello"}}]});
        assert_eq!(extract_text(&body), Some("hello"));
    }

    #[test]
    fn output_text_shapes() {
        assert_eq!(extract_text(&json!({"result":{"output_text":"a"}})), Some("a"));
        assert_eq!(extract_text(&json!({"output_text":"b"})), Some("b"));
    }

    #[test]
    fn indexed_bare_and_text_shapes() {
        assert_eq!(extract_text(&json!({"result":[{"content":"c"}]})), Some("c"));
        assert_eq!(extract_text(&json!("d")), Some("d"));
        assert_eq!(extract_text(&json!({"text":"e"})), Some("e"));
    }

    #[test]
    fn earlier_strategy_wins_and_empty_is_skipped() {
        let body = json!({
            "choices":[{"message":{"content":"   "}}],
            "output_text":"second",
            "text":"last"
        });
        assert_eq!(extract_text(&body), Some("second"));
    }

    #[test]
    fn nothing_usable() {
        assert_eq!(extract_text(&json!({"choices":[]})), None);
        assert_eq!(extract_text(&json!({"text": 12})), None);
        assert_eq!(extract_text(&json!("")), None);
    }
}
