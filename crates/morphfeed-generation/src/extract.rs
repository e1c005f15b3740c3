//! Output URL extraction from generation responses.
//!
//! Providers do not agree on where the output URL lives in their payload. The
//! strategies below are tried in order and the first non-empty string wins.

use serde_json::Value;

/// One place the output URL may be found, as a JSON pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionStrategy {
    pub name: &'static str,
    pub pointer: &'static str,
}

impl ExtractionStrategy {
    pub const fn new(name: &'static str, pointer: &'static str) -> Self {
        Self { name, pointer }
    }

    pub fn extract<'a>(&self, payload: &'a Value) -> Option<&'a str> {
        payload
            .pointer(self.pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Known response shapes, most specific first.
pub const DEFAULT_STRATEGIES: &[ExtractionStrategy] = &[
    ExtractionStrategy::new("output_url", "/output_url"),
    ExtractionStrategy::new("url", "/url"),
    ExtractionStrategy::new("image_url", "/image_url"),
    ExtractionStrategy::new("output", "/output"),
    ExtractionStrategy::new("output_list", "/output/0"),
    ExtractionStrategy::new("images_list", "/images/0/url"),
    ExtractionStrategy::new("data_list", "/data/0/url"),
    ExtractionStrategy::new("result_url", "/result/url"),
    // Bare JSON string body
    ExtractionStrategy::new("bare_string", ""),
];

/// Find the output URL using the given strategies, returning it with the name
/// of the strategy that matched.
pub fn extract_output_url<'a>(
    payload: &'a Value,
    strategies: &[ExtractionStrategy],
) -> Option<(&'a str, &'static str)> {
    strategies
        .iter()
        .find_map(|s| s.extract(payload).map(|url| (url, s.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url_of(payload: Value) -> Option<String> {
        extract_output_url(&payload, DEFAULT_STRATEGIES).map(|(url, _)| url.to_string())
    }

    #[test]
    fn test_known_shapes() {
        let expected = Some("https://cdn.example.com/out.png".to_string());
        assert_eq!(url_of(json!({"output_url": "https://cdn.example.com/out.png"})), expected);
        assert_eq!(url_of(json!({"url": "https://cdn.example.com/out.png"})), expected);
        assert_eq!(url_of(json!({"output": ["https://cdn.example.com/out.png"]})), expected);
        assert_eq!(
            url_of(json!({"images": [{"url": "https://cdn.example.com/out.png"}]})),
            expected
        );
        assert_eq!(
            url_of(json!({"data": [{"url": "https://cdn.example.com/out.png"}]})),
            expected
        );
        assert_eq!(
            url_of(json!({"result": {"url": "https://cdn.example.com/out.png"}})),
            expected
        );
        assert_eq!(url_of(json!("https://cdn.example.com/out.png")), expected);
    }

    #[test]
    fn test_first_match_wins_and_empty_strings_are_skipped() {
        let payload = json!({
            "output_url": "  ",
            "url": "https://a.example.com/first.png",
            "output": "https://b.example.com/second.png",
        });
        let (url, strategy) = extract_output_url(&payload, DEFAULT_STRATEGIES).unwrap();
        assert_eq!(url, "https://a.example.com/first.png");
        assert_eq!(strategy, "url");
    }

    #[test]
    fn test_no_url() {
        assert_eq!(url_of(json!({"status": "succeeded", "output": null})), None);
        assert_eq!(url_of(json!({"output": [42]})), None);
        assert_eq!(url_of(json!([])), None);
    }
}
