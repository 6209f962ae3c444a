// Identifier extraction from search timeline responses.
//
// The endpoint answers with JSON whose `items_html` field holds an HTML
// fragment; every item carries a `data-tweet-id="<digits>"` attribute.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::error::ExtractionError;

pub const ITEMS_HTML_FIELD: &str = "items_html";

fn item_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)data-tweet-id="(\d+)""#).expect("item id pattern must compile")
    })
}

/// Every item id in `payload`, in order of first appearance.
pub fn extract_ids(payload: &str) -> Result<Vec<String>, ExtractionError> {
    let json: Value = serde_json::from_str(payload)
        .map_err(|error| ExtractionError::InvalidJson(error.to_string()))?;
    let html = json
        .get(ITEMS_HTML_FIELD)
        .and_then(Value::as_str)
        .ok_or(ExtractionError::MissingField(ITEMS_HTML_FIELD))?;
    Ok(extract_ids_from_html(html))
}

pub fn extract_ids_from_html(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    item_id_pattern()
        .captures_iter(html)
        .filter_map(|captures| captures.get(1))
        .map(|id| id.as_str())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(html: &str) -> String {
        serde_json::json!({ "min_position": "x", "items_html": html }).to_string()
    }

    #[test]
    fn extracts_ids_in_document_order() {
        let html = concat!(
            r#"<li data-tweet-id="103"></li>"#,
            r#"<li data-tweet-id="101"><div data-tweet-id="102">"#,
        );
        assert_eq!(extract_ids(&payload(html)).unwrap(), vec!["103", "101", "102"]);
    }

    #[test]
    fn attribute_match_is_case_insensitive() {
        let html = r#"<li DATA-TWEET-ID="7"></li><li Data-Tweet-Id="8"></li>"#;
        assert_eq!(extract_ids(&payload(html)).unwrap(), vec!["7", "8"]);
    }

    #[test]
    fn repeated_ids_are_reported_once() {
        let html = r#"<a data-tweet-id="5"></a><b data-tweet-id="5"></b><c data-tweet-id="6"></c>"#;
        assert_eq!(extract_ids(&payload(html)).unwrap(), vec!["5", "6"]);
    }

    #[test]
    fn non_numeric_ids_are_ignored() {
        let html = concat!(
            r#"<li data-tweet-id="abc"></li>"#,
            r#"<li data-tweet-id=""></li>"#,
            r#"<li data-tweet-id="9"></li>"#,
        );
        assert_eq!(extract_ids(&payload(html)).unwrap(), vec!["9"]);
    }

    #[test]
    fn empty_fragment_yields_no_ids() {
        assert!(extract_ids(&payload("")).unwrap().is_empty());
    }

    #[test]
    fn missing_items_html_is_an_extraction_error() {
        let error = extract_ids(r#"{"has_more_items": false}"#).expect_err("should fail");
        assert_eq!(error, ExtractionError::MissingField("items_html"));
    }

    #[test]
    fn non_string_items_html_is_an_extraction_error() {
        let error = extract_ids(r#"{"items_html": 12}"#).expect_err("should fail");
        assert_eq!(error, ExtractionError::MissingField("items_html"));
    }

    #[test]
    fn non_json_payload_is_an_extraction_error() {
        let error = extract_ids("<html>rate limited</html>").expect_err("should fail");
        assert!(matches!(error, ExtractionError::InvalidJson(_)));
    }
}
