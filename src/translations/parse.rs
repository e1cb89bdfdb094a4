use serde_json::Value;

use crate::providers::ProviderResponse;

/// Extracts the ordered translations from a model response.
///
/// The outermost `[...]` span of the text is read as a JSON array. Without a
/// usable array the non-blank lines of the text are returned instead, and a
/// response without text yields an empty list.
pub fn parse_translations(response: &ProviderResponse) -> Vec<String> {
    match response.text.as_deref() {
        Some(text) => parse_text(text),
        None => Vec::new(),
    }
}

pub(crate) fn parse_text(text: &str) -> Vec<String> {
    if let Some(values) = array_span(text).and_then(parse_array) {
        return values;
    }
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Aligns parsed output with the chunk it answers, position by position. A
/// missing or empty translation keeps the original fragment.
pub fn reconcile(originals: &[String], translations: Vec<String>) -> Vec<String> {
    let mut translations = translations.into_iter();
    originals
        .iter()
        .map(|original| match translations.next() {
            Some(value) if !value.is_empty() => value,
            _ => original.clone(),
        })
        .collect()
}

fn array_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_array(span: &str) -> Option<Vec<String>> {
    let values: Vec<Value> = serde_json::from_str(span).ok()?;
    Some(values.into_iter().map(value_to_string).collect())
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
