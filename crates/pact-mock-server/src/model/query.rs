//! Query string decomposition.

use std::collections::BTreeMap;

/// Query parameters: key → values in the order they appeared.
pub type QueryMap = BTreeMap<String, Vec<String>>;

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

/// Parse `a=1&b=2&a=3` into `{a: [1, 3], b: [2]}`, URL-decoding keys and
/// values. A key without `=` gets an empty value; empty segments are skipped.
pub fn parse_query_string(query: &str) -> QueryMap {
    let mut parsed = QueryMap::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let mut parts = pair.splitn(2, '=');
        let key = decode(parts.next().unwrap_or_default());
        let value = parts.next().map(decode).unwrap_or_default();
        parsed.entry(key).or_default().push(value);
    }
    parsed
}

/// Render a query map back into a string, for diagnostics.
pub fn query_to_string(query: &QueryMap) -> String {
    query
        .iter()
        .flat_map(|(key, values)| {
            values.iter().map(move |value| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
        })
        .collect::<Vec<_>>()
        .join("&")
}
