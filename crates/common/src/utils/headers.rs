use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

/// Flatten HTTP headers into the wire format
///
/// Repeated headers are collapsed into one value joined with ", ". This is
/// lossy for headers such as `set-cookie` whose values may contain commas.
/// Values that are not valid UTF-8 become empty strings.
pub fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();

    for (name, value) in headers.iter() {
        let val = value.to_str().unwrap_or("");

        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(val);
            })
            .or_insert_with(|| val.to_string());
    }

    map
}

/// Convert wire-format headers back into a `HeaderMap`
///
/// Names or values that are not valid HTTP are skipped.
pub fn map_to_headers(map: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in map.iter() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    headers
}

/// Remove the named headers, comparing names case-insensitively
pub fn strip_headers(map: &mut HashMap<String, String>, names: &[&str]) {
    map.retain(|name, _| !names.iter().any(|n| name.eq_ignore_ascii_case(n)));
}
