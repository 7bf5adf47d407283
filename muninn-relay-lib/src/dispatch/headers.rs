use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::trace;

/// Add every profile default header the caller did not set.
///
/// Returns how many headers were added.
///
/// # Example
/// ```
/// use http::{HeaderMap, HeaderName, HeaderValue};
/// use muninn_relay_lib::dispatch::headers::apply_default_headers;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("user-agent", HeaderValue::from_static("mine"));
/// let defaults = [
///     (HeaderName::from_static("user-agent"), HeaderValue::from_static("profile")),
///     (HeaderName::from_static("accept"), HeaderValue::from_static("*/*")),
/// ];
/// assert_eq!(apply_default_headers(&mut headers, &defaults), 1);
/// assert_eq!(headers["user-agent"], "mine");
/// ```
pub fn apply_default_headers(
    headers: &mut HeaderMap,
    defaults: &[(HeaderName, HeaderValue)],
) -> usize {
    let mut added = 0usize;
    for (name, value) in defaults {
        if !headers.contains_key(name) {
            trace!(header = %name, "adding profile default header");
            headers.insert(name.clone(), value.clone());
            added = added.saturating_add(1);
        }
    }
    added
}

/// Reorder `headers` by `template`.
///
/// Template headers come first in template order; the rest follow in their
/// original order. Multi-valued headers keep all their values, in order.
/// Nothing is added or dropped.
pub fn apply_header_order(headers: HeaderMap, template: &[HeaderName]) -> HeaderMap {
    if template.is_empty() {
        return headers;
    }
    let mut ordered = HeaderMap::with_capacity(headers.len());
    for name in template {
        for value in headers.get_all(name) {
            ordered.append(name.clone(), value.clone());
        }
    }
    for name in headers.keys() {
        if template.contains(name) {
            continue;
        }
        for value in headers.get_all(name) {
            ordered.append(name.clone(), value.clone());
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(headers: &HeaderMap) -> Vec<&str> {
        headers.keys().map(HeaderName::as_str).collect()
    }

    fn template(names: &[&'static str]) -> Vec<HeaderName> {
        names.iter().map(|n| HeaderName::from_static(n)).collect()
    }

    #[test]
    fn template_first_then_original_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-custom", HeaderValue::from_static("1"));
        headers.insert("accept", HeaderValue::from_static("*/*"));
        headers.insert("user-agent", HeaderValue::from_static("ua"));
        headers.insert("x-other", HeaderValue::from_static("2"));

        let ordered = apply_header_order(headers, &template(&["host", "user-agent", "accept"]));
        assert_eq!(names(&ordered), vec!["user-agent", "accept", "x-custom", "x-other"]);
    }

    #[test]
    fn keeps_every_value_of_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append("cookie", HeaderValue::from_static("a=1"));
        headers.append("cookie", HeaderValue::from_static("b=2"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        let ordered = apply_header_order(headers, &template(&["accept", "cookie"]));
        let cookies: Vec<_> = ordered.get_all("cookie").iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(ordered.len(), 3);
    }

    #[test]
    fn empty_template_is_identity() {
        let mut headers = HeaderMap::new();
        headers.insert("b", HeaderValue::from_static("1"));
        headers.insert("a", HeaderValue::from_static("2"));
        assert_eq!(names(&apply_header_order(headers, &[])), vec!["b", "a"]);
    }

    #[test]
    fn defaults_fill_only_missing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("text/plain"));
        let defaults = [
            (HeaderName::from_static("accept"), HeaderValue::from_static("*/*")),
            (HeaderName::from_static("accept-language"), HeaderValue::from_static("en")),
        ];
        assert_eq!(apply_default_headers(&mut headers, &defaults), 1);
        assert_eq!(headers["accept"], "text/plain");
        assert_eq!(headers["accept-language"], "en");
    }
}
