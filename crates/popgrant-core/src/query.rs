//! Raw substring extraction of response parameters.
//!
//! Redirect URLs are deliberately not parsed as URLs: the value for a name is
//! whatever sits between `name=` and the next delimiter, wherever the name
//! first occurs. This keeps fragment-delivered responses readable with the
//! same code path as query-delivered ones.

/// Extract the raw value of `name` from a URL-like string.
///
/// Scans for the first occurrence of `name=` and returns the text between
/// the `=` and the next `&` or `#`, or the end of the string. Returns an
/// empty string when the parameter is absent. No percent-decoding is applied.
pub fn query_value<'a>(url: &'a str, name: &str) -> &'a str {
    let needle = format!("{name}=");
    let Some(name_at) = url.find(&needle) else {
        return "";
    };
    let rest = &url[name_at + needle.len()..];
    let end = rest.find(['&', '#']).unwrap_or(rest.len());
    &rest[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_values_out_of_a_query_string() {
        let url = "https://app.example.com/cb?code=ABC123&state=xyz";
        assert_eq!(query_value(url, "code"), "ABC123");
        assert_eq!(query_value(url, "state"), "xyz");
    }

    #[test]
    fn reads_values_out_of_a_fragment() {
        let url = "https://app.example.com/cb#code=ABC123&state=xyz";
        assert_eq!(query_value(url, "code"), "ABC123");
        assert_eq!(query_value(url, "state"), "xyz");
    }

    #[test]
    fn hash_terminates_a_query_value() {
        let url = "https://app.example.com/cb?code=ABC123#section&state=xyz";
        assert_eq!(query_value(url, "code"), "ABC123");
    }

    #[test]
    fn last_value_runs_to_end_of_string() {
        assert_eq!(
            query_value("https://app.example.com/cb?state=xyz&code=ABC123", "code"),
            "ABC123"
        );
    }

    #[test]
    fn absent_and_empty_parameters_read_as_empty() {
        assert_eq!(query_value("https://app.example.com/cb?code=ABC123", "state"), "");
        assert_eq!(query_value("https://app.example.com/cb?code=&state=x", "code"), "");
        assert_eq!(query_value("https://app.example.com/cb?code=", "code"), "");
    }

    #[test]
    fn values_are_not_decoded() {
        assert_eq!(
            query_value("https://app.example.com/cb?desc=access%20denied", "desc"),
            "access%20denied"
        );
    }
}
