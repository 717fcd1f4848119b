//! API endpoint literal extraction
//!
//! Looks for call-style uses of HTTP verbs followed by a quoted string, e.g.
//! `axios.get("/api/users")` or `client.post('https://api.example.com/x')`.

use regex::Regex;
use std::sync::OnceLock;

fn call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?:get|post|put|delete|patch)\s*\(\s*['"]([^'"]+)['"]"#)
            .expect("endpoint regex is valid")
    })
}

/// Extracts endpoint literals from a text body
///
/// Only literals starting with `/` or `http` are kept. Results are in order
/// of appearance and may contain duplicates; the crawl state deduplicates on
/// exact string equality.
pub fn extract_endpoints(text: &str) -> Vec<String> {
    call_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|literal| literal.starts_with('/') || literal.starts_with("http"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_paths_and_urls() {
        let js = r#"
            axios.get("/api/users");
            fetch.post( 'https://api.example.com/v1/items' );
            client.delete("/api/users/1")
        "#;
        assert_eq!(
            extract_endpoints(js),
            vec![
                "/api/users",
                "https://api.example.com/v1/items",
                "/api/users/1"
            ]
        );
    }

    #[test]
    fn test_ignores_other_literals() {
        let js = r#"map.get("key"); params.put('name', v); $.get(url);"#;
        assert!(extract_endpoints(js).is_empty());
    }

    #[test]
    fn test_verb_matching_is_case_sensitive() {
        assert!(extract_endpoints(r#"http.GET("/api")"#).is_empty());
    }

    #[test]
    fn test_suffix_of_longer_name_still_matches() {
        // `target(` ends in `get(`
        assert_eq!(extract_endpoints(r#"target("/x")"#), vec!["/x"]);
    }
}
