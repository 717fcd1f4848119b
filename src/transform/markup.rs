//! Markup layout normalization

/// Normalizes line endings and trailing whitespace
///
/// Element structure is left alone; rendered markup is kept as the browser
/// serialized it.
pub fn beautify_markup(source: &str) -> String {
    let normalized = source.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<&str> = normalized.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }

    if lines.is_empty() {
        return String::new();
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endings() {
        assert_eq!(beautify_markup("<p>a</p>\r\n<p>b</p>\r"), "<p>a</p>\n<p>b</p>\n");
    }

    #[test]
    fn test_trailing_whitespace() {
        assert_eq!(beautify_markup("\n\n<div>   \n  x\t\n</div>\n\n\n"), "<div>\n  x\n</div>\n");
    }

    #[test]
    fn test_blank() {
        assert_eq!(beautify_markup("  \n \r\n"), "");
    }
}
