//! Mapping from URL paths to storage paths

/// File name appended to directory-like paths
pub const INDEX_FILE: &str = "index.html";

/// Maps a URL path to a relative storage path
///
/// - `""` or a path ending in `/` gets `index.html` appended
/// - a final segment without a `.` is treated as a directory and gets
///   `/index.html` appended
/// - anything else is kept as is
///
/// The result never starts with `/` and never contains `.`, `..` or empty
/// segments, so it cannot escape the directory it is joined onto.
pub fn canonical_path(url_path: &str) -> String {
    let segments: Vec<&str> = url_path
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    let is_directory = url_path.is_empty() || url_path.ends_with('/');

    match segments.last() {
        None => INDEX_FILE.to_string(),
        Some(_) if is_directory => format!("{}/{}", segments.join("/"), INDEX_FILE),
        Some(last) if !last.contains('.') => format!("{}/{}", segments.join("/"), INDEX_FILE),
        Some(_) => segments.join("/"),
    }
}
