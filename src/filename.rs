//! Destination filename derivation from URLs.

use url::Url;

/// Fallback name when the URL path has no usable segment.
const FALLBACK_NAME: &str = "download";

/// Derives a destination filename from the last non-empty URL path segment.
///
/// The segment is percent-decoded and sanitized. URLs with an empty path
/// (for example `https://example.com/`) fall back to `"download"`.
#[must_use]
pub fn filename_from_url(url: &Url) -> String {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back().map(std::string::ToString::to_string))
        .filter(|segment| !segment.is_empty());

    let Some(segment) = last_segment else {
        return FALLBACK_NAME.to_string();
    };

    let decoded = urlencoding::decode(&segment)
        .map(|cow| cow.into_owned())
        .unwrap_or(segment);

    let sanitized = sanitize_filename(&decoded);
    if sanitized.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        sanitized
    }
}

/// Strips path separators and control characters, and trims leading dots so
/// a crafted name cannot escape the destination directory or hide itself.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    cleaned.trim().trim_start_matches('.').to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_filename_from_simple_url() {
        let url = parse("https://example.com/files/archive.tar.gz");
        assert_eq!(filename_from_url(&url), "archive.tar.gz");
    }

    #[test]
    fn test_filename_ignores_query_string() {
        let url = parse("https://example.com/files/report.pdf?token=abc123");
        assert_eq!(filename_from_url(&url), "report.pdf");
    }

    #[test]
    fn test_filename_percent_decoded() {
        let url = parse("https://example.com/files/my%20file.zip");
        assert_eq!(filename_from_url(&url), "my file.zip");
    }

    #[test]
    fn test_filename_empty_path_falls_back() {
        let url = parse("https://example.com/");
        assert_eq!(filename_from_url(&url), "download");
    }

    #[test]
    fn test_filename_trailing_slash_falls_back() {
        let url = parse("https://example.com/files/");
        assert_eq!(filename_from_url(&url), "download");
    }

    #[test]
    fn test_sanitize_replaces_separators() {
        assert_eq!(sanitize_filename("a/b\\c.bin"), "a_b_c.bin");
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_filename("file\x00\x1fname.txt"), "filename.txt");
    }

    #[test]
    fn test_sanitize_trims_leading_dots() {
        assert_eq!(sanitize_filename("..hidden"), "hidden");
    }

    #[test]
    fn test_sanitize_trims_whitespace() {
        assert_eq!(sanitize_filename("  padded.iso  "), "padded.iso");
    }
}
