use bytesize::ByteSize;

/// Characters that are rejected by at least one common filesystem.
const UNSAFE_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strips filesystem-unsafe characters from a proposed file name.
///
/// Every character in `< > : " / \ | ? *` is removed, then leading whitespace and
/// trailing whitespace or periods are trimmed.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| !UNSAFE_FILENAME_CHARS.contains(c))
        .collect();

    cleaned
        .trim_start()
        .trim_end_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// Formats a byte count for display, e.g. `12.3 MB`
pub fn human_size(bytes: u64) -> String {
    ByteSize::b(bytes).display().si().to_string()
}

/// Local wall-clock time in the catalog's `YYYY-MM-DD HH:MM:SS` form
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_extension() {
        assert_eq!(sanitize_filename("My: Video?.mp4"), "My Video.mp4");
    }

    #[test]
    fn test_sanitize_strips_every_unsafe_char() {
        let sanitized = sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#);
        assert_eq!(sanitized, "abcdefghij");
    }

    #[test]
    fn test_sanitize_trims_edges() {
        assert_eq!(sanitize_filename("  padded title . . "), "padded title");
        assert_eq!(sanitize_filename("ends with dots..."), "ends with dots");
        // Periods are only trimmed at the end
        assert_eq!(sanitize_filename(".hidden"), ".hidden");
    }

    #[test]
    fn test_sanitize_trailing_dot_exposed_by_removal() {
        assert_eq!(sanitize_filename("clip.?"), "clip");
    }

    #[test]
    fn test_sanitize_keeps_unicode() {
        assert_eq!(sanitize_filename("日本語: タイトル.webm"), "日本語 タイトル.webm");
    }

    #[test]
    fn test_sanitize_output_properties() {
        let inputs = [
            "",
            "   ",
            "...",
            "?*?",
            " leading and trailing ",
            "a/b/c.mp4.",
            "x: y | z?. ",
        ];
        for input in inputs {
            let out = sanitize_filename(input);
            assert!(
                !out.chars().any(|c| UNSAFE_FILENAME_CHARS.contains(&c)),
                "unsafe char left in {out:?}"
            );
            assert!(!out.starts_with(char::is_whitespace), "{out:?}");
            assert!(!out.ends_with(char::is_whitespace), "{out:?}");
            assert!(!out.ends_with('.'), "{out:?}");
        }
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 B");
        assert!(human_size(5_000_000).ends_with("MB"));
    }

    #[test]
    fn test_local_timestamp_shape() {
        let ts = local_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
