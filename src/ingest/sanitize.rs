//! Helpers for normalizing uploaded file names before they touch the filesystem.

const FALLBACK_NAME: &str = "upload";

/// Reduce a client-supplied file name to a safe final path component.
///
/// Directory parts (either separator style) are dropped and every character outside
/// `[A-Za-z0-9._-]` becomes `_`. Names that end up empty or dot-only fall back to `upload`.
pub fn sanitize_filename(raw: &str) -> String {
    let last = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}
