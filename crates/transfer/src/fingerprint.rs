use sha2::{Digest, Sha256};

/// Extensions whose content is decoded to text and rewritten before upload.
const REWRITABLE_EXTENSIONS: [&str; 4] = [".css", ".js", ".html", ".tpl"];

/// Computes SHA-256 of `content` and returns the hex-encoded digest.
///
/// Two contents are considered unchanged iff their fingerprints match.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Strips a cache-busting query suffix (`app.js?v=3` -> `app.js`).
///
/// The result is both the fingerprint key and the deploy subpath.
pub fn strip_query(filename: &str) -> &str {
    match filename.find('?') {
        Some(idx) => &filename[..idx],
        None => filename,
    }
}

/// Returns `true` if a stripped filename names a style, script, markup or
/// template file.
pub fn is_rewritable(stripped: &str) -> bool {
    REWRITABLE_EXTENSIONS
        .iter()
        .any(|ext| stripped.ends_with(ext))
}
