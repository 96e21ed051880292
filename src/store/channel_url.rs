use url::Url;

const CANONICAL_BASE: &str = "https://t.me/";

/// Turn whatever an admin typed after `/setchannel` into a link users can open.
///
/// Full `http(s)` URLs are kept as parsed. Bare handles (`news`, `@news`,
/// `t.me/news`) get the canonical `https://t.me/` prefix. Blank input has no
/// link.
pub fn normalize(stored: &str) -> Option<String> {
    let trimmed = stored.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(trimmed)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(url.to_string());
    }

    let handle = trimmed.trim_start_matches('@');
    let handle = handle
        .strip_prefix("t.me/")
        .or_else(|| handle.strip_prefix("telegram.me/"))
        .unwrap_or(handle)
        .trim_start_matches('@');

    if handle.is_empty() {
        return None;
    }

    Some(format!("{CANONICAL_BASE}{handle}"))
}
