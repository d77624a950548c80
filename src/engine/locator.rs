use reqwest::Url;
use tracing::warn;

/// Cache key for `locator`: its trailing, non-empty path segment.
pub fn cache_key_for(locator: &Url) -> Option<String> {
    let segment = locator.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    Some(segment.to_string())
}

/// Locators `{endpoint}{i}{extension}` for `i` in `1..=count`.
///
/// Ids that do not form a valid URL are skipped with a warning.
pub fn locators_for(endpoint: &str, extension: &str, count: usize) -> Vec<Url> {
    (1..=count)
        .filter_map(|i| {
            let raw = format!("{}{}{}", endpoint, i, extension);
            match Url::parse(&raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("skipping invalid locator {}: {}", raw, e);
                    None
                }
            }
        })
        .collect()
}
