//! URL utilities for video IDs, watch/embed pages and player script locations

use crate::error::ResolveError;
use regex::Regex;
use url::Url;

/// Default origin for watch and embed pages
pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

/// Script URL patterns in page HTML, in priority order
const SCRIPT_URL_PATTERNS: &[&str] = &[
    r#""jsUrl"\s*:\s*"([^"]+)""#,
    r#""assets"\s*:.+?"js"\s*:\s*"([^"]+)""#,
    r#"(/s/player/[\w\d]+/[\w\d_/.]+/base\.js)"#,
];

/// Extract video ID from a video URL or a raw 11-character ID
pub fn extract_video_id(input: &str) -> Result<String, ResolveError> {
    let input = input.trim();
    if is_raw_video_id(input) {
        return Ok(input.to_string());
    }

    let parsed = Url::parse(input)
        .map_err(|_| ResolveError::InvalidVideoId(input.to_string()))?;

    let id = match parsed.host_str() {
        Some("youtu.be") => Some(parsed.path().trim_start_matches('/').to_string()),
        Some("youtube.com") | Some("www.youtube.com") | Some("m.youtube.com")
        | Some("music.youtube.com") => {
            let path = parsed.path();
            if path.starts_with("/watch") {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.to_string())
            } else {
                ["/embed/", "/shorts/"]
                    .iter()
                    .find_map(|prefix| path.strip_prefix(prefix))
                    .map(str::to_string)
            }
        }
        _ => None,
    };

    match id {
        Some(id) if is_raw_video_id(&id) => Ok(id),
        _ => Err(ResolveError::InvalidVideoId(input.to_string())),
    }
}

/// Check if input looks like a bare video ID
pub fn is_raw_video_id(input: &str) -> bool {
    input.len() == 11
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Build the watch page URL for a video
pub fn watch_url(base_url: &str, video_id: &str) -> Result<Url, ResolveError> {
    let mut url = Url::parse(base_url)?.join("/watch")?;
    url.query_pairs_mut().append_pair("v", video_id);
    Ok(url)
}

/// Build the embed page URL for a video
pub fn embed_url(base_url: &str, video_id: &str) -> Result<Url, ResolveError> {
    Ok(Url::parse(base_url)?.join(&format!("/embed/{}", video_id))?)
}

/// Find the player script path referenced by a page
pub fn extract_script_url(html: &str) -> Result<String, ResolveError> {
    for pattern in SCRIPT_URL_PATTERNS {
        let regex = Regex::new(pattern)?;
        if let Some(path) = regex.captures(html).and_then(|c| c.get(1)) {
            return Ok(path.as_str().replace("\\/", "/"));
        }
    }
    Err(ResolveError::ScriptUrlNotFound)
}

/// Make a script path absolute against the page origin
pub fn absolute_script_url(base_url: &str, script_path: &str) -> Result<String, ResolveError> {
    let base = Url::parse(base_url)?;
    Ok(base.join(script_path)?.to_string())
}
