use anyhow::{anyhow, Result};
use tracing::debug;
use url::Url;

/// Host used by shortened share links
pub const SHORT_LINK_HOST: &str = "youtu.be";

/// Long-form watch URL prefix that short links are rewritten to
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Normalize a caller-supplied video URL into the form used for both
/// downloading and the stored `video_url` field.
///
/// Short links (`https://youtu.be/<id>?...#...`) lose their query string and
/// fragment and are rewritten to the long-form watch URL. Every other absolute URL is returned
/// as given. Reachability is never checked.
pub fn canonicalize_video_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Video URL is empty"));
    }

    let parsed = Url::parse(trimmed).map_err(|e| anyhow!("Invalid video URL '{}': {}", trimmed, e))?;

    if parsed.host_str() != Some(SHORT_LINK_HOST) {
        return Ok(trimmed.to_string());
    }

    let video_id = parsed.path().trim_matches('/');
    if video_id.is_empty() {
        return Err(anyhow!("Short link '{}' has no video id", trimmed));
    }

    let canonical = format!("{}{}", WATCH_URL_PREFIX, video_id);
    debug!("Rewrote short link {} -> {}", trimmed, canonical);
    Ok(canonical)
}
