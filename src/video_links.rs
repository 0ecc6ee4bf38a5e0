use once_cell::sync::Lazy;
use regex::Regex;

static YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .unwrap_or_else(|err| unreachable!("youtube pattern: {err}"))
});

static VIMEO_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"vimeo\.com/(\d+)").unwrap_or_else(|err| unreachable!("vimeo pattern: {err}"))
});

/// Rewrites YouTube and Vimeo page links into their player URLs.
/// Anything else is returned unchanged.
pub fn embed_url(url: &str) -> String {
    if url.contains("youtube.com") || url.contains("youtu.be") {
        if let Some(id) = YOUTUBE_ID.captures(url).and_then(|caps| caps.get(1)) {
            return format!("https://www.youtube.com/embed/{}", id.as_str());
        }
    }

    if url.contains("vimeo.com") {
        if let Some(id) = VIMEO_ID.captures(url).and_then(|caps| caps.get(1)) {
            return format!("https://player.vimeo.com/video/{}", id.as_str());
        }
    }

    url.to_string()
}

/// Splits the comma-separated form input into trimmed, non-empty URLs.
pub fn parse_video_urls(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_video_urls(urls: &[String]) -> String {
    urls.join(", ")
}
