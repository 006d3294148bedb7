use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Youtube => write!(f, "youtube"),
            Platform::Instagram => write!(f, "instagram"),
        }
    }
}

/// Result of matching a URL against the supported pattern sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub platform: Platform,
    pub content_id: String,
}

// YouTube video ids are exactly 11 characters. The trailing group stops a
// longer token from being silently truncated to its first 11 characters.
const YT_ID: &str = r"([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)";

// Patterns are tried in order: standard watch URL first, then shorts,
// short-link, embed, and the legacy /v/ shape. None of them anchor on a
// scheme, so bare `youtube.com/...` input still matches.
static YOUTUBE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"youtube\.com/watch\?(?:[^#\s]*&)?v={YT_ID}"),
        format!(r"youtube\.com/shorts/{YT_ID}"),
        format!(r"youtu\.be/{YT_ID}"),
        format!(r"youtube\.com/embed/{YT_ID}"),
        format!(r"youtube\.com/v/{YT_ID}"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid youtube pattern"))
    .collect()
});

static INSTAGRAM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"instagram\.com/p/([0-9A-Za-z_-]+)",
        r"instagram\.com/reel/([0-9A-Za-z_-]+)",
        r"instagram\.com/tv/([0-9A-Za-z_-]+)",
        r"instagram\.com/stories/[^/\s]+/([0-9]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid instagram pattern"))
    .collect()
});

fn first_capture(patterns: &[Regex], url: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Maps an arbitrary string to a platform and content id, or `None` when no
/// supported URL shape matches.
pub fn classify(url: &str) -> Option<Classification> {
    if let Some(id) = first_capture(&YOUTUBE_PATTERNS, url) {
        return Some(Classification {
            platform: Platform::Youtube,
            content_id: id,
        });
    }

    if let Some(id) = first_capture(&INSTAGRAM_PATTERNS, url) {
        return Some(Classification {
            platform: Platform::Instagram,
            content_id: id,
        });
    }

    None
}

/// True if the string matches any pattern in the combined set.
pub fn is_supported(url: &str) -> bool {
    classify(url).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_of(url: &str) -> Option<String> {
        classify(url).map(|c| c.content_id)
    }

    #[test]
    fn test_standard_watch_url() {
        let c = classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(c.platform, Platform::Youtube);
        assert_eq!(c.content_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        assert_eq!(
            id_of("https://www.youtube.com/watch?list=PL123&v=dQw4w9WgXcQ&t=42"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_shorts_with_trailing_query() {
        assert_eq!(
            id_of("https://www.youtube.com/shorts/Zdscg2Q2IQQ?feature=share"),
            Some("Zdscg2Q2IQQ".to_string())
        );
    }

    #[test]
    fn test_short_link() {
        assert_eq!(
            id_of("https://youtu.be/dQw4w9WgXcQ?si=abc"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_embed_and_legacy_v() {
        assert_eq!(
            id_of("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            id_of("https://www.youtube.com/v/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_missing_scheme_and_www() {
        let c = classify("youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(c.platform, Platform::Youtube);
        assert_eq!(c.content_id, "dQw4w9WgXcQ");
        assert!(is_supported("instagram.com/p/CxYz123/"));
    }

    #[test]
    fn test_short_id_does_not_match() {
        // 10 characters is not a valid video id and must not match at all
        assert!(classify("https://www.youtube.com/watch?v=dQw4w9WgXc").is_none());
    }

    #[test]
    fn test_long_token_is_not_truncated() {
        // 12-character token must not be clipped to its first 11 characters
        assert!(classify("https://youtu.be/dQw4w9WgXcQx").is_none());
    }

    #[test]
    fn test_instagram_reel_with_utm() {
        let c = classify("https://instagram.com/reel/XYZ789/?utm_source=ig_web_copy_link").unwrap();
        assert_eq!(c.platform, Platform::Instagram);
        assert_eq!(c.content_id, "XYZ789");
    }

    #[test]
    fn test_instagram_post_tv_and_story() {
        assert_eq!(
            id_of("https://www.instagram.com/p/CxYzAbC1234/"),
            Some("CxYzAbC1234".to_string())
        );
        assert_eq!(
            id_of("https://www.instagram.com/tv/AbCdEf/"),
            Some("AbCdEf".to_string())
        );
        assert_eq!(
            id_of("https://www.instagram.com/stories/someuser/3141592653589/"),
            Some("3141592653589".to_string())
        );
    }

    #[test]
    fn test_unrelated_urls_are_unsupported() {
        assert!(!is_supported("https://example.com/watch?v=dQw4w9WgXcQ"));
        assert!(!is_supported("https://vimeo.com/12345678"));
        assert!(!is_supported("not a url at all"));
        assert!(!is_supported(""));
    }
}
