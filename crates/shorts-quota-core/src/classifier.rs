//! Short-form page classification.
//!
//! A page qualifies either by its path (`/shorts/<id>`) or by being a
//! regular watch page whose Open Graph video dimensions are 9:16 portrait.

use serde::{Deserialize, Serialize};
use url::Url;

pub const OG_VIDEO_WIDTH: &str = "og:video:width";
pub const OG_VIDEO_HEIGHT: &str = "og:video:height";

/// One `<meta property=.. content=..>` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTag {
    pub property: String,
    pub content: String,
}

impl MetaTag {
    pub fn new(property: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            content: content.into(),
        }
    }
}

/// What the content agent can see of the current document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub meta: Vec<MetaTag>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            meta: Vec::new(),
        }
    }

    pub fn with_meta(mut self, property: &str, content: &str) -> Self {
        self.meta.push(MetaTag::new(property, content));
        self
    }

    fn meta_value(&self, property: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|m| m.property == property)
            .map(|m| m.content.as_str())
    }
}

/// Is `page` a short-form video page right now?
pub fn is_short_form(page: &PageSnapshot) -> bool {
    let Ok(url) = Url::parse(&page.url) else {
        return false;
    };
    let path = url.path();
    if path.contains("/shorts/") {
        return true;
    }
    path.contains("/watch") && has_portrait_video(page)
}

fn has_portrait_video(page: &PageSnapshot) -> bool {
    let dim = |p: &str| {
        page.meta_value(p)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
    };
    match (dim(OG_VIDEO_WIDTH), dim(OG_VIDEO_HEIGHT)) {
        (Some(w), Some(h)) => w.checked_mul(16).is_some_and(|a| Some(a) == h.checked_mul(9)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorts_path_qualifies() {
        assert!(is_short_form(&PageSnapshot::new(
            "https://www.youtube.com/shorts/abc123"
        )));
    }

    #[test]
    fn plain_watch_page_does_not() {
        let page = PageSnapshot::new("https://www.youtube.com/watch?v=xyz")
            .with_meta(OG_VIDEO_WIDTH, "1920")
            .with_meta(OG_VIDEO_HEIGHT, "1080");
        assert!(!is_short_form(&page));
        assert!(!is_short_form(&PageSnapshot::new(
            "https://www.youtube.com/watch?v=xyz"
        )));
    }

    #[test]
    fn portrait_watch_page_qualifies() {
        let page = PageSnapshot::new("https://www.youtube.com/watch?v=xyz")
            .with_meta(OG_VIDEO_WIDTH, "1080")
            .with_meta(OG_VIDEO_HEIGHT, "1920");
        assert!(is_short_form(&page));

        let smaller = PageSnapshot::new("https://m.youtube.com/watch?v=q")
            .with_meta(OG_VIDEO_WIDTH, "720")
            .with_meta(OG_VIDEO_HEIGHT, "1280");
        assert!(is_short_form(&smaller));
    }

    #[test]
    fn portrait_meta_off_watch_page_does_not() {
        let page = PageSnapshot::new("https://www.youtube.com/feed/subscriptions")
            .with_meta(OG_VIDEO_WIDTH, "1080")
            .with_meta(OG_VIDEO_HEIGHT, "1920");
        assert!(!is_short_form(&page));
    }

    #[test]
    fn garbage_url_does_not_qualify() {
        assert!(!is_short_form(&PageSnapshot::new("not a url /shorts/")));
    }
}
