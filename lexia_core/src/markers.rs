//! Text markers understood by the Lexia renderer.
//!
//! Markers are embedded directly in the streamed response. A loading marker
//! pair toggles a named indicator; an image marker pair carries a URL the
//! renderer displays inline.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const IMAGE_START: &str = "[lexia.image.start]";
pub const IMAGE_END: &str = "[lexia.image.end]";

static LOADING_MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\[lexia\.loading\.(?:thinking|code|image|search)\.(?:start|end)\]").ok()
});

static IMAGE_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\[lexia\.image\.start\](.*?)\[lexia\.image\.end\]").ok());

/// Named loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingKind {
    Thinking,
    Code,
    Image,
    Search,
}

impl LoadingKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Code => "code",
            Self::Image => "image",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for LoadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn loading_start(kind: LoadingKind) -> String {
    format!("[lexia.loading.{kind}.start]")
}

#[must_use]
pub fn loading_end(kind: LoadingKind) -> String {
    format!("[lexia.loading.{kind}.end]")
}

/// Surround `payload` with the start and end markers of `kind`.
#[must_use]
pub fn wrap_loading(kind: LoadingKind, payload: &str) -> String {
    format!("{}{payload}{}", loading_start(kind), loading_end(kind))
}

/// Image marker block; `url` is passed through untouched.
#[must_use]
pub fn wrap_image(url: &str) -> String {
    let mut out = String::with_capacity(IMAGE_START.len() + url.len() + IMAGE_END.len());
    out.push_str(IMAGE_START);
    out.push_str(url);
    out.push_str(IMAGE_END);
    out
}

/// Remove every loading marker, leaving image blocks and other text intact.
#[must_use]
pub fn strip_loading_markers(text: &str) -> String {
    match LOADING_MARKER.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// URLs carried by image blocks, in order of appearance.
#[must_use]
pub fn extract_image_urls(text: &str) -> Vec<String> {
    IMAGE_BLOCK.as_ref().map_or_else(Vec::new, |re| {
        re.captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_wrapping_is_exact() {
        let url = "https://cdn.example.com/a b?x=1&y=[2]";
        assert_eq!(
            wrap_image(url),
            format!("[lexia.image.start]{url}[lexia.image.end]")
        );
    }

    #[test]
    fn loading_markers_per_kind() {
        assert_eq!(
            loading_start(LoadingKind::Thinking),
            "[lexia.loading.thinking.start]"
        );
        assert_eq!(loading_end(LoadingKind::Code), "[lexia.loading.code.end]");
        assert_eq!(
            wrap_loading(LoadingKind::Search, "web"),
            "[lexia.loading.search.start]web[lexia.loading.search.end]"
        );
    }

    #[test]
    fn strip_keeps_image_blocks() {
        let text = format!(
            "Here you go{}{}\n\n{}",
            loading_start(LoadingKind::Image),
            loading_end(LoadingKind::Image),
            wrap_image("https://x/y.png")
        );
        assert_eq!(
            strip_loading_markers(&text),
            "Here you go\n\n[lexia.image.start]https://x/y.png[lexia.image.end]"
        );
    }

    #[test]
    fn extracts_urls_in_order() {
        let text = format!("{} and {}", wrap_image("a"), wrap_image("b"));
        assert_eq!(extract_image_urls(&text), vec!["a", "b"]);
        assert!(extract_image_urls("no images").is_empty());
    }
}
