//! Rich node content.
//!
//! The engine treats the editor's HTML fragment as opaque except for what layout
//! needs: plain-text length, line structure, and embedded images.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn br_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("static regex"))
}

fn img_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<img\b[^>]*?src\s*=\s*["']([^"']*)["'][^>]*>"#).expect("static regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

/// One embedded image. Natural dimensions are unknown until the host reports
/// them (the editor surface owns actual image loading).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_height: Option<f64>,
}

impl ImageRef {
    pub fn is_measured(&self) -> bool {
        matches!((self.natural_width, self.natural_height), (Some(w), Some(h)) if w > 0.0 && h > 0.0)
    }
}

/// An opaque HTML fragment plus the derived bits layout is allowed to see.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichText {
    pub html: String,
    /// Tag-stripped, entity-unescaped text. `<br>` becomes `\n`.
    pub plain: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
}

impl RichText {
    pub fn from_html(html: impl Into<String>) -> Self {
        let html = html.into();

        let mut images = Vec::new();
        for caps in img_re().captures_iter(&html) {
            images.push(ImageRef {
                src: caps[1].to_string(),
                natural_width: None,
                natural_height: None,
            });
        }

        let with_breaks = br_re().replace_all(&html, "\n");
        let stripped = tag_re().replace_all(&with_breaks, "");
        let plain = htmlize::unescape(stripped.as_ref()).into_owned();

        Self {
            html,
            plain,
            images,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plain.trim().is_empty() && self.images.is_empty()
    }

    pub fn plain_len(&self) -> usize {
        self.plain.chars().count()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.plain.split('\n')
    }

    /// Adopts natural image dimensions already reported for `old` when the
    /// same `src` is still present, so a content replace does not forget what
    /// the host measured.
    pub fn adopt_natural_sizes(&mut self, old: &RichText) {
        for img in self.images.iter_mut() {
            if img.is_measured() {
                continue;
            }
            if let Some(known) = old
                .images
                .iter()
                .find(|o| o.src == img.src && o.is_measured())
            {
                img.natural_width = known.natural_width;
                img.natural_height = known.natural_height;
            }
        }
    }
}

/// Content descriptor of a node: a primary label, an optional secondary
/// description block, and the images embedded in either.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeContent {
    pub label: RichText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<RichText>,
}

impl NodeContent {
    pub fn from_label_html(html: impl Into<String>) -> Self {
        Self {
            label: RichText::from_html(html),
            description: None,
        }
    }

    pub fn with_description_html(mut self, html: impl Into<String>) -> Self {
        self.description = Some(RichText::from_html(html));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_empty() && self.description.as_ref().is_none_or(|d| d.is_empty())
    }

    pub fn image_count(&self) -> usize {
        self.label.images.len()
            + self
                .description
                .as_ref()
                .map_or(0, |d| d.images.len())
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageRef> {
        self.label
            .images
            .iter()
            .chain(self.description.iter().flat_map(|d| d.images.iter()))
    }

    /// True when any embedded image has not reported natural dimensions yet.
    /// Sizing such content uses a placeholder height until the host corrects it.
    pub fn has_unmeasured_images(&self) -> bool {
        self.images().any(|img| !img.is_measured())
    }

    /// Records the natural dimensions of the `index`-th image (label images
    /// first, then description images). Returns false for an out-of-range index.
    pub fn set_image_natural_size(&mut self, index: usize, width: f64, height: f64) -> bool {
        let label_len = self.label.images.len();
        let slot = if index < label_len {
            self.label.images.get_mut(index)
        } else {
            self.description
                .as_mut()
                .and_then(|d| d.images.get_mut(index - label_len))
        };
        match slot {
            Some(img) => {
                img.natural_width = Some(width);
                img.natural_height = Some(height);
                true
            }
            None => false,
        }
    }
}
