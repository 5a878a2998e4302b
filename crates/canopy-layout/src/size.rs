//! Node box sizing.
//!
//! A node's box derives from its content: text-only nodes hug their longest
//! rendered line between a min and max card width, any embedded image pins the
//! card to the maximum width, and image rows stack below the text. Measuring
//! is idempotent — unchanged content always reproduces the same box — and a
//! node being actively edited never shrinks below the floor captured at
//! edit-start.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use canopy_core::content::NodeContent;
use canopy_core::node::Size;

use crate::text::{TextMeasurer, TextStyle};

/// Images per stacked row inside a card.
pub const IMAGES_PER_ROW: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SizeConfig {
    pub min_width: f64,
    /// Fixed maximum card width; also the forced width of any card with images.
    pub max_width: f64,
    /// Single-line minimum; the height of an empty card.
    pub min_height: f64,
    pub padding: f64,
    pub label_font_size: f64,
    pub description_font_size: f64,
    /// Conservative stand-in row height while an image has not reported its
    /// natural dimensions. A guess, corrected on the next measure pass.
    pub placeholder_image_height: f64,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            min_width: 80.0,
            max_width: 320.0,
            min_height: 40.0,
            padding: 12.0,
            label_font_size: 16.0,
            description_font_size: 12.0,
            placeholder_image_height: 160.0,
        }
    }
}

impl SizeConfig {
    fn label_style(&self) -> TextStyle {
        TextStyle::sized(self.label_font_size)
    }

    fn description_style(&self) -> TextStyle {
        TextStyle::sized(self.description_font_size)
    }
}

/// Derives the box for `content`.
pub fn measure_node(
    content: &NodeContent,
    measurer: &dyn TextMeasurer,
    cfg: &SizeConfig,
) -> Size {
    if content.is_empty() {
        return Size::new(cfg.min_width, cfg.min_height);
    }

    let width = card_width(content, measurer, cfg);
    let inner_width = width - 2.0 * cfg.padding;

    let mut height = 2.0 * cfg.padding;
    if !content.label.is_empty() {
        height += measurer
            .measure_wrapped(&content.label.plain, &cfg.label_style(), Some(inner_width))
            .height;
    }
    if let Some(descr) = content.description.as_ref().filter(|d| !d.is_empty()) {
        height += measurer
            .measure_wrapped(&descr.plain, &cfg.description_style(), Some(inner_width))
            .height;
    }
    height += image_block_height(content, inner_width, cfg);

    Size::new(width, height.max(cfg.min_height))
}

fn card_width(content: &NodeContent, measurer: &dyn TextMeasurer, cfg: &SizeConfig) -> f64 {
    if content.image_count() > 0 {
        return cfg.max_width;
    }
    let label_width = measurer
        .measure(&content.label.plain, &cfg.label_style())
        .width;
    let descr_width = content
        .description
        .as_ref()
        .map(|d| measurer.measure(&d.plain, &cfg.description_style()).width)
        .unwrap_or(0.0);
    let text_width = label_width.max(descr_width);
    (text_width + 2.0 * cfg.padding).clamp(cfg.min_width, cfg.max_width)
}

/// Total height of the stacked image rows: up to [`IMAGES_PER_ROW`] per row,
/// each image scaled to its column width preserving aspect ratio, row height
/// being the tallest scaled image in the row.
fn image_block_height(content: &NodeContent, inner_width: f64, cfg: &SizeConfig) -> f64 {
    let images: Vec<_> = content.images().collect();
    if images.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    for row in images.chunks(IMAGES_PER_ROW) {
        let cell_width = inner_width / row.len() as f64;
        let row_height = row
            .iter()
            .map(|img| match (img.natural_width, img.natural_height) {
                (Some(w), Some(h)) if w > 0.0 && h > 0.0 => h * (cell_width / w).min(1.0),
                _ => cfg.placeholder_image_height,
            })
            .fold(0.0, f64::max);
        total += row_height;
    }
    total
}

/// Edit-time size floors.
///
/// While the user types into a node its box may only grow; the floor captured
/// at edit-start is released at edit-end. This keeps the card (and the whole
/// layout) from jittering under the caret when a shorter line is measured.
#[derive(Debug, Clone, Default)]
pub struct SizeLocks {
    floors: FxHashMap<String, Size>,
}

impl SizeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&mut self, id: impl Into<String>, floor: Size) {
        self.floors.insert(id.into(), floor);
    }

    pub fn release(&mut self, id: &str) {
        self.floors.remove(id);
    }

    pub fn floor_of(&self, id: &str) -> Option<Size> {
        self.floors.get(id).copied()
    }

    /// Clamps a freshly measured box against the node's floor, if any.
    pub fn apply(&self, id: &str, measured: Size) -> Size {
        match self.floor_of(id) {
            Some(floor) => measured.max(floor),
            None => measured,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::DeterministicTextMeasurer;

    fn m() -> DeterministicTextMeasurer {
        DeterministicTextMeasurer::default()
    }

    #[test]
    fn empty_content_gets_the_minimum_card() {
        let cfg = SizeConfig::default();
        let size = measure_node(&NodeContent::default(), &m(), &cfg);
        assert_eq!(size, Size::new(cfg.min_width, cfg.min_height));
    }

    #[test]
    fn text_width_is_clamped_between_min_and_max() {
        let cfg = SizeConfig::default();
        let small = measure_node(&NodeContent::from_label_html("hi"), &m(), &cfg);
        assert_eq!(small.width, cfg.min_width);

        let long = "a very long label that certainly exceeds the maximum card width by far";
        let wide = measure_node(&NodeContent::from_label_html(long), &m(), &cfg);
        assert_eq!(wide.width, cfg.max_width);
    }

    #[test]
    fn any_image_forces_the_maximum_width() {
        let cfg = SizeConfig::default();
        let content = NodeContent::from_label_html(r#"x<img src="a.png">"#);
        let size = measure_node(&content, &m(), &cfg);
        assert_eq!(size.width, cfg.max_width);
    }

    #[test]
    fn unmeasured_images_use_the_placeholder_row_height() {
        let cfg = SizeConfig::default();
        let content = NodeContent::from_label_html(r#"<img src="a.png">"#);
        let size = measure_node(&content, &m(), &cfg);
        assert!(size.height >= cfg.placeholder_image_height);

        let mut measured = content.clone();
        assert!(measured.set_image_natural_size(0, 1000.0, 100.0));
        let corrected = measure_node(&measured, &m(), &cfg);
        // Scaled to the full inner width: 100 * (296/1000) < placeholder.
        assert!(corrected.height < size.height);
    }

    #[test]
    fn four_images_stack_into_two_rows() {
        let cfg = SizeConfig::default();
        let mut content = NodeContent::from_label_html(
            r#"<img src="a"><img src="b"><img src="c"><img src="d">"#,
        );
        for i in 0..4 {
            content.set_image_natural_size(i, 300.0, 300.0);
        }
        let inner = cfg.max_width - 2.0 * cfg.padding;
        // Row one: three square images scaled to inner/3; row two: one square
        // image scaled to the full inner width (just under natural size).
        let expected = (inner / 3.0) + inner;
        let size = measure_node(&content, &m(), &cfg);
        let text_free = size.height - 2.0 * cfg.padding;
        assert!((text_free - expected).abs() < 1e-9);
    }

    #[test]
    fn measuring_is_idempotent() {
        let cfg = SizeConfig::default();
        let content = NodeContent::from_label_html("stable label");
        let a = measure_node(&content, &m(), &cfg);
        let b = measure_node(&content, &m(), &cfg);
        assert_eq!(a, b);
    }

    #[test]
    fn locked_floor_prevents_shrinking() {
        let mut locks = SizeLocks::new();
        locks.lock("n1", Size::new(200.0, 120.0));
        let shrunk = locks.apply("n1", Size::new(80.0, 40.0));
        assert_eq!(shrunk, Size::new(200.0, 120.0));
        let grown = locks.apply("n1", Size::new(260.0, 150.0));
        assert_eq!(grown, Size::new(260.0, 150.0));
        locks.release("n1");
        assert_eq!(locks.apply("n1", Size::new(80.0, 40.0)), Size::new(80.0, 40.0));
    }
}
