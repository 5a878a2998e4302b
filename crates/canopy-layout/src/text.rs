//! Text measurement.
//!
//! Real text shaping belongs to the embedded editor surface; the engine only
//! needs stable, display-independent estimates to size node boxes. The
//! deterministic measurer estimates per-character advance from terminal-style
//! column widths, which keeps CJK and ASCII labels proportionate without a
//! font stack.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: Option<String>,
    pub font_size: f64,
    pub font_weight: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 16.0,
            font_weight: None,
        }
    }
}

impl TextStyle {
    pub fn sized(font_size: f64) -> Self {
        Self {
            font_size,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    pub line_count: usize,
}

pub trait TextMeasurer {
    /// Measures `text` as-is; embedded newlines separate lines and the width
    /// is the widest line.
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;

    /// Measures `text` wrapped at `max_width` (no wrapping when `None`).
    fn measure_wrapped(&self, text: &str, style: &TextStyle, max_width: Option<f64>)
    -> TextMetrics;
}

#[derive(Debug, Clone, Default)]
pub struct DeterministicTextMeasurer {
    /// Advance per terminal column in em. Zero means the 0.6 default.
    pub char_width_factor: f64,
    /// Line height in em. Zero means the 1.2 default.
    pub line_height_factor: f64,
}

impl DeterministicTextMeasurer {
    fn factors(&self) -> (f64, f64) {
        let cw = if self.char_width_factor == 0.0 {
            0.6
        } else {
            self.char_width_factor
        };
        let lh = if self.line_height_factor == 0.0 {
            1.2
        } else {
            self.line_height_factor
        };
        (cw, lh)
    }

    fn line_width_px(&self, line: &str, style: &TextStyle) -> f64 {
        let (cw, _) = self.factors();
        let cols: usize = line.chars().map(|c| c.width().unwrap_or(0)).sum();
        cols as f64 * style.font_size.max(1.0) * cw
    }

    /// Greedy word wrap; tokens wider than the limit are split by character so
    /// a single unbreakable run cannot blow past the box.
    fn wrap_line(&self, line: &str, style: &TextStyle, max_width: f64) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut cur = String::new();

        for word in line.split_whitespace() {
            if !cur.is_empty() {
                let candidate = format!("{cur} {word}");
                if self.line_width_px(&candidate, style) <= max_width {
                    cur = candidate;
                    continue;
                }
                out.push(std::mem::take(&mut cur));
            }
            if self.line_width_px(word, style) <= max_width {
                cur = word.to_string();
            } else {
                // Long unbreakable token: hard-split it.
                let mut chunk = String::new();
                for ch in word.chars() {
                    chunk.push(ch);
                    if self.line_width_px(&chunk, style) >= max_width {
                        out.push(std::mem::take(&mut chunk));
                    }
                }
                cur = chunk;
            }
        }
        if !cur.is_empty() || out.is_empty() {
            out.push(cur);
        }
        out
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        self.measure_wrapped(text, style, None)
    }

    fn measure_wrapped(
        &self,
        text: &str,
        style: &TextStyle,
        max_width: Option<f64>,
    ) -> TextMetrics {
        let (_, lh) = self.factors();
        let font_size = style.font_size.max(1.0);

        let mut lines: Vec<String> = Vec::new();
        for raw in text.split('\n') {
            match max_width.filter(|w| w.is_finite() && *w > 0.0) {
                Some(limit) => lines.extend(self.wrap_line(raw, style, limit)),
                None => lines.push(raw.to_string()),
            }
        }
        if lines.is_empty() {
            lines.push(String::new());
        }

        let width = lines
            .iter()
            .map(|l| self.line_width_px(l, style))
            .fold(0.0, f64::max);
        TextMetrics {
            width,
            height: lines.len() as f64 * font_size * lh,
            line_count: lines.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m() -> DeterministicTextMeasurer {
        DeterministicTextMeasurer::default()
    }

    #[test]
    fn measure_uses_widest_line() {
        let style = TextStyle::default();
        let tm = m().measure("ab\nabcd", &style);
        // 4 columns * 16px * 0.6
        assert!((tm.width - 38.4).abs() < 1e-9);
        assert_eq!(tm.line_count, 2);
    }

    #[test]
    fn wrapping_splits_on_words() {
        let style = TextStyle::default();
        let unwrapped = m().measure("one two three four", &style);
        let wrapped = m().measure_wrapped("one two three four", &style, Some(unwrapped.width / 2.0));
        assert!(wrapped.line_count > 1);
        assert!(wrapped.width <= unwrapped.width / 2.0 + 1e-9);
        assert!(wrapped.height > unwrapped.height);
    }

    #[test]
    fn long_tokens_are_hard_split() {
        let style = TextStyle::default();
        let tm = m().measure_wrapped("aaaaaaaaaaaaaaaaaaaa", &style, Some(48.0));
        assert!(tm.line_count > 1);
    }

    #[test]
    fn wide_chars_count_double() {
        let style = TextStyle::default();
        let narrow = m().measure("ab", &style);
        let wide = m().measure("你", &style);
        assert!((narrow.width - wide.width).abs() < 1e-9);
    }

    #[test]
    fn measuring_is_idempotent() {
        let style = TextStyle::default();
        let a = m().measure_wrapped("some label text", &style, Some(100.0));
        let b = m().measure_wrapped("some label text", &style, Some(100.0));
        assert_eq!(a.width.to_bits(), b.width.to_bits());
        assert_eq!(a.height.to_bits(), b.height.to_bits());
    }
}
