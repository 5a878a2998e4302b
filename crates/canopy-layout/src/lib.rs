#![forbid(unsafe_code)]

//! Size-aware tidy tree layout (headless).
//!
//! Node boxes grow with their rich content, so measuring and positioning are
//! two passes over the same tree: [`size`] derives a box per node from its
//! content descriptor, [`layout`] assigns every visible node an `(x, y)` so
//! siblings never overlap and depth always moves rightward. Both passes are
//! deterministic: identical inputs reproduce identical output, byte for byte.

pub mod diff;
pub mod layout;
pub mod size;
pub mod text;

pub use diff::{LayoutDiff, MovedNode, diff_layouts};
pub use layout::{LayoutConfig, LayoutEdge, LayoutResult, layout};
pub use size::{SizeConfig, SizeLocks, measure_node};
pub use text::{DeterministicTextMeasurer, TextMeasurer, TextMetrics, TextStyle};
