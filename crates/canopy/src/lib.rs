#![forbid(unsafe_code)]

//! `canopy` is a headless engine for a collaborative mind-map editor.
//!
//! The tree model, fractional sibling ordering, restructure and merge engines
//! live in [`canopy_core`]; content-aware box sizing and the tidy tree layout
//! live in [`canopy_layout`]. This crate ties them into an [`EditorSession`]:
//! local UI actions and queued remote events drive one shared tree, and a
//! cooperative [`EditorSession::idle_tick`] batches measuring, layout, saves
//! and broadcasts.
//!
//! Rendering, rich-text editing, the realtime channel and storage are all
//! external collaborators; the session reaches them only through the
//! [`Transport`] and [`Persistence`] traits and the editor-surface
//! notification methods.

pub use canopy_core::*;

pub mod layout {
    pub use canopy_layout::diff::{LayoutDiff, MovedNode, diff_layouts};
    pub use canopy_layout::layout::{LayoutConfig, LayoutEdge, LayoutResult, layout};
    pub use canopy_layout::size::{IMAGES_PER_ROW, SizeConfig, SizeLocks, measure_node};
    pub use canopy_layout::text::{
        DeterministicTextMeasurer, TextMeasurer, TextMetrics, TextStyle,
    };
}

mod boundary;
mod session;

pub use boundary::{
    NullPersistence, NullTransport, Persistence, RecordingPersistence, RecordingTransport,
    Transport,
};
pub use session::{EditorSession, SessionConfig, TickReport};
