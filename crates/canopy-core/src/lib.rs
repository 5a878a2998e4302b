#![forbid(unsafe_code)]

//! Collaborative mind-map tree model (headless).
//!
//! Design goals:
//! - deterministic, testable state transitions (no hidden singletons, no wall-clock
//!   reads outside the injectable [`Clock`])
//! - a single rooted tree as the only shared resource, mutated by one turn owner
//!   at a time
//! - remote mutations merge against local in-flight edits without ever clobbering
//!   what the user is actively typing

pub mod cache;
pub mod clock;
pub mod content;
pub mod error;
pub mod events;
pub mod geom;
pub mod history;
pub mod merge;
pub mod node;
pub mod order;
pub mod registry;
pub mod restructure;
pub mod snapshot;
pub mod tree;

pub use cache::PositionCache;
pub use clock::Clock;
pub use content::{ImageRef, NodeContent, RichText};
pub use error::{Error, Result};
pub use events::{RemoteEnvelope, RemoteEvent};
pub use geom::{Bounds, Point, Rect};
pub use history::HistoryRing;
pub use merge::{MergeEngine, MergeOutcome, RelayoutScope};
pub use node::{Node, NodeBadges, NodeRecord, Size};
pub use order::OrderIndex;
pub use registry::PendingEditRegistry;
pub use restructure::{DragState, DropPosition, ReparentOutcome, reparent};
pub use snapshot::{EdgeSnapshot, NodeSnapshot};
pub use tree::{Edge, ROOT_ID, TreeState};
