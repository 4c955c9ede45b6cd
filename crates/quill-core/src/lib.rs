#![warn(missing_docs)]
//! `quill-core` - Headless display kernel for a modal terminal editor.
//!
//! # Overview
//!
//! `quill-core` holds the state and data structures the display pipeline of a
//! modal editor is built from. It does not render and it does not own a
//! highlighting policy; it provides:
//!
//! - **Buffer view**: line-indexed UTF-8 text with a monotone edit timestamp
//!   and the line-modification protocol incremental consumers replay
//! - **Display buffer**: the ephemeral intermediate representation a redraw
//!   builds and highlighters mutate, one styled atom run at a time
//! - **Selections**: anchor/cursor pairs with a designated main selection
//! - **Faces & options**: the styling triple and the typed option table
//! - **Word database**: a per-buffer token multiset for completion, updated
//!   from line deltas
//! - **Event loop**: `poll(2)`-driven fd watchers and timers with
//!   signal-safe forced wakeups
//! - **Key mapping & UI contract**: the seams to the input handler and the
//!   terminal front end
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  UI contract & key mapping                  │  ← front-end seam
//! ├─────────────────────────────────────────────┤
//! │  Display buffer (atoms / lines)             │  ← redraw IR
//! ├─────────────────────────────────────────────┤
//! │  Selections · faces · options · word db     │  ← editor state
//! ├─────────────────────────────────────────────┤
//! │  Buffer view & line-modification protocol   │  ← text access
//! ├─────────────────────────────────────────────┤
//! │  Event loop (poll / timers / self-pipe)     │  ← scheduling
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Highlighting itself lives in the `quill-highlight` crate, which consumes
//! these types.
//!
//! # Concurrency model
//!
//! The core is strictly single-threaded and cooperative. Buffers, display
//! buffers, caches, and the interned-string pool are all mutated on the main
//! thread between event-loop ticks; the poll inside
//! [`event::dispatch_next_events`] is the only blocking point.

pub mod buffer;
pub mod display;
pub mod event;
pub mod face;
pub mod interned;
pub mod keymap;
pub mod option;
pub mod selection;
pub mod ui;
pub mod units;
pub mod word_db;

pub use buffer::{Buffer, BufferId, LineModification};
pub use display::{DisplayAtom, DisplayAtomType, DisplayBuffer, DisplayLine};
pub use face::{Attr, Color, Face, FaceSpecError};
pub use interned::InternedString;
pub use keymap::{Key, KeyCode, KeymapManager, KeymapMode, KeyModifiers};
pub use option::{LineFlag, OptionError, OptionTable, OptionValue};
pub use selection::{Selection, SelectionList};
pub use ui::{InputCallback, ScreenDimensions, UserInterface};
pub use units::{ByteCount, CharCount, LineCount, Position, PositionRange};
pub use word_db::WordDb;
