//! The contract between the core and a user interface implementation.
//!
//! The core never renders; it hands a fully built display buffer plus status
//! and mode lines to whatever implements [`UserInterface`] and polls it for
//! keys. Terminal drivers, test harnesses, and remote clients all sit behind
//! this trait.

use crate::display::{DisplayBuffer, DisplayLine};
use crate::keymap::Key;

/// Screen dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDimensions {
    /// Number of text rows.
    pub lines: usize,
    /// Number of text columns.
    pub columns: usize,
}

/// Callback invoked when input becomes available.
pub type InputCallback = Box<dyn FnMut()>;

/// What the core requires of a user interface.
pub trait UserInterface {
    /// Render a frame: the window content plus the status and mode lines.
    fn draw(
        &mut self,
        display_buffer: &DisplayBuffer<'_>,
        status_line: &DisplayLine<'_>,
        mode_line: &DisplayLine<'_>,
    );

    /// Current screen dimensions.
    fn dimensions(&self) -> ScreenDimensions;

    /// Whether a key can be read without blocking.
    fn is_key_available(&self) -> bool;

    /// Read the next key, blocking until one arrives.
    fn get_key(&mut self) -> Key;

    /// Register the callback to invoke when input becomes available.
    fn set_input_callback(&mut self, callback: InputCallback);

    /// Flush any buffered output to the screen.
    fn refresh(&mut self);
}
