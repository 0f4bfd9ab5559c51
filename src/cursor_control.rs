//! Cursor position queries.
//!
//! Captured samples are labelled with the pointer position at capture time.
//! On X11 the position comes from a `QueryPointer` request on the root window;
//! offline replays use a fixed position instead.

use crate::error::{Error, Result};
use log::info;
use x11rb::{
    connection::Connection,
    protocol::xproto::{ConnectionExt, Window},
    rust_connection::RustConnection,
};

/// Source of the current cursor position in screen pixels
pub trait CursorPosition {
    /// Current cursor position as (x, y)
    ///
    /// # Errors
    ///
    /// Returns an error if the position cannot be queried
    fn position(&self) -> Result<(i32, i32)>;
}

/// X11 pointer query
pub struct CursorController {
    connection: RustConnection,
    root: Window,
}

impl CursorController {
    /// Connect to the X11 display named by `$DISPLAY`
    ///
    /// # Errors
    ///
    /// Returns an error if the display cannot be reached
    pub fn new() -> Result<Self> {
        info!("Initializing X11 cursor query");

        let (connection, screen_num) = RustConnection::connect(None)
            .map_err(|e| Error::CursorControl(format!("Failed to connect to X11: {e}")))?;

        let screen = connection
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| Error::CursorControl("Failed to get screen".to_string()))?;

        let root = screen.root;
        info!(
            "Connected to X11 display, screen: {}x{}",
            screen.width_in_pixels, screen.height_in_pixels
        );

        Ok(Self { connection, root })
    }
}

impl CursorPosition for CursorController {
    fn position(&self) -> Result<(i32, i32)> {
        let reply = self
            .connection
            .query_pointer(self.root)
            .map_err(|e| Error::CursorControl(format!("Failed to send query pointer: {e}")))?
            .reply()
            .map_err(|e| Error::CursorControl(format!("Failed to query pointer: {e}")))?;

        Ok((i32::from(reply.root_x), i32::from(reply.root_y)))
    }
}

/// Cursor that never moves, for replays without a display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedCursor {
    /// Reported x coordinate
    pub x: i32,
    /// Reported y coordinate
    pub y: i32,
}

impl FixedCursor {
    /// Create a fixed cursor
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl CursorPosition for FixedCursor {
    fn position(&self) -> Result<(i32, i32)> {
        Ok((self.x, self.y))
    }
}
