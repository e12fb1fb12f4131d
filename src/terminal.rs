//! Terminal collaborator interface
//!
//! The engine does not own a screen buffer. It talks to the host terminal
//! through [`TerminalHandle`], which exposes cursor/buffer introspection and
//! line markers. [`CursorTracker`] is a minimal implementation for hosts that
//! only have a byte stream (and for tests).

/// Identifier of a registered marker
pub type MarkerId = u64;

/// A zero-width marker pinned to an absolute buffer line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Marker {
    /// Unique marker id
    pub id: MarkerId,
    /// Absolute line (scrollback lines + viewport row)
    pub line: usize,
}

/// Buffer and cursor access required by the shell integration engine
///
/// Lines are absolute: `base_y` is the number of lines scrolled off the top of
/// the viewport, so the cursor's absolute line is `base_y() + cursor_y()`.
pub trait TerminalHandle: Send {
    /// Cursor column (0-indexed)
    fn cursor_x(&self) -> usize;

    /// Cursor row within the viewport (0-indexed)
    fn cursor_y(&self) -> usize;

    /// Absolute line of the top of the viewport
    fn base_y(&self) -> usize;

    /// Viewport width
    fn cols(&self) -> usize;

    /// Viewport height
    fn rows(&self) -> usize;

    /// Register a marker `cursor_y_offset` lines from the cursor line
    ///
    /// Returns `None` when the target line lies outside the buffer.
    fn register_marker(&mut self, cursor_y_offset: isize) -> Option<Marker>;

    /// Whether `CSI 2 J` pushes the viewport into scrollback instead of erasing it
    fn scroll_on_erase_in_display(&self) -> bool {
        false
    }

    /// Printable character seen by the stream parser
    fn print(&mut self, _c: char) {}

    /// C0 control seen by the stream parser
    fn execute(&mut self, _byte: u8) {}

    /// CSI sequence seen by the stream parser (first parameter, final byte)
    fn csi(&mut self, _param: u16, _action: char) {}

    /// Absolute cursor line
    fn cursor_line(&self) -> usize {
        self.base_y() + self.cursor_y()
    }
}

/// Minimal cursor model implementing [`TerminalHandle`]
///
/// Tracks column, row, scrollback depth and markers. It understands printable
/// characters (with autowrap), CR, LF, BS, CUP/HVP and ED; everything else is
/// left to the real emulator.
#[derive(Debug, Clone)]
pub struct CursorTracker {
    cols: usize,
    rows: usize,
    cursor_x: usize,
    cursor_y: usize,
    base_y: usize,
    next_marker_id: MarkerId,
    scroll_on_erase_in_display: bool,
}

impl CursorTracker {
    /// Create a tracker for a `cols` x `rows` viewport
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
            cursor_x: 0,
            cursor_y: 0,
            base_y: 0,
            next_marker_id: 1,
            scroll_on_erase_in_display: false,
        }
    }

    /// Move the cursor (clamped to the viewport)
    pub fn set_cursor(&mut self, x: usize, y: usize) {
        self.cursor_x = x.min(self.cols - 1);
        self.cursor_y = y.min(self.rows - 1);
    }

    /// Override the scrollback depth
    pub fn set_base_y(&mut self, base_y: usize) {
        self.base_y = base_y;
    }

    /// Set the erase-in-display behavior
    pub fn set_scroll_on_erase_in_display(&mut self, enabled: bool) {
        self.scroll_on_erase_in_display = enabled;
    }

    fn line_feed(&mut self) {
        if self.cursor_y + 1 >= self.rows {
            self.base_y += 1;
        } else {
            self.cursor_y += 1;
        }
    }
}

impl TerminalHandle for CursorTracker {
    fn cursor_x(&self) -> usize {
        self.cursor_x
    }

    fn cursor_y(&self) -> usize {
        self.cursor_y
    }

    fn base_y(&self) -> usize {
        self.base_y
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn register_marker(&mut self, cursor_y_offset: isize) -> Option<Marker> {
        let line = self.cursor_line().checked_add_signed(cursor_y_offset)?;
        if line >= self.base_y + self.rows {
            return None;
        }
        let id = self.next_marker_id;
        self.next_marker_id += 1;
        Some(Marker { id, line })
    }

    fn scroll_on_erase_in_display(&self) -> bool {
        self.scroll_on_erase_in_display
    }

    fn print(&mut self, _c: char) {
        if self.cursor_x >= self.cols {
            self.cursor_x = 0;
            self.line_feed();
        }
        self.cursor_x += 1;
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\r' => self.cursor_x = 0,
            b'\n' | b'\x0b' | b'\x0c' => self.line_feed(),
            b'\x08' => self.cursor_x = self.cursor_x.saturating_sub(1),
            _ => {}
        }
    }

    fn csi(&mut self, param: u16, action: char) {
        match action {
            'H' | 'f' => {
                // Only the row is passed through; CUP with a row resets the column
                let row = usize::from(param.max(1)) - 1;
                self.set_cursor(0, row);
            }
            'J' if param == 2 && self.scroll_on_erase_in_display => {
                self.base_y += self.cursor_y + 1;
                self.cursor_y = 0;
            }
            _ => {}
        }
    }
}
