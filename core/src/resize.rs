use crate::MediaRef;
use serde::{Deserialize, Serialize};

pub const MIN_MEDIA_WIDTH: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn rounded(self) -> (u32, u32) {
        (self.width.round().max(1.0) as u32, self.height.round().max(1.0) as u32)
    }
}

/// Follows whichever drag axis asks for the larger box, keeping the start
/// aspect ratio. Width is clamped to [MIN_MEDIA_WIDTH, max_width].
pub fn resize_preserving_aspect(start: Size, dx: f64, dy: f64, max_width: f64) -> Size {
    let ratio = start.width / start.height;
    let mut width = start.width + dx;
    let mut height = width / ratio;
    if height < start.height + dy {
        height = start.height + dy;
        width = height * ratio;
    }
    let upper = max_width.max(MIN_MEDIA_WIDTH);
    let clamped = width.clamp(MIN_MEDIA_WIDTH, upper);
    if clamped != width {
        width = clamped;
        height = width / ratio;
    }
    Size { width, height }
}

/// One pointer-down to pointer-up interaction on a media resize handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeGesture {
    pub target: MediaRef,
    start: Size,
    max_width: f64,
    current: Size,
}

impl ResizeGesture {
    /// `None` for degenerate start sizes, which have no usable aspect ratio.
    pub fn new(target: MediaRef, start: Size, max_width: f64) -> Option<Self> {
        if !(start.width > 0.0 && start.height > 0.0) {
            return None;
        }
        Some(Self { target, start, max_width, current: start })
    }

    pub fn drag(&mut self, dx: f64, dy: f64) -> Size {
        self.current = resize_preserving_aspect(self.start, dx, dy, self.max_width);
        self.current
    }

    pub fn start(&self) -> Size {
        self.start
    }

    pub fn current(&self) -> Size {
        self.current
    }
}
