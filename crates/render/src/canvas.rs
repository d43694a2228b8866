//! The blit boundary between the engine and the host surface.

use crate::pixels::PixelBuffer;
use viewer_core::RectF;

/// Something tiles can be drawn onto.
///
/// `dest` is in viewport pixels; the buffer is stretched to fill it,
/// which is how zoom levels between sample sizes are displayed.
pub trait Canvas {
    fn draw_buffer(&mut self, buffer: &PixelBuffer, dest: RectF);
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct Blit {
    pub buffer_width: u32,
    pub buffer_height: u32,
    pub dest: RectF,
}

/// Canvas that records blits instead of rasterizing them.
///
/// Used by the scenario tests and handy for host-side diagnostics
/// (what would be drawn, where).
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub blits: Vec<Blit>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.blits.clear();
    }
}

impl Canvas for RecordingCanvas {
    fn draw_buffer(&mut self, buffer: &PixelBuffer, dest: RectF) {
        self.blits.push(Blit {
            buffer_width: buffer.width,
            buffer_height: buffer.height,
            dest,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::PixelFormat;

    #[test]
    fn recording_canvas_captures_draws_in_order() {
        let buffer = PixelBuffer {
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8888,
            data: vec![0; 16],
        };

        let mut canvas = RecordingCanvas::new();
        canvas.draw_buffer(&buffer, RectF::from_size(10.0, 10.0));
        canvas.draw_buffer(&buffer, RectF::new(10.0, 0.0, 20.0, 10.0));

        assert_eq!(canvas.blits.len(), 2);
        assert_eq!(canvas.blits[0].dest, RectF::from_size(10.0, 10.0));
        assert_eq!(canvas.blits[1].dest.left, 10.0);

        canvas.clear();
        assert!(canvas.blits.is_empty());
    }
}
