//! CPU-resident render targets.
//!
//! A `Framebuffer` owns three planes sized at context creation: an RGBA
//! float color buffer, a float depth buffer, and a byte stencil buffer.
//! Index layout is row-major, `y * width + x`, with y = 0 at the bottom
//! of clip space.

/// Color (f32 RGBA), depth (f32) and stencil (u8) planes.
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA components, four per pixel.
    pub color: Vec<f32>,
    pub depth: Vec<f32>,
    pub stencil: Vec<u8>,
}

impl Framebuffer {
    /// Allocate zeroed planes; depth starts cleared to 1.0.
    pub fn new(width: u32, height: u32) -> Self {
        let npixels = (width as usize) * (height as usize);
        Self {
            width,
            height,
            color: vec![0.0; npixels * 4],
            depth: vec![1.0; npixels],
            stencil: vec![0; npixels],
        }
    }

    #[inline]
    pub fn pixel_index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + x as usize
    }

    /// Fill the color plane, honoring the per-channel write mask.
    pub fn clear_color(&mut self, color: [f32; 4], mask: [bool; 4]) {
        for px in self.color.chunks_exact_mut(4) {
            for i in 0..4 {
                if mask[i] {
                    px[i] = color[i];
                }
            }
        }
    }

    /// Fill the depth plane when depth writes are enabled.
    pub fn clear_depth(&mut self, value: f32, write: bool) {
        if !write {
            return;
        }
        let value = value.clamp(0.0, 1.0);
        for d in &mut self.depth {
            *d = value;
        }
    }

    /// Fill the stencil plane.
    pub fn clear_stencil(&mut self, value: u8) {
        for s in &mut self.stencil {
            *s = value;
        }
    }

    /// Read back one pixel's RGBA color.
    pub fn color_at(&self, x: u32, y: u32) -> [f32; 4] {
        let i = self.pixel_index(x, y) * 4;
        [
            self.color[i],
            self.color[i + 1],
            self.color[i + 2],
            self.color[i + 3],
        ]
    }

    /// Read back one pixel's stored depth.
    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[self.pixel_index(x, y)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_color_honors_mask() {
        let mut fb = Framebuffer::new(4, 4);
        fb.clear_color([1.0, 0.5, 0.25, 1.0], [true, false, true, true]);
        assert_eq!(fb.color_at(2, 3), [1.0, 0.0, 0.25, 1.0]);
    }

    #[test]
    fn clear_depth_respects_write_flag() {
        let mut fb = Framebuffer::new(2, 2);
        fb.clear_depth(0.5, false);
        assert_eq!(fb.depth_at(0, 0), 1.0);
        fb.clear_depth(0.5, true);
        assert_eq!(fb.depth_at(1, 1), 0.5);
    }
}
