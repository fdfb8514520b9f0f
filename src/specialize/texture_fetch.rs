//! Texture fetch specialization: dimensions, format, target, wrap modes.
//!
//! The fetch callable owns the whole address computation: it wraps raw
//! integer texel coordinates per axis, indexes the pixel bytes for the
//! texture's format and dimensionality, and decodes the texel to float
//! RGBA. Filtering stays outside; the sampler calls the fetch once for
//! nearest and four times for bilinear.

use std::rc::Rc;

use crate::texture::Texture;
use crate::types::*;

use super::{Fnv32, SpecKey};

/// Fetches one texel: (pixels, x, y, z) to float RGBA.
pub type TextureFetchOp = dyn Fn(&[u8], i32, i32, i32) -> [f32; 4];

/// Identity fields of a texture; any change forces re-resolution.
#[derive(Clone, PartialEq)]
pub struct TextureFetchKey {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: GLenum,
    pub target: GLenum,
    pub wrap_s: GLenum,
    pub wrap_t: GLenum,
    pub wrap_r: GLenum,
}

impl TextureFetchKey {
    pub(crate) fn from_texture(tex: &Texture) -> Self {
        Self {
            width: tex.width,
            height: tex.height,
            depth: tex.depth,
            format: tex.format,
            target: tex.target,
            wrap_s: tex.wrap_s,
            wrap_t: tex.wrap_t,
            wrap_r: tex.wrap_r,
        }
    }
}

impl SpecKey for TextureFetchKey {
    type Op = TextureFetchOp;

    fn hash32(&self) -> u32 {
        let mut h = Fnv32::new();
        h.write_u32(self.width);
        h.write_u32(self.height);
        h.write_u32(self.depth);
        h.write_u32(self.format);
        h.write_u32(self.target);
        h.write_u32(self.wrap_s);
        h.write_u32(self.wrap_t);
        h.write_u32(self.wrap_r);
        h.finish()
    }
}

/// Wrap an integer texel coordinate into [0, n).
fn wrap_texel(i: i32, n: i32, mode: GLenum) -> i32 {
    match mode {
        GL_REPEAT => i.rem_euclid(n),
        GL_MIRRORED_REPEAT => {
            let j = i.rem_euclid(2 * n);
            if j < n {
                j
            } else {
                2 * n - 1 - j
            }
        }
        _ => i.clamp(0, n - 1),
    }
}

/// Bytes per texel for the stored format.
pub(crate) fn format_size(format: GLenum) -> usize {
    match format {
        GL_RGB | GL_RGB8 => 3,
        _ => 4,
    }
}

/// State-branching fallback used whenever codegen declines the key.
pub fn build_interpreter(key: &TextureFetchKey) -> Rc<TextureFetchOp> {
    let k = key.clone();
    Rc::new(move |pixels: &[u8], x: i32, y: i32, z: i32| {
        if k.width == 0 || k.height == 0 || pixels.is_empty() {
            return [0.0, 0.0, 0.0, 1.0];
        }
        let w = k.width as i32;
        let h = k.height as i32;
        let d = k.depth.max(1) as i32;
        let x = wrap_texel(x, w, k.wrap_s);
        let y = wrap_texel(y, h, k.wrap_t);
        let z = wrap_texel(z, d, k.wrap_r);
        let bpp = format_size(k.format);
        let idx = ((z * h + y) * w + x) as usize * bpp;
        if idx + bpp > pixels.len() {
            return [0.0, 0.0, 0.0, 1.0];
        }
        let r = pixels[idx] as f32 / 255.0;
        let g = pixels[idx + 1] as f32 / 255.0;
        let b = pixels[idx + 2] as f32 / 255.0;
        let a = if bpp == 4 {
            pixels[idx + 3] as f32 / 255.0
        } else {
            1.0
        };
        [r, g, b, a]
    })
}
