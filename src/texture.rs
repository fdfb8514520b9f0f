//! Texture objects and the texture store.
//!
//! Textures are created on first bind, keyed by handle in a slot table.
//! Each object tracks which identity fields changed since its fetch
//! callable was specialized; `prepare_draw` re-resolves only textures
//! whose key fields are dirty, through the back-reference held here.

use std::rc::Rc;

use bitflags::bitflags;

use crate::specialize::texture_fetch::format_size;
use crate::specialize::TextureFetchOp;
use crate::state::GlContext;
use crate::types::*;

bitflags! {
    /// Per-texture dirty mask, one bit per identity field.
    pub struct TextureDirty: u32 {
        const WIDTH  = 1 << 0;
        const HEIGHT = 1 << 1;
        const DEPTH  = 1 << 2;
        const FORMAT = 1 << 3;
        const TARGET = 1 << 4;
        const WRAP_S = 1 << 5;
        const WRAP_T = 1 << 6;
        const WRAP_R = 1 << 7;

        /// Fields that participate in the fetch specialization key.
        const FETCH_KEY = Self::WIDTH.bits | Self::HEIGHT.bits | Self::DEPTH.bits
            | Self::FORMAT.bits | Self::TARGET.bits
            | Self::WRAP_S.bits | Self::WRAP_T.bits | Self::WRAP_R.bits;
    }
}

/// A texture object (1D, 2D or 3D).
pub struct Texture {
    pub target: GLenum,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: GLenum,
    pub wrap_s: GLenum,
    pub wrap_t: GLenum,
    pub wrap_r: GLenum,
    pub min_filter: GLenum,
    pub mag_filter: GLenum,
    /// Raw texel bytes, `format_size(format)` per texel.
    pub pixels: Vec<u8>,
    pub initialized: bool,
    pub dirty: TextureDirty,
    /// Specialized fetch for this texture's current identity fields.
    pub fetch_op: Option<Rc<TextureFetchOp>>,
}

impl Texture {
    fn new(target: GLenum) -> Self {
        Self {
            target,
            width: 0,
            height: 0,
            depth: 1,
            format: GL_RGBA,
            wrap_s: GL_REPEAT,
            wrap_t: GL_REPEAT,
            wrap_r: GL_REPEAT,
            min_filter: GL_NEAREST_MIPMAP_LINEAR,
            mag_filter: GL_LINEAR,
            pixels: Vec::new(),
            initialized: false,
            dirty: TextureDirty::all(),
            fetch_op: None,
        }
    }

    /// Sample at normalized (s, t) through the specialized fetch,
    /// nearest or bilinear per the mag filter.
    pub(crate) fn sample(&self, fetch: &TextureFetchOp, s: f32, t: f32) -> [f32; 4] {
        let w = self.width as f32;
        let h = self.height as f32;
        match self.mag_filter {
            GL_LINEAR => {
                let fx = s * w - 0.5;
                let fy = t * h - 0.5;
                let x0 = fx.floor() as i32;
                let y0 = fy.floor() as i32;
                let ax = fx - x0 as f32;
                let ay = fy - y0 as f32;
                let s00 = fetch(&self.pixels, x0, y0, 0);
                let s10 = fetch(&self.pixels, x0 + 1, y0, 0);
                let s01 = fetch(&self.pixels, x0, y0 + 1, 0);
                let s11 = fetch(&self.pixels, x0 + 1, y0 + 1, 0);
                let mut out = [0.0f32; 4];
                for i in 0..4 {
                    let top = s00[i] + (s10[i] - s00[i]) * ax;
                    let bot = s01[i] + (s11[i] - s01[i]) * ax;
                    out[i] = top + (bot - top) * ay;
                }
                out
            }
            _ => fetch(
                &self.pixels,
                (s * w).floor() as i32,
                (t * h).floor() as i32,
                0,
            ),
        }
    }
}

/// Slot table of texture objects.
pub struct TextureStore {
    slots: Vec<Option<Texture>>,
    next_id: u32,
}

impl TextureStore {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 1,
        }
    }

    /// Reserve `n` unused handles. Objects appear on first bind.
    pub fn gen(&mut self, n: usize, ids: &mut [u32]) {
        for slot in ids.iter_mut().take(n) {
            *slot = self.next_id;
            self.next_id += 1;
        }
    }

    /// Create the object for `id` if it does not exist yet.
    fn ensure(&mut self, id: u32, target: GLenum) {
        while self.slots.len() <= id as usize {
            self.slots.push(None);
        }
        let slot = &mut self.slots[id as usize];
        if slot.is_none() {
            *slot = Some(Texture::new(target));
        }
    }

    pub fn get(&self, id: u32) -> Option<&Texture> {
        if id == 0 {
            return None;
        }
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Texture> {
        if id == 0 {
            return None;
        }
        self.slots.get_mut(id as usize).and_then(|s| s.as_mut())
    }

    pub fn delete(&mut self, id: u32) {
        if id > 0 && (id as usize) < self.slots.len() {
            self.slots[id as usize] = None;
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Texture> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }
}

impl Default for TextureStore {
    fn default() -> Self {
        Self::new()
    }
}

fn valid_wrap(mode: GLenum) -> bool {
    matches!(
        mode,
        GL_REPEAT | GL_MIRRORED_REPEAT | GL_CLAMP | GL_CLAMP_TO_EDGE | GL_CLAMP_TO_BORDER
    )
}

fn valid_min_filter(mode: GLenum) -> bool {
    matches!(
        mode,
        GL_NEAREST
            | GL_LINEAR
            | GL_NEAREST_MIPMAP_NEAREST
            | GL_LINEAR_MIPMAP_NEAREST
            | GL_NEAREST_MIPMAP_LINEAR
            | GL_LINEAR_MIPMAP_LINEAR
    )
}

fn valid_format(format: GLenum) -> bool {
    matches!(format, GL_RGB | GL_RGBA | GL_RGB8 | GL_RGBA8)
}

// ── Context API ──────────────────────────────────────────────────────────────

impl GlContext {
    pub fn gen_textures(&mut self, ids: &mut [GLuint]) {
        self.textures.gen(ids.len(), ids);
    }

    pub fn delete_textures(&mut self, ids: &[GLuint]) {
        for &id in ids {
            self.textures.delete(id);
            if self.binding_1d == id {
                self.binding_1d = 0;
            }
            if self.binding_2d == id {
                self.binding_2d = 0;
            }
            if self.binding_3d == id {
                self.binding_3d = 0;
            }
        }
    }

    pub fn is_texture(&self, id: GLuint) -> bool {
        self.textures.contains(id)
    }

    /// Bind `id` to `target`, creating the object on first bind.
    pub fn bind_texture(&mut self, target: GLenum, id: GLuint) {
        let binding = match target {
            GL_TEXTURE_1D => &mut self.binding_1d,
            GL_TEXTURE_2D => &mut self.binding_2d,
            GL_TEXTURE_3D => &mut self.binding_3d,
            _ => {
                self.set_error(GL_INVALID_ENUM);
                return;
            }
        };
        if id == 0 {
            *binding = 0;
            return;
        }
        if let Some(tex) = self.textures.get(id) {
            if tex.target != target {
                self.set_error(GL_INVALID_OPERATION);
                return;
            }
        } else {
            self.textures.ensure(id, target);
        }
        match target {
            GL_TEXTURE_1D => self.binding_1d = id,
            GL_TEXTURE_2D => self.binding_2d = id,
            GL_TEXTURE_3D => self.binding_3d = id,
            _ => {}
        }
    }

    fn binding_for(&self, target: GLenum) -> Option<GLuint> {
        match target {
            GL_TEXTURE_1D => Some(self.binding_1d),
            GL_TEXTURE_2D => Some(self.binding_2d),
            GL_TEXTURE_3D => Some(self.binding_3d),
            _ => None,
        }
    }

    fn tex_image(
        &mut self,
        target: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        format: GLenum,
        pixels: &[u8],
    ) {
        if width < 0 || height < 0 || depth < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        if !valid_format(format) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        let Some(binding) = self.binding_for(target) else {
            self.set_error(GL_INVALID_ENUM);
            return;
        };
        let Some(tex) = self.textures.get_mut(binding) else {
            self.set_error(GL_INVALID_OPERATION);
            return;
        };
        let texels = width as usize * height as usize * depth.max(1) as usize;
        let len = texels * format_size(format);
        let mut data = vec![0u8; len];
        let n = len.min(pixels.len());
        data[..n].copy_from_slice(&pixels[..n]);

        if tex.width != width as u32 {
            tex.dirty.insert(TextureDirty::WIDTH);
        }
        if tex.height != height as u32 {
            tex.dirty.insert(TextureDirty::HEIGHT);
        }
        if tex.depth != depth.max(1) as u32 {
            tex.dirty.insert(TextureDirty::DEPTH);
        }
        if tex.format != format {
            tex.dirty.insert(TextureDirty::FORMAT);
        }
        tex.width = width as u32;
        tex.height = height as u32;
        tex.depth = depth.max(1) as u32;
        tex.format = format;
        tex.pixels = data;
        tex.initialized = true;
    }

    pub fn tex_image_1d(&mut self, target: GLenum, width: i32, format: GLenum, pixels: &[u8]) {
        if target != GL_TEXTURE_1D {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.tex_image(target, width, 1, 1, format, pixels);
    }

    pub fn tex_image_2d(
        &mut self,
        target: GLenum,
        width: i32,
        height: i32,
        format: GLenum,
        pixels: &[u8],
    ) {
        if target != GL_TEXTURE_2D {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.tex_image(target, width, height, 1, format, pixels);
    }

    pub fn tex_image_3d(
        &mut self,
        target: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        format: GLenum,
        pixels: &[u8],
    ) {
        if target != GL_TEXTURE_3D {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.tex_image(target, width, height, depth, format, pixels);
    }

    /// Update a sub-rectangle of the bound 2-D texture.
    ///
    /// Dimensions are unchanged, so the fetch specialization stays valid.
    pub fn tex_sub_image_2d(
        &mut self,
        target: GLenum,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        pixels: &[u8],
    ) {
        if target != GL_TEXTURE_2D {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        let binding = self.binding_2d;
        let Some(tex) = self.textures.get_mut(binding) else {
            self.set_error(GL_INVALID_OPERATION);
            return;
        };
        // widened so corner offsets cannot overflow before the check
        if !tex.initialized
            || x < 0
            || y < 0
            || width < 0
            || height < 0
            || x as i64 + width as i64 > tex.width as i64
            || y as i64 + height as i64 > tex.height as i64
        {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        let bpp = format_size(tex.format);
        let row_len = width as usize * bpp;
        for row in 0..height as usize {
            let src = row * row_len;
            if src + row_len > pixels.len() {
                break;
            }
            let dst = (((y as usize + row) * tex.width as usize) + x as usize) * bpp;
            tex.pixels[dst..dst + row_len].copy_from_slice(&pixels[src..src + row_len]);
        }
    }

    pub fn tex_parameter_i(&mut self, target: GLenum, pname: GLenum, param: GLenum) {
        let Some(binding) = self.binding_for(target) else {
            self.set_error(GL_INVALID_ENUM);
            return;
        };
        let valid = match pname {
            GL_TEXTURE_WRAP_S | GL_TEXTURE_WRAP_T | GL_TEXTURE_WRAP_R => valid_wrap(param),
            GL_TEXTURE_MIN_FILTER => valid_min_filter(param),
            GL_TEXTURE_MAG_FILTER => matches!(param, GL_NEAREST | GL_LINEAR),
            _ => {
                self.set_error(GL_INVALID_ENUM);
                return;
            }
        };
        if !valid {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        let Some(tex) = self.textures.get_mut(binding) else {
            self.set_error(GL_INVALID_OPERATION);
            return;
        };
        match pname {
            GL_TEXTURE_WRAP_S => {
                if tex.wrap_s != param {
                    tex.dirty.insert(TextureDirty::WRAP_S);
                }
                tex.wrap_s = param;
            }
            GL_TEXTURE_WRAP_T => {
                if tex.wrap_t != param {
                    tex.dirty.insert(TextureDirty::WRAP_T);
                }
                tex.wrap_t = param;
            }
            GL_TEXTURE_WRAP_R => {
                if tex.wrap_r != param {
                    tex.dirty.insert(TextureDirty::WRAP_R);
                }
                tex.wrap_r = param;
            }
            GL_TEXTURE_MIN_FILTER => tex.min_filter = param,
            GL_TEXTURE_MAG_FILTER => tex.mag_filter = param,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_creates_on_first_bind() {
        let mut ctx = GlContext::new(4, 4);
        let mut ids = [0u32; 1];
        ctx.gen_textures(&mut ids);
        assert!(!ctx.is_texture(ids[0]));
        ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
        assert!(ctx.is_texture(ids[0]));
        assert_eq!(ctx.get_error(), GL_NO_ERROR);
    }

    #[test]
    fn rebinding_to_other_target_is_rejected() {
        let mut ctx = GlContext::new(4, 4);
        let mut ids = [0u32; 1];
        ctx.gen_textures(&mut ids);
        ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
        ctx.bind_texture(GL_TEXTURE_1D, ids[0]);
        assert_eq!(ctx.get_error(), GL_INVALID_OPERATION);
        assert_eq!(ctx.binding_1d, 0);
    }

    #[test]
    fn tex_image_marks_key_fields_dirty() {
        let mut ctx = GlContext::new(4, 4);
        let mut ids = [0u32; 1];
        ctx.gen_textures(&mut ids);
        ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
        let tex = ctx.textures.get_mut(ids[0]).unwrap();
        tex.dirty = TextureDirty::empty();
        ctx.tex_image_2d(GL_TEXTURE_2D, 2, 2, GL_RGBA, &[0u8; 16]);
        let tex = ctx.textures.get(ids[0]).unwrap();
        assert!(tex.dirty.contains(TextureDirty::WIDTH | TextureDirty::HEIGHT));
        assert!(tex.initialized);
    }

    #[test]
    fn sub_image_keeps_key_clean() {
        let mut ctx = GlContext::new(4, 4);
        let mut ids = [0u32; 1];
        ctx.gen_textures(&mut ids);
        ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
        ctx.tex_image_2d(GL_TEXTURE_2D, 2, 2, GL_RGBA, &[0u8; 16]);
        let tex = ctx.textures.get_mut(ids[0]).unwrap();
        tex.dirty = TextureDirty::empty();
        ctx.tex_sub_image_2d(GL_TEXTURE_2D, 0, 0, 1, 1, &[255, 0, 0, 255]);
        let tex = ctx.textures.get(ids[0]).unwrap();
        assert!(tex.dirty.is_empty());
        assert_eq!(&tex.pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn sub_image_rejects_overflowing_offsets() {
        let mut ctx = GlContext::new(4, 4);
        let mut ids = [0u32; 1];
        ctx.gen_textures(&mut ids);
        ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
        ctx.tex_image_2d(GL_TEXTURE_2D, 2, 2, GL_RGBA, &[0u8; 16]);
        ctx.tex_sub_image_2d(GL_TEXTURE_2D, i32::MAX, 0, 1, 1, &[255u8; 4]);
        assert_eq!(ctx.get_error(), GL_INVALID_VALUE);
        let tex = ctx.textures.get(ids[0]).unwrap();
        assert!(tex.pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn parameter_change_respecializes_only_that_texture() {
        let mut ctx = GlContext::new(4, 4);
        let mut ids = [0u32; 2];
        ctx.gen_textures(&mut ids);
        ctx.enable(GL_TEXTURE_2D);
        ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
        ctx.tex_image_2d(GL_TEXTURE_2D, 2, 2, GL_RGBA, &[0u8; 16]);
        ctx.prepare_draw();
        let op_a = ctx.textures.get(ids[0]).unwrap().fetch_op.clone().unwrap();
        ctx.bind_texture(GL_TEXTURE_2D, ids[1]);
        ctx.tex_image_2d(GL_TEXTURE_2D, 4, 4, GL_RGBA, &[0u8; 64]);
        ctx.prepare_draw();
        let op_b = ctx.textures.get(ids[1]).unwrap().fetch_op.clone().unwrap();

        ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
        ctx.tex_parameter_i(GL_TEXTURE_2D, GL_TEXTURE_WRAP_S, GL_CLAMP_TO_EDGE);
        ctx.prepare_draw();
        let a = ctx.textures.get(ids[0]).unwrap().fetch_op.clone().unwrap();
        let b = ctx.textures.get(ids[1]).unwrap().fetch_op.clone().unwrap();
        assert!(!Rc::ptr_eq(&op_a, &a));
        assert!(Rc::ptr_eq(&op_b, &b));
    }

    #[test]
    fn delete_clears_binding() {
        let mut ctx = GlContext::new(4, 4);
        let mut ids = [0u32; 1];
        ctx.gen_textures(&mut ids);
        ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
        ctx.delete_textures(&ids);
        assert!(!ctx.is_texture(ids[0]));
        assert_eq!(ctx.binding_2d, 0);
    }

    #[test]
    fn invalid_wrap_leaves_state_untouched() {
        let mut ctx = GlContext::new(4, 4);
        let mut ids = [0u32; 1];
        ctx.gen_textures(&mut ids);
        ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
        ctx.tex_parameter_i(GL_TEXTURE_2D, GL_TEXTURE_WRAP_S, GL_TRIANGLES);
        assert_eq!(ctx.get_error(), GL_INVALID_ENUM);
        assert_eq!(ctx.textures.get(ids[0]).unwrap().wrap_s, GL_REPEAT);
    }
}
