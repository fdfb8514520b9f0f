//! Client-side vertex arrays.
//!
//! Each pointer call snapshots the caller's bytes, so a draw never reads
//! through a dangling reference. `draw_arrays`/`draw_elements` feed the
//! same assembler as `begin`/`end`; a disabled array leaves the current
//! color/normal/texcoord in effect for every vertex.

use crate::immediate::valid_topology;
use crate::pipeline::MAX_VERTEX_ATTRIBS;
use crate::pipeline::{
    ATTR_A, ATTR_B, ATTR_G, ATTR_NX, ATTR_NY, ATTR_NZ, ATTR_P, ATTR_Q, ATTR_R, ATTR_S, ATTR_T,
    ATTR_W, ATTR_X, ATTR_Y, ATTR_Z,
};
use crate::state::GlContext;
use crate::types::*;

/// One client array binding: layout plus a byte snapshot of the data.
pub(crate) struct ClientArray {
    pub enabled: bool,
    pub size: i32,
    pub type_: GLenum,
    pub stride: i32,
    pub data: Vec<u8>,
}

impl ClientArray {
    pub fn new(size: i32) -> Self {
        Self {
            enabled: false,
            size,
            type_: GL_FLOAT,
            stride: 0,
            data: Vec::new(),
        }
    }

    fn component_size(&self) -> usize {
        type_size(self.type_).unwrap_or(4)
    }

    /// Byte stride between consecutive elements; 0 means tightly packed.
    fn effective_stride(&self) -> usize {
        if self.stride > 0 {
            self.stride as usize
        } else {
            self.size as usize * self.component_size()
        }
    }

    /// Decode element `index` into `out` (one f32 per component).
    /// Returns false when the element lies past the snapshot's end.
    fn fetch(&self, index: usize, normalize: bool, out: &mut [f32]) -> bool {
        let comp = self.component_size();
        let base = index * self.effective_stride();
        let n = self.size as usize;
        if base + n * comp > self.data.len() {
            return false;
        }
        for k in 0..n {
            out[k] = read_component(&self.data[base + k * comp..], self.type_, normalize);
        }
        true
    }
}

/// Decode one component at the head of `bytes`. Integer types divide by
/// the type maximum when `normalize` is set, otherwise they cast raw.
fn read_component(bytes: &[u8], type_: GLenum, normalize: bool) -> f32 {
    let (v, max) = match type_ {
        GL_BYTE => (bytes[0] as i8 as f32, 127.0),
        GL_UNSIGNED_BYTE => (bytes[0] as f32, 255.0),
        GL_SHORT => (i16::from_ne_bytes([bytes[0], bytes[1]]) as f32, 32767.0),
        GL_UNSIGNED_SHORT => (u16::from_ne_bytes([bytes[0], bytes[1]]) as f32, 65535.0),
        GL_INT => (
            i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            2147483647.0,
        ),
        GL_UNSIGNED_INT => (
            u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            4294967295.0,
        ),
        GL_FLOAT => (
            f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            1.0,
        ),
        GL_DOUBLE => (
            f64::from_ne_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as f32,
            1.0,
        ),
        _ => (0.0, 1.0),
    };
    if normalize {
        v / max
    } else {
        v
    }
}

impl GlContext {
    fn client_array_mut(&mut self, array: GLenum) -> Option<&mut ClientArray> {
        match array {
            GL_VERTEX_ARRAY => Some(&mut self.vertex_array),
            GL_COLOR_ARRAY => Some(&mut self.color_array),
            GL_TEXTURE_COORD_ARRAY => Some(&mut self.tex_coord_array),
            GL_NORMAL_ARRAY => Some(&mut self.normal_array),
            _ => {
                self.set_error(GL_INVALID_ENUM);
                None
            }
        }
    }

    pub fn enable_client_state(&mut self, array: GLenum) {
        if let Some(a) = self.client_array_mut(array) {
            a.enabled = true;
        }
    }

    pub fn disable_client_state(&mut self, array: GLenum) {
        if let Some(a) = self.client_array_mut(array) {
            a.enabled = false;
        }
    }

    // ── Pointer setup ───────────────────────────────────────────────────

    pub fn vertex_pointer(&mut self, size: i32, type_: GLenum, stride: i32, data: &[u8]) {
        if !(2..=4).contains(&size) || stride < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        if !matches!(type_, GL_SHORT | GL_INT | GL_FLOAT | GL_DOUBLE) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.vertex_array.size = size;
        self.vertex_array.type_ = type_;
        self.vertex_array.stride = stride;
        self.vertex_array.data = data.to_vec();
    }

    pub fn color_pointer(&mut self, size: i32, type_: GLenum, stride: i32, data: &[u8]) {
        if !(3..=4).contains(&size) || stride < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        if type_size(type_).is_none() {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.color_array.size = size;
        self.color_array.type_ = type_;
        self.color_array.stride = stride;
        self.color_array.data = data.to_vec();
    }

    pub fn tex_coord_pointer(&mut self, size: i32, type_: GLenum, stride: i32, data: &[u8]) {
        if !(1..=4).contains(&size) || stride < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        if !matches!(type_, GL_SHORT | GL_INT | GL_FLOAT | GL_DOUBLE) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.tex_coord_array.size = size;
        self.tex_coord_array.type_ = type_;
        self.tex_coord_array.stride = stride;
        self.tex_coord_array.data = data.to_vec();
    }

    pub fn normal_pointer(&mut self, type_: GLenum, stride: i32, data: &[u8]) {
        if stride < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        if !matches!(type_, GL_BYTE | GL_SHORT | GL_INT | GL_FLOAT | GL_DOUBLE) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.normal_array.type_ = type_;
        self.normal_array.stride = stride;
        self.normal_array.data = data.to_vec();
    }

    // ── Draw calls ──────────────────────────────────────────────────────

    /// Assemble one indexed element into the full attribute block,
    /// falling back to the current color/normal/texcoord for any array
    /// that is disabled. `None` when an enabled array runs out of data.
    fn array_vertex_attrs(&self, i: usize) -> Option<[f32; MAX_VERTEX_ATTRIBS]> {
        let mut attr = [0.0f32; MAX_VERTEX_ATTRIBS];
        attr[ATTR_W] = 1.0;
        attr[ATTR_R] = self.cur_color[0];
        attr[ATTR_G] = self.cur_color[1];
        attr[ATTR_B] = self.cur_color[2];
        attr[ATTR_A] = self.cur_color[3];
        attr[ATTR_S] = self.cur_texcoord[0];
        attr[ATTR_T] = self.cur_texcoord[1];
        attr[ATTR_P] = self.cur_texcoord[2];
        attr[ATTR_Q] = self.cur_texcoord[3];
        attr[ATTR_NX] = self.cur_normal[0];
        attr[ATTR_NY] = self.cur_normal[1];
        attr[ATTR_NZ] = self.cur_normal[2];

        if self.vertex_array.enabled {
            let mut pos = [0.0f32, 0.0, 0.0, 1.0];
            let n = self.vertex_array.size as usize;
            if !self.vertex_array.fetch(i, false, &mut pos[..n]) {
                return None;
            }
            attr[ATTR_X] = pos[0];
            attr[ATTR_Y] = pos[1];
            attr[ATTR_Z] = pos[2];
            attr[ATTR_W] = pos[3];
        }
        if self.color_array.enabled {
            let mut col = [0.0f32, 0.0, 0.0, 1.0];
            let n = self.color_array.size as usize;
            if !self.color_array.fetch(i, true, &mut col[..n]) {
                return None;
            }
            attr[ATTR_R] = col[0];
            attr[ATTR_G] = col[1];
            attr[ATTR_B] = col[2];
            attr[ATTR_A] = col[3];
        }
        if self.tex_coord_array.enabled {
            // short coordinates leave q at zero, like the scalar setters
            let mut tc = [0.0f32; 4];
            let n = self.tex_coord_array.size as usize;
            if !self.tex_coord_array.fetch(i, true, &mut tc[..n]) {
                return None;
            }
            attr[ATTR_S] = tc[0];
            attr[ATTR_T] = tc[1];
            attr[ATTR_P] = tc[2];
            attr[ATTR_Q] = tc[3];
        }
        if self.normal_array.enabled {
            let mut nrm = [0.0f32; 3];
            if !self.normal_array.fetch(i, true, &mut nrm) {
                return None;
            }
            attr[ATTR_NX] = nrm[0];
            attr[ATTR_NY] = nrm[1];
            attr[ATTR_NZ] = nrm[2];
        }
        Some(attr)
    }

    pub fn draw_arrays(&mut self, mode: GLenum, first: i32, count: i32) {
        if self.immediate.active {
            self.set_error(GL_INVALID_OPERATION);
            return;
        }
        if !valid_topology(mode) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        if first < 0 || count < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        if self.record_draw_arrays(mode, first, count) {
            return;
        }
        self.run_draw_arrays(mode, first, count);
    }

    /// Draw without the recording hook; `call_list` replays through here.
    pub(crate) fn run_draw_arrays(&mut self, mode: GLenum, first: i32, count: i32) {
        self.prepare_draw();
        self.assembler_begin(mode);
        for i in first..first + count {
            match self.array_vertex_attrs(i as usize) {
                Some(attr) => self.emit_vertex_attrs(attr),
                None => break,
            }
        }
        self.assembler_end();
    }

    /// Indexed draw. Executes immediately, recording or not.
    pub fn draw_elements(&mut self, mode: GLenum, count: i32, type_: GLenum, indices: &[u8]) {
        if self.immediate.active {
            self.set_error(GL_INVALID_OPERATION);
            return;
        }
        if !valid_topology(mode) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        if count < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        let width = match type_ {
            GL_UNSIGNED_BYTE => 1,
            GL_UNSIGNED_SHORT => 2,
            GL_UNSIGNED_INT => 4,
            _ => {
                self.set_error(GL_INVALID_ENUM);
                return;
            }
        };
        if count as usize * width > indices.len() {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        self.prepare_draw();
        self.assembler_begin(mode);
        for k in 0..count as usize {
            let at = k * width;
            let i = match type_ {
                GL_UNSIGNED_BYTE => indices[at] as usize,
                GL_UNSIGNED_SHORT => {
                    u16::from_ne_bytes([indices[at], indices[at + 1]]) as usize
                }
                _ => u32::from_ne_bytes([
                    indices[at],
                    indices[at + 1],
                    indices[at + 2],
                    indices[at + 3],
                ]) as usize,
            };
            match self.array_vertex_attrs(i) {
                Some(attr) => self.emit_vertex_attrs(attr),
                None => break,
            }
        }
        self.assembler_end();
    }

    pub fn multi_draw_arrays(&mut self, mode: GLenum, firsts: &[i32], counts: &[i32]) {
        if firsts.len() != counts.len() {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        for (&first, &count) in firsts.iter().zip(counts) {
            self.draw_arrays(mode, first, count);
        }
    }

    pub fn multi_draw_elements(
        &mut self,
        mode: GLenum,
        counts: &[i32],
        type_: GLenum,
        indices: &[&[u8]],
    ) {
        if counts.len() != indices.len() {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        for (&count, &idx) in counts.iter().zip(indices) {
            self.draw_elements(mode, count, type_, idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_ne_bytes()).collect()
    }

    fn pixel_ctx() -> GlContext {
        let mut ctx = GlContext::new(16, 16);
        ctx.matrix_mode(GL_PROJECTION);
        ctx.ortho(0.0, 16.0, 0.0, 16.0, -1.0, 1.0);
        ctx.matrix_mode(GL_MODELVIEW);
        ctx
    }

    #[test]
    fn draw_arrays_renders_a_triangle() {
        let mut ctx = pixel_ctx();
        let verts = as_bytes(&[1.0, 1.0, 15.0, 1.0, 1.0, 15.0]);
        ctx.enable_client_state(GL_VERTEX_ARRAY);
        ctx.vertex_pointer(2, GL_FLOAT, 0, &verts);
        ctx.color3f(0.0, 1.0, 0.0);
        ctx.draw_arrays(GL_TRIANGLES, 0, 3);
        assert_eq!(ctx.get_error(), GL_NO_ERROR);
        assert_eq!(ctx.framebuffer.color_at(3, 3)[1], 1.0);
        assert_eq!(ctx.framebuffer.color_at(13, 13)[1], 0.0);
    }

    #[test]
    fn disabled_color_array_uses_current_color() {
        let mut ctx = pixel_ctx();
        let verts = as_bytes(&[4.5, 4.5]);
        ctx.enable_client_state(GL_VERTEX_ARRAY);
        ctx.vertex_pointer(2, GL_FLOAT, 0, &verts);
        ctx.color3f(1.0, 0.0, 1.0);
        ctx.draw_arrays(GL_POINTS, 0, 1);
        assert_eq!(ctx.framebuffer.color_at(4, 4), [1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn color_array_normalizes_unsigned_bytes() {
        let mut ctx = pixel_ctx();
        let verts = as_bytes(&[4.5, 4.5]);
        ctx.enable_client_state(GL_VERTEX_ARRAY);
        ctx.enable_client_state(GL_COLOR_ARRAY);
        ctx.vertex_pointer(2, GL_FLOAT, 0, &verts);
        ctx.color_pointer(3, GL_UNSIGNED_BYTE, 0, &[255, 0, 255]);
        ctx.draw_arrays(GL_POINTS, 0, 1);
        assert_eq!(ctx.framebuffer.color_at(4, 4), [1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn draw_elements_indexes_the_arrays() {
        let mut ctx = pixel_ctx();
        let verts = as_bytes(&[1.0, 1.0, 15.0, 1.0, 1.0, 15.0, 15.0, 15.0]);
        ctx.enable_client_state(GL_VERTEX_ARRAY);
        ctx.vertex_pointer(2, GL_FLOAT, 0, &verts);
        ctx.color3f(1.0, 1.0, 1.0);
        let idx: Vec<u8> = [0u16, 1, 2].iter().flat_map(|i| i.to_ne_bytes()).collect();
        ctx.draw_elements(GL_TRIANGLES, 3, GL_UNSIGNED_SHORT, &idx);
        assert_eq!(ctx.get_error(), GL_NO_ERROR);
        assert_eq!(ctx.framebuffer.color_at(3, 3)[0], 1.0);
    }

    #[test]
    fn draw_during_begin_is_invalid_operation() {
        let mut ctx = pixel_ctx();
        ctx.begin(GL_TRIANGLES);
        ctx.draw_arrays(GL_POINTS, 0, 0);
        assert_eq!(ctx.get_error(), GL_INVALID_OPERATION);
        ctx.end();
    }

    #[test]
    fn negative_count_is_invalid_value() {
        let mut ctx = pixel_ctx();
        ctx.draw_arrays(GL_POINTS, 0, -1);
        assert_eq!(ctx.get_error(), GL_INVALID_VALUE);
    }

    #[test]
    fn bad_pointer_sizes_are_rejected() {
        let mut ctx = pixel_ctx();
        ctx.vertex_pointer(5, GL_FLOAT, 0, &[]);
        assert_eq!(ctx.get_error(), GL_INVALID_VALUE);
        ctx.color_pointer(2, GL_FLOAT, 0, &[]);
        assert_eq!(ctx.get_error(), GL_INVALID_VALUE);
        ctx.vertex_pointer(3, GL_UNSIGNED_BYTE, 0, &[]);
        assert_eq!(ctx.get_error(), GL_INVALID_ENUM);
    }

    #[test]
    fn short_element_data_stops_the_draw() {
        let mut ctx = pixel_ctx();
        // one and a half vertices: the second point never lands
        let verts = as_bytes(&[4.5, 4.5, 9.5]);
        ctx.enable_client_state(GL_VERTEX_ARRAY);
        ctx.vertex_pointer(2, GL_FLOAT, 0, &verts);
        ctx.color3f(1.0, 1.0, 1.0);
        ctx.draw_arrays(GL_POINTS, 0, 2);
        assert_eq!(ctx.framebuffer.color_at(4, 4)[0], 1.0);
        assert_eq!(ctx.framebuffer.color_at(9, 9)[0], 0.0);
    }
}
