//! Immediate-mode vertex assembler.
//!
//! `begin` opens a primitive run and refreshes the specialization caches;
//! each `vertex*` captures the current color/normal/texcoord, runs the
//! vertex stage, maps to screen space and feeds the topology's emission
//! rule over a five-slot window (`verts`, `vert_len`, `vert_pos`):
//!
//! - strips and triangle lists cycle the cursor modulo 4
//! - the fan pivot is parked in slot 4
//! - a line loop parks its first vertex in slot 3 and closes at `end`
//! - quads and quad strips decompose into two triangles
//!
//! The scalar/vector setter variants normalize integer color, normal and
//! texcoord components by the type maximum; positions are taken as-is.

use crate::pipeline::{self, Vertex, MAX_VERTEX_ATTRIBS};
use crate::pipeline::{
    ATTR_A, ATTR_B, ATTR_G, ATTR_NX, ATTR_NY, ATTR_NZ, ATTR_P, ATTR_Q, ATTR_R, ATTR_S, ATTR_T,
    ATTR_W, ATTR_X, ATTR_Y, ATTR_Z,
};
use crate::state::GlContext;
use crate::types::*;

/// Assembler window between `begin` and `end`.
pub(crate) struct ImmediateState {
    pub active: bool,
    pub mode: GLenum,
    pub verts: [Vertex; 5],
    pub vert_len: usize,
    pub vert_pos: usize,
}

impl ImmediateState {
    pub fn new() -> Self {
        Self {
            active: false,
            mode: GL_POINTS,
            verts: [Vertex::new(); 5],
            vert_len: 0,
            vert_pos: 0,
        }
    }
}

pub(crate) fn valid_topology(mode: GLenum) -> bool {
    matches!(
        mode,
        GL_POINTS
            | GL_LINES
            | GL_LINE_STRIP
            | GL_LINE_LOOP
            | GL_TRIANGLES
            | GL_TRIANGLE_STRIP
            | GL_TRIANGLE_FAN
            | GL_QUADS
            | GL_QUAD_STRIP
    )
}

macro_rules! vertex_fns {
    ($($name:ident $namev:ident $n:tt, $t:ty;)*) => {
        $(vertex_fns!(@one $name $namev $n, $t);)*
    };
    (@one $name:ident $namev:ident 2, $t:ty) => {
        pub fn $name(&mut self, x: $t, y: $t) {
            self.vertex4(x as f32, y as f32, 0.0, 1.0);
        }
        pub fn $namev(&mut self, v: &[$t; 2]) {
            self.vertex4(v[0] as f32, v[1] as f32, 0.0, 1.0);
        }
    };
    (@one $name:ident $namev:ident 3, $t:ty) => {
        pub fn $name(&mut self, x: $t, y: $t, z: $t) {
            self.vertex4(x as f32, y as f32, z as f32, 1.0);
        }
        pub fn $namev(&mut self, v: &[$t; 3]) {
            self.vertex4(v[0] as f32, v[1] as f32, v[2] as f32, 1.0);
        }
    };
    (@one $name:ident $namev:ident 4, $t:ty) => {
        pub fn $name(&mut self, x: $t, y: $t, z: $t, w: $t) {
            self.vertex4(x as f32, y as f32, z as f32, w as f32);
        }
        pub fn $namev(&mut self, v: &[$t; 4]) {
            self.vertex4(v[0] as f32, v[1] as f32, v[2] as f32, v[3] as f32);
        }
    };
}

macro_rules! color_fns {
    ($($name:ident $namev:ident $n:tt, $t:ty, $max:expr;)*) => {
        $(color_fns!(@one $name $namev $n, $t, $max);)*
    };
    (@one $name:ident $namev:ident 3, $t:ty, $max:expr) => {
        pub fn $name(&mut self, r: $t, g: $t, b: $t) {
            self.color4(r as f32 / $max, g as f32 / $max, b as f32 / $max, 1.0);
        }
        pub fn $namev(&mut self, v: &[$t; 3]) {
            self.$name(v[0], v[1], v[2]);
        }
    };
    (@one $name:ident $namev:ident 4, $t:ty, $max:expr) => {
        pub fn $name(&mut self, r: $t, g: $t, b: $t, a: $t) {
            self.color4(r as f32 / $max, g as f32 / $max, b as f32 / $max, a as f32 / $max);
        }
        pub fn $namev(&mut self, v: &[$t; 4]) {
            self.$name(v[0], v[1], v[2], v[3]);
        }
    };
}

macro_rules! normal_fns {
    ($($name:ident $namev:ident $t:ty, $max:expr;)*) => {
        $(
            pub fn $name(&mut self, x: $t, y: $t, z: $t) {
                self.normal3(x as f32 / $max, y as f32 / $max, z as f32 / $max);
            }
            pub fn $namev(&mut self, v: &[$t; 3]) {
                self.$name(v[0], v[1], v[2]);
            }
        )*
    };
}

macro_rules! tex_coord_fns {
    ($($name:ident $namev:ident $n:tt, $t:ty, $max:expr;)*) => {
        $(tex_coord_fns!(@one $name $namev $n, $t, $max);)*
    };
    (@one $name:ident $namev:ident 1, $t:ty, $max:expr) => {
        pub fn $name(&mut self, s: $t) {
            self.tex_coord4(s as f32 / $max, 0.0, 0.0, 0.0);
        }
        pub fn $namev(&mut self, v: &[$t; 1]) {
            self.$name(v[0]);
        }
    };
    (@one $name:ident $namev:ident 2, $t:ty, $max:expr) => {
        pub fn $name(&mut self, s: $t, t: $t) {
            self.tex_coord4(s as f32 / $max, t as f32 / $max, 0.0, 0.0);
        }
        pub fn $namev(&mut self, v: &[$t; 2]) {
            self.$name(v[0], v[1]);
        }
    };
    (@one $name:ident $namev:ident 3, $t:ty, $max:expr) => {
        pub fn $name(&mut self, s: $t, t: $t, r: $t) {
            self.tex_coord4(s as f32 / $max, t as f32 / $max, r as f32 / $max, 0.0);
        }
        pub fn $namev(&mut self, v: &[$t; 3]) {
            self.$name(v[0], v[1], v[2]);
        }
    };
    (@one $name:ident $namev:ident 4, $t:ty, $max:expr) => {
        pub fn $name(&mut self, s: $t, t: $t, r: $t, q: $t) {
            self.tex_coord4(
                s as f32 / $max,
                t as f32 / $max,
                r as f32 / $max,
                q as f32 / $max,
            );
        }
        pub fn $namev(&mut self, v: &[$t; 4]) {
            self.$name(v[0], v[1], v[2], v[3]);
        }
    };
}

impl GlContext {
    /// Open a primitive run. Refreshes the specialization caches for
    /// whatever state went dirty since the last draw.
    pub fn begin(&mut self, mode: GLenum) {
        if self.immediate.active {
            self.set_error(GL_INVALID_OPERATION);
            return;
        }
        if !valid_topology(mode) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.prepare_draw();
        self.assembler_begin(mode);
    }

    /// Close the run, drawing the line loop's closing edge if due.
    pub fn end(&mut self) {
        if !self.immediate.active {
            self.set_error(GL_INVALID_OPERATION);
            return;
        }
        self.assembler_end();
    }

    pub(crate) fn assembler_begin(&mut self, mode: GLenum) {
        self.immediate.active = true;
        self.immediate.mode = mode;
        self.immediate.vert_len = 0;
        self.immediate.vert_pos = 0;
    }

    pub(crate) fn assembler_end(&mut self) {
        if self.immediate.mode == GL_LINE_LOOP && self.immediate.vert_len > 2 {
            let last = self.vert_off(1, 2);
            let first = self.immediate.verts[3];
            self.raster_line(last, first);
        }
        self.immediate.active = false;
    }

    fn vert_off(&self, off: usize, modulo: usize) -> Vertex {
        self.immediate.verts[(self.immediate.vert_pos + off) % modulo]
    }

    fn vert_cur(&self) -> Vertex {
        self.immediate.verts[self.immediate.vert_pos]
    }

    /// Transform, map and emit one assembled vertex.
    ///
    /// A silent no-op outside `begin`/`end`, like the original.
    pub(crate) fn emit_vertex_attrs(&mut self, attr: [f32; MAX_VERTEX_ATTRIBS]) {
        if !self.immediate.active {
            return;
        }
        let mut v = Vertex::new();
        v.attr = attr;
        pipeline::run_vertex(self, &mut v);
        pipeline::to_screen(&mut v, self.viewport);
        self.immediate.verts[self.immediate.vert_pos] = v;
        match self.immediate.mode {
            GL_POINTS => self.emit_points(),
            GL_LINE_STRIP => self.emit_line_strip(),
            GL_LINE_LOOP => self.emit_line_loop(),
            GL_LINES => self.emit_lines(),
            GL_TRIANGLE_STRIP => self.emit_triangle_strip(),
            GL_TRIANGLE_FAN => self.emit_triangle_fan(),
            GL_TRIANGLES => self.emit_triangles(),
            GL_QUADS => self.emit_quads(),
            GL_QUAD_STRIP => self.emit_quad_strip(),
            _ => {}
        }
    }

    fn emit_points(&mut self) {
        let v = self.vert_cur();
        self.raster_point(v);
    }

    fn emit_line_strip(&mut self) {
        if self.immediate.vert_len == 0 {
            self.immediate.vert_len = 1;
            self.immediate.vert_pos = 1;
            return;
        }
        let (a, b) = (self.vert_off(1, 2), self.vert_cur());
        self.raster_line(a, b);
        self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 2;
    }

    fn emit_line_loop(&mut self) {
        if self.immediate.vert_len == 0 {
            self.immediate.verts[3] = self.immediate.verts[0];
            self.immediate.vert_len = 1;
            self.immediate.vert_pos = 1;
            return;
        }
        let (a, b) = (self.vert_off(1, 2), self.vert_cur());
        self.raster_line(a, b);
        self.immediate.vert_len += 1;
        self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 2;
    }

    fn emit_lines(&mut self) {
        if self.immediate.vert_pos == 0 {
            self.immediate.vert_pos = 1;
            return;
        }
        let (a, b) = (self.immediate.verts[0], self.immediate.verts[1]);
        self.raster_line(a, b);
        self.immediate.vert_pos = 0;
    }

    fn emit_triangle_strip(&mut self) {
        if self.immediate.vert_len < 2 {
            self.immediate.vert_len += 1;
            self.immediate.vert_pos += 1;
            return;
        }
        let (a, b, c) = (self.vert_off(2, 4), self.vert_off(3, 4), self.vert_cur());
        self.raster_triangle(a, b, c);
        self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 4;
    }

    fn emit_triangle_fan(&mut self) {
        if self.immediate.vert_len < 2 {
            if self.immediate.vert_len == 0 {
                self.immediate.verts[4] = self.immediate.verts[0];
            }
            self.immediate.vert_len += 1;
            self.immediate.vert_pos += 1;
            return;
        }
        let (a, b, c) = (self.immediate.verts[4], self.vert_off(3, 4), self.vert_cur());
        self.raster_triangle(a, b, c);
        self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 4;
    }

    fn emit_triangles(&mut self) {
        if self.immediate.vert_len < 2 {
            self.immediate.vert_len += 1;
            self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 4;
            return;
        }
        let (a, b, c) = (self.vert_off(2, 4), self.vert_off(3, 4), self.vert_cur());
        self.raster_triangle(a, b, c);
        self.immediate.vert_len = 0;
        self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 4;
    }

    fn emit_quads(&mut self) {
        if self.immediate.vert_len < 3 {
            self.immediate.vert_len += 1;
            self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 4;
            return;
        }
        let v1 = self.vert_off(1, 4);
        let v2 = self.vert_off(2, 4);
        let v3 = self.vert_off(3, 4);
        let v4 = self.vert_cur();
        self.raster_triangle(v1, v2, v3);
        self.raster_triangle(v3, v4, v1);
        self.immediate.vert_len = 0;
        self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 4;
    }

    fn emit_quad_strip(&mut self) {
        if self.immediate.vert_len < 3 || self.immediate.vert_pos & 1 == 0 {
            self.immediate.vert_len += 1;
            self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 4;
            return;
        }
        let v1 = self.vert_off(1, 4);
        let v2 = self.vert_off(2, 4);
        let v3 = self.vert_off(3, 4);
        let v4 = self.vert_cur();
        if self.immediate.vert_pos & 2 != 0 {
            self.raster_triangle(v1, v2, v3);
        } else {
            self.raster_triangle(v2, v1, v3);
        }
        self.raster_triangle(v3, v4, v1);
        self.immediate.vert_pos = (self.immediate.vert_pos + 1) % 4;
    }

    // ── Per-vertex attribute setters ────────────────────────────────────

    fn vertex4(&mut self, x: f32, y: f32, z: f32, w: f32) {
        if !self.immediate.active {
            return;
        }
        let mut attr = [0.0f32; MAX_VERTEX_ATTRIBS];
        attr[ATTR_X] = x;
        attr[ATTR_Y] = y;
        attr[ATTR_Z] = z;
        attr[ATTR_W] = w;
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
        self.emit_vertex_attrs(attr);
    }

    fn color4(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.cur_color = [r, g, b, a];
    }

    fn normal3(&mut self, x: f32, y: f32, z: f32) {
        self.cur_normal = [x, y, z];
    }

    fn tex_coord4(&mut self, s: f32, t: f32, r: f32, q: f32) {
        self.cur_texcoord = [s, t, r, q];
    }

    vertex_fns! {
        vertex2s vertex2sv 2, i16;
        vertex2i vertex2iv 2, i32;
        vertex2f vertex2fv 2, f32;
        vertex2d vertex2dv 2, f64;
        vertex3s vertex3sv 3, i16;
        vertex3i vertex3iv 3, i32;
        vertex3f vertex3fv 3, f32;
        vertex3d vertex3dv 3, f64;
        vertex4s vertex4sv 4, i16;
        vertex4i vertex4iv 4, i32;
        vertex4f vertex4fv 4, f32;
        vertex4d vertex4dv 4, f64;
    }

    color_fns! {
        color3b color3bv 3, i8, 127.0;
        color3ub color3ubv 3, u8, 255.0;
        color3s color3sv 3, i16, 32767.0;
        color3us color3usv 3, u16, 65535.0;
        color3i color3iv 3, i32, 2147483647.0;
        color3ui color3uiv 3, u32, 4294967295.0;
        color3f color3fv 3, f32, 1.0;
        color3d color3dv 3, f64, 1.0;
        color4b color4bv 4, i8, 127.0;
        color4ub color4ubv 4, u8, 255.0;
        color4s color4sv 4, i16, 32767.0;
        color4us color4usv 4, u16, 65535.0;
        color4i color4iv 4, i32, 2147483647.0;
        color4ui color4uiv 4, u32, 4294967295.0;
        color4f color4fv 4, f32, 1.0;
        color4d color4dv 4, f64, 1.0;
    }

    normal_fns! {
        normal3b normal3bv i8, 127.0;
        normal3s normal3sv i16, 32767.0;
        normal3i normal3iv i32, 2147483647.0;
        normal3f normal3fv f32, 1.0;
        normal3d normal3dv f64, 1.0;
    }

    tex_coord_fns! {
        tex_coord1s tex_coord1sv 1, i16, 32767.0;
        tex_coord1i tex_coord1iv 1, i32, 2147483647.0;
        tex_coord1f tex_coord1fv 1, f32, 1.0;
        tex_coord1d tex_coord1dv 1, f64, 1.0;
        tex_coord2s tex_coord2sv 2, i16, 32767.0;
        tex_coord2i tex_coord2iv 2, i32, 2147483647.0;
        tex_coord2f tex_coord2fv 2, f32, 1.0;
        tex_coord2d tex_coord2dv 2, f64, 1.0;
        tex_coord3s tex_coord3sv 3, i16, 32767.0;
        tex_coord3i tex_coord3iv 3, i32, 2147483647.0;
        tex_coord3f tex_coord3fv 3, f32, 1.0;
        tex_coord3d tex_coord3dv 3, f64, 1.0;
        tex_coord4s tex_coord4sv 4, i16, 32767.0;
        tex_coord4i tex_coord4iv 4, i32, 2147483647.0;
        tex_coord4f tex_coord4fv 4, f32, 1.0;
        tex_coord4d tex_coord4dv 4, f64, 1.0;
    }
}
