//! Fragment emission and the point/line walkers.
//!
//! Primitives arrive in screen space (pixels, depth in [0, 1]). For each
//! covered pixel the order is fixed: fragment stage (may reject, samples
//! the texture through the specialized fetch), depth test specialization,
//! fragment write specialization. The scissor box excludes fragments
//! before shading.

pub mod raster;

use std::rc::Rc;

use crate::framebuffer::Framebuffer;
use crate::pipeline::{self, DrawEnv, Vertex, ATTR_A, ATTR_R, MAX_VERTEX_ATTRIBS};
use crate::state::GlContext;
use crate::types::*;

impl GlContext {
    /// Split the context into the mutable framebuffer and a read-only
    /// draw environment for one primitive.
    pub(crate) fn raster_parts(&mut self) -> (&mut Framebuffer, DrawEnv<'_>) {
        let env = DrawEnv {
            fragment_stage: self.fragment_stage,
            depth_op: Rc::clone(&self.depth_test_op),
            write_op: Rc::clone(&self.fragment_write_op),
            blend_color: self.blend_color,
            depth_range: self.depth_range,
            texture: if self.texture_2d {
                match self.textures.get(self.binding_2d) {
                    Some(tex) => tex.fetch_op.clone().map(|op| (tex, op)),
                    None => None,
                }
            } else {
                None
            },
            fog: if self.fog_enabled { Some(self.fog) } else { None },
            scissor: if self.scissor_test { Some(self.scissor) } else { None },
            viewport: self.viewport,
            shade_model: self.shade_model,
            cull_enabled: self.cull,
            cull_mode: self.cull_face_mode,
            front_face_winding: self.front_face,
            point_size: self.point_size,
            line_width: self.line_width,
        };
        (&mut self.framebuffer, env)
    }

    pub(crate) fn raster_point(&mut self, v: Vertex) {
        let (fb, env) = self.raster_parts();
        point(fb, &env, &v);
    }

    pub(crate) fn raster_line(&mut self, a: Vertex, b: Vertex) {
        let (fb, env) = self.raster_parts();
        line(fb, &env, a, b);
    }

    pub(crate) fn raster_triangle(&mut self, a: Vertex, b: Vertex, c: Vertex) {
        let (fb, env) = self.raster_parts();
        raster::triangle(fb, &env, a, b, c);
    }
}

/// Run one fragment through shade, depth test and write.
pub(super) fn emit_fragment(
    fb: &mut Framebuffer,
    env: &DrawEnv,
    x: i32,
    y: i32,
    z01: f32,
    varying: &[f32; MAX_VERTEX_ATTRIBS],
) {
    if x < 0 || y < 0 || x >= fb.width as i32 || y >= fb.height as i32 {
        return;
    }
    if let Some([sx, sy, sw, sh]) = env.scissor {
        if x < sx || y < sy || x >= sx + sw || y >= sy + sh {
            return;
        }
    }
    let window_z =
        env.depth_range[0] + z01.clamp(0.0, 1.0) * (env.depth_range[1] - env.depth_range[0]);
    let Some(src) = pipeline::shade_fragment(env, varying, window_z) else {
        return;
    };
    let idx = fb.pixel_index(x as u32, y as u32);
    if !(env.depth_op)(z01, fb.depth[idx]) {
        return;
    }
    let ci = idx * 4;
    (env.write_op)(
        &mut fb.color[ci..ci + 4],
        &mut fb.depth[idx],
        &src,
        window_z,
        &env.blend_color,
    );
}

/// Square point footprint, `point_size` pixels across, no interpolation.
pub(super) fn point(fb: &mut Framebuffer, env: &DrawEnv, v: &Vertex) {
    if v.w <= 0.0 {
        return;
    }
    let size = env.point_size.round().max(1.0) as i32;
    let cx = v.x.floor() as i32 - (size - 1) / 2;
    let cy = v.y.floor() as i32 - (size - 1) / 2;
    for dy in 0..size {
        for dx in 0..size {
            emit_fragment(fb, env, cx + dx, cy + dy, v.z, &v.varying);
        }
    }
}

/// Stepped line walk along the major axis; all varyings are lerped by
/// fractional progress. Width expands across the minor axis.
pub(super) fn line(fb: &mut Framebuffer, env: &DrawEnv, mut a: Vertex, b: Vertex) {
    if a.w <= 0.0 || b.w <= 0.0 {
        return;
    }
    if env.shade_model == GL_FLAT {
        for k in ATTR_R..=ATTR_A {
            a.varying[k] = b.varying[k];
        }
    }
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let steps = dx.abs().max(dy.abs()).ceil() as i32;
    let width = env.line_width.round().max(1.0) as i32;
    let lo = -((width - 1) / 2);
    let hi = width / 2;
    let horizontal_major = dx.abs() >= dy.abs();
    if steps <= 0 {
        emit_fragment(fb, env, a.x.floor() as i32, a.y.floor() as i32, a.z, &a.varying);
        return;
    }
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = (a.x + dx * t).floor() as i32;
        let y = (a.y + dy * t).floor() as i32;
        let z = a.z + (b.z - a.z) * t;
        let mut varying = [0.0f32; MAX_VERTEX_ATTRIBS];
        for k in 0..MAX_VERTEX_ATTRIBS {
            varying[k] = a.varying[k] + (b.varying[k] - a.varying[k]) * t;
        }
        for o in lo..=hi {
            if horizontal_major {
                emit_fragment(fb, env, x, y + o, z, &varying);
            } else {
                emit_fragment(fb, env, x + o, y, z, &varying);
            }
        }
    }
}
