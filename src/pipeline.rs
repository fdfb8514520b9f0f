//! Vertex and fragment stage dispatch.
//!
//! Both stages are capability enums, not trait objects: the fixed paths
//! are built in, user programs plug in as plain function pointers with
//! declared attribute/varying counts. The fixed vertex stage transforms
//! by projection × modelview and runs per-vertex lighting; the fixed
//! fragment stage modulates the interpolated color by the sampled texel
//! and applies fog.

use std::rc::Rc;

use glam::{Mat3, Vec3, Vec4};

use crate::specialize::{DepthTestOp, FragmentWriteOp, TextureFetchOp};
use crate::state::{Fog, GlContext, MAX_LIGHTS};
use crate::texture::Texture;
use crate::types::*;

/// Attribute/varying slot count per vertex.
pub const MAX_VERTEX_ATTRIBS: usize = 16;

// Fixed attribute slot assignment.
pub const ATTR_X: usize = 0;
pub const ATTR_Y: usize = 1;
pub const ATTR_Z: usize = 2;
pub const ATTR_W: usize = 3;
pub const ATTR_R: usize = 4;
pub const ATTR_G: usize = 5;
pub const ATTR_B: usize = 6;
pub const ATTR_A: usize = 7;
pub const ATTR_S: usize = 8;
pub const ATTR_T: usize = 9;
pub const ATTR_P: usize = 10;
pub const ATTR_Q: usize = 11;
pub const ATTR_NX: usize = 12;
pub const ATTR_NY: usize = 13;
pub const ATTR_NZ: usize = 14;

/// One vertex in flight: inputs, stage outputs, and its screen position
/// after the perspective divide (`w <= 0` marks a discarded position).
#[derive(Clone, Copy)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    /// Depth in [0, 1] before the depth-range mapping.
    pub z: f32,
    /// Clip-space w; positions with w <= 0 never reach the rasterizer.
    pub w: f32,
    pub front_face: bool,
    pub attr: [f32; MAX_VERTEX_ATTRIBS],
    pub varying: [f32; MAX_VERTEX_ATTRIBS],
}

impl Vertex {
    pub fn new() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
            front_face: true,
            attr: [0.0; MAX_VERTEX_ATTRIBS],
            varying: [0.0; MAX_VERTEX_ATTRIBS],
        }
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new()
    }
}

/// Transforms one vertex: reads `attr`, writes clip position into
/// x/y/z/w and interpolants into `varying`.
pub type VertexProgramFn = fn(&mut Vertex);

/// Shades one fragment from its interpolated varyings. Returns `false`
/// to reject the fragment.
pub type FragmentProgramFn = fn(&[f32; MAX_VERTEX_ATTRIBS], &mut [f32; 4]) -> bool;

#[derive(Clone, Copy)]
pub enum VertexStage {
    Fixed,
    Program {
        func: VertexProgramFn,
        attr_count: usize,
        varying_count: usize,
    },
}

#[derive(Clone, Copy)]
pub enum FragmentStage {
    Fixed,
    Program {
        func: FragmentProgramFn,
        varying_count: usize,
    },
}

// ── Vertex stage ─────────────────────────────────────────────────────────────

/// Fixed-function per-vertex lighting with the front material.
fn lit_color(ctx: &GlContext, eye_pos: Vec4, eye_normal: Vec3) -> [f32; 4] {
    let mat = &ctx.materials[0];
    let mut rgb = Vec3::new(mat.emission[0], mat.emission[1], mat.emission[2]);
    for i in 0..MAX_LIGHTS {
        let light = &ctx.lights[i];
        if !light.enabled {
            continue;
        }
        let lp = Vec4::from_array(light.position);
        let (dir, atten) = if lp.w == 0.0 {
            (Vec3::new(lp.x, lp.y, lp.z).normalize_or_zero(), 1.0)
        } else {
            let d = Vec3::new(lp.x, lp.y, lp.z) - Vec3::new(eye_pos.x, eye_pos.y, eye_pos.z);
            let dist = d.length();
            let atten = 1.0
                / (light.constant_attenuation
                    + light.linear_attenuation * dist
                    + light.quadratic_attenuation * dist * dist);
            (d.normalize_or_zero(), atten)
        };
        let ndotl = eye_normal.dot(dir).max(0.0);
        for c in 0..3 {
            rgb[c] += atten
                * (mat.ambient[c] * light.ambient[c]
                    + mat.diffuse[c] * light.diffuse[c] * ndotl);
        }
    }
    [
        rgb.x.clamp(0.0, 1.0),
        rgb.y.clamp(0.0, 1.0),
        rgb.z.clamp(0.0, 1.0),
        mat.diffuse[3],
    ]
}

/// Run the configured vertex stage, leaving a clip-space position in
/// x/y/z/w and interpolants in `varying`.
pub(crate) fn run_vertex(ctx: &GlContext, v: &mut Vertex) {
    match ctx.vertex_stage {
        VertexStage::Fixed => {
            let obj = Vec4::new(v.attr[ATTR_X], v.attr[ATTR_Y], v.attr[ATTR_Z], v.attr[ATTR_W]);
            let mv = *ctx.modelview.top();
            let eye = mv * obj;
            let clip = *ctx.projection.top() * eye;
            v.x = clip.x;
            v.y = clip.y;
            v.z = clip.z;
            v.w = clip.w;
            v.varying = v.attr;
            if ctx.lighting {
                let n = Vec3::new(v.attr[ATTR_NX], v.attr[ATTR_NY], v.attr[ATTR_NZ]);
                let eye_n = (Mat3::from_mat4(mv) * n).normalize_or_zero();
                let lit = lit_color(ctx, eye, eye_n);
                v.varying[ATTR_R] = lit[0];
                v.varying[ATTR_G] = lit[1];
                v.varying[ATTR_B] = lit[2];
                v.varying[ATTR_A] = lit[3];
            }
        }
        VertexStage::Program { func, .. } => func(v),
    }
}

/// Perspective divide and mapping of the NDC cube onto the viewport
/// rectangle. Positions with w <= 0 are left marked invalid.
pub(crate) fn to_screen(v: &mut Vertex, viewport: [i32; 4]) {
    if v.w <= 0.0 {
        return;
    }
    let inv_w = 1.0 / v.w;
    let ndc_x = v.x * inv_w;
    let ndc_y = v.y * inv_w;
    let ndc_z = v.z * inv_w;
    v.x = viewport[0] as f32 + (ndc_x + 1.0) * 0.5 * viewport[2] as f32;
    v.y = viewport[1] as f32 + (ndc_y + 1.0) * 0.5 * viewport[3] as f32;
    v.z = (ndc_z + 1.0) * 0.5;
}

// ── Fragment stage ───────────────────────────────────────────────────────────

/// Everything one draw call's fragments need, borrowed out of the context
/// so the framebuffer can be mutated alongside.
pub(crate) struct DrawEnv<'a> {
    pub fragment_stage: FragmentStage,
    pub depth_op: Rc<DepthTestOp>,
    pub write_op: Rc<FragmentWriteOp>,
    pub blend_color: [f32; 4],
    pub depth_range: [f32; 2],
    pub texture: Option<(&'a Texture, Rc<TextureFetchOp>)>,
    pub fog: Option<Fog>,
    pub scissor: Option<[i32; 4]>,
    pub viewport: [i32; 4],
    pub shade_model: GLenum,
    pub cull_enabled: bool,
    pub cull_mode: GLenum,
    pub front_face_winding: GLenum,
    pub point_size: f32,
    pub line_width: f32,
}

fn fog_factor(fog: &Fog, z: f32) -> f32 {
    let f = match fog.mode {
        GL_EXP => (-fog.density * z).exp(),
        GL_EXP2 => {
            let dz = fog.density * z;
            (-dz * dz).exp()
        }
        _ => {
            if fog.end == fog.start {
                1.0
            } else {
                (fog.end - z) / (fog.end - fog.start)
            }
        }
    };
    f.clamp(0.0, 1.0)
}

/// Run the configured fragment stage. `None` rejects the fragment.
pub(crate) fn shade_fragment(
    env: &DrawEnv,
    varying: &[f32; MAX_VERTEX_ATTRIBS],
    window_z: f32,
) -> Option<[f32; 4]> {
    let mut color = match env.fragment_stage {
        FragmentStage::Fixed => {
            let mut c = [
                varying[ATTR_R],
                varying[ATTR_G],
                varying[ATTR_B],
                varying[ATTR_A],
            ];
            if let Some((tex, fetch)) = &env.texture {
                let texel = tex.sample(fetch.as_ref(), varying[ATTR_S], varying[ATTR_T]);
                for i in 0..4 {
                    c[i] *= texel[i];
                }
            }
            c
        }
        FragmentStage::Program { func, .. } => {
            let mut c = [0.0f32; 4];
            if !func(varying, &mut c) {
                return None;
            }
            c
        }
    };
    if let Some(fog) = &env.fog {
        let f = fog_factor(fog, window_z);
        for i in 0..3 {
            color[i] = f * color[i] + (1.0 - f) * fog.color[i];
        }
    }
    Some(color)
}
