//! Fragment write specialization: blending, color mask, depth write.

use std::rc::Rc;

use crate::state::GlContext;
use crate::types::*;

use super::{Fnv32, SpecKey};

/// Writes one shaded fragment into the framebuffer.
///
/// Arguments: destination color (4-component slice into the color plane),
/// destination depth, source color, source window depth, blend color.
pub type FragmentWriteOp = dyn Fn(&mut [f32], &mut f32, &[f32; 4], f32, &[f32; 4]);

/// Exact state subset the write path depends on.
#[derive(Clone, PartialEq)]
pub struct FragmentWriteKey {
    pub blend: bool,
    pub src_rgb: GLenum,
    pub dst_rgb: GLenum,
    pub src_alpha: GLenum,
    pub dst_alpha: GLenum,
    pub eq_rgb: GLenum,
    pub eq_alpha: GLenum,
    pub color_mask: [bool; 4],
    pub depth_write: bool,
}

impl FragmentWriteKey {
    pub(crate) fn from_context(ctx: &GlContext) -> Self {
        Self {
            blend: ctx.blend,
            src_rgb: ctx.blend_src_rgb,
            dst_rgb: ctx.blend_dst_rgb,
            src_alpha: ctx.blend_src_alpha,
            dst_alpha: ctx.blend_dst_alpha,
            eq_rgb: ctx.blend_eq_rgb,
            eq_alpha: ctx.blend_eq_alpha,
            color_mask: ctx.color_mask,
            // depth stores only update when the test runs
            depth_write: ctx.depth_mask && ctx.depth_test,
        }
    }
}

impl SpecKey for FragmentWriteKey {
    type Op = FragmentWriteOp;

    fn hash32(&self) -> u32 {
        let mut h = Fnv32::new();
        h.write_bool(self.blend);
        h.write_u32(self.src_rgb);
        h.write_u32(self.dst_rgb);
        h.write_u32(self.src_alpha);
        h.write_u32(self.dst_alpha);
        h.write_u32(self.eq_rgb);
        h.write_u32(self.eq_alpha);
        for &m in &self.color_mask {
            h.write_bool(m);
        }
        h.write_bool(self.depth_write);
        h.finish()
    }
}

/// Per-channel blend factors for one factor enum.
fn factors(factor: GLenum, src: &[f32; 4], dst: &[f32; 4], bc: &[f32; 4]) -> [f32; 4] {
    match factor {
        GL_ZERO => [0.0; 4],
        GL_ONE => [1.0; 4],
        GL_SRC_COLOR => *src,
        GL_ONE_MINUS_SRC_COLOR => [1.0 - src[0], 1.0 - src[1], 1.0 - src[2], 1.0 - src[3]],
        GL_DST_COLOR => *dst,
        GL_ONE_MINUS_DST_COLOR => [1.0 - dst[0], 1.0 - dst[1], 1.0 - dst[2], 1.0 - dst[3]],
        GL_SRC_ALPHA => [src[3]; 4],
        GL_ONE_MINUS_SRC_ALPHA => [1.0 - src[3]; 4],
        GL_DST_ALPHA => [dst[3]; 4],
        GL_ONE_MINUS_DST_ALPHA => [1.0 - dst[3]; 4],
        GL_CONSTANT_COLOR => *bc,
        GL_ONE_MINUS_CONSTANT_COLOR => [1.0 - bc[0], 1.0 - bc[1], 1.0 - bc[2], 1.0 - bc[3]],
        GL_CONSTANT_ALPHA => [bc[3]; 4],
        GL_ONE_MINUS_CONSTANT_ALPHA => [1.0 - bc[3]; 4],
        GL_SRC_ALPHA_SATURATE => {
            let f = src[3].min(1.0 - dst[3]);
            [f, f, f, 1.0]
        }
        _ => [1.0; 4],
    }
}

fn combine(eq: GLenum, s: f32, d: f32, sf: f32, df: f32) -> f32 {
    match eq {
        GL_FUNC_SUBTRACT => s * sf - d * df,
        GL_FUNC_REVERSE_SUBTRACT => d * df - s * sf,
        GL_MIN => s.min(d),
        GL_MAX => s.max(d),
        _ => s * sf + d * df,
    }
}

/// State-branching fallback used whenever codegen declines the key.
pub fn build_interpreter(key: &FragmentWriteKey) -> Rc<FragmentWriteOp> {
    let k = key.clone();
    Rc::new(
        move |dst: &mut [f32], dst_depth: &mut f32, src: &[f32; 4], src_depth: f32, bc: &[f32; 4]| {
            let mut out = *src;
            if k.blend {
                let dstc = [dst[0], dst[1], dst[2], dst[3]];
                let sf = factors(k.src_rgb, src, &dstc, bc);
                let df = factors(k.dst_rgb, src, &dstc, bc);
                for i in 0..3 {
                    out[i] = combine(k.eq_rgb, src[i], dstc[i], sf[i], df[i]);
                }
                let sfa = factors(k.src_alpha, src, &dstc, bc)[3];
                let dfa = factors(k.dst_alpha, src, &dstc, bc)[3];
                out[3] = combine(k.eq_alpha, src[3], dstc[3], sfa, dfa);
            }
            for i in 0..4 {
                if k.color_mask[i] {
                    dst[i] = out[i].clamp(0.0, 1.0);
                }
            }
            if k.depth_write {
                *dst_depth = src_depth;
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn key() -> FragmentWriteKey {
        FragmentWriteKey {
            blend: false,
            src_rgb: GL_ONE,
            dst_rgb: GL_ZERO,
            src_alpha: GL_ONE,
            dst_alpha: GL_ZERO,
            eq_rgb: GL_FUNC_ADD,
            eq_alpha: GL_FUNC_ADD,
            color_mask: [true; 4],
            depth_write: true,
        }
    }

    #[test]
    fn replace_writes_color_and_depth() {
        let op = build_interpreter(&key());
        let mut color = [0.0f32; 4];
        let mut depth = 1.0f32;
        op(&mut color, &mut depth, &[1.0, 0.5, 0.25, 1.0], 0.3, &[0.0; 4]);
        assert_eq!(color, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(depth, 0.3);
    }

    #[test]
    fn alpha_blend_interpolates() {
        let mut k = key();
        k.blend = true;
        k.src_rgb = GL_SRC_ALPHA;
        k.dst_rgb = GL_ONE_MINUS_SRC_ALPHA;
        let op = build_interpreter(&k);
        let mut color = [1.0f32, 0.0, 0.0, 1.0];
        let mut depth = 1.0f32;
        op(&mut color, &mut depth, &[0.0, 1.0, 0.0, 0.5], 0.5, &[0.0; 4]);
        assert_relative_eq!(color[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(color[1], 0.5, epsilon = 1e-6);
        assert_relative_eq!(color[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn color_mask_blocks_channels() {
        let mut k = key();
        k.color_mask = [true, false, true, false];
        k.depth_write = false;
        let op = build_interpreter(&k);
        let mut color = [0.0f32; 4];
        let mut depth = 0.7f32;
        op(&mut color, &mut depth, &[1.0; 4], 0.1, &[0.0; 4]);
        assert_eq!(color, [1.0, 0.0, 1.0, 0.0]);
        assert_eq!(depth, 0.7);
    }

    #[test]
    fn constant_color_factor_uses_blend_color() {
        let mut k = key();
        k.blend = true;
        k.src_rgb = GL_CONSTANT_COLOR;
        k.dst_rgb = GL_ZERO;
        let op = build_interpreter(&k);
        let mut color = [0.0f32; 4];
        let mut depth = 1.0f32;
        op(&mut color, &mut depth, &[1.0; 4], 0.0, &[0.25, 0.5, 0.75, 1.0]);
        assert_relative_eq!(color[0], 0.25, epsilon = 1e-6);
        assert_relative_eq!(color[1], 0.5, epsilon = 1e-6);
        assert_relative_eq!(color[2], 0.75, epsilon = 1e-6);
    }
}
