//! Triangle walker.
//!
//! Bounding-box scan with edge functions. The triangle is oriented
//! counter-clockwise first, so a pixel center is covered when all three
//! edge functions are non-negative; shared edges belong to both
//! neighbors. Varyings interpolate by barycentric weights. The facing
//! flag comes from the signed area and the winding selector, once per
//! triangle, and drives culling.

use crate::framebuffer::Framebuffer;
use crate::pipeline::{DrawEnv, Vertex, ATTR_A, ATTR_R, MAX_VERTEX_ATTRIBS};
use crate::types::*;

#[inline]
fn edge(p: &Vertex, q: &Vertex, px: f32, py: f32) -> f32 {
    (q.x - p.x) * (py - p.y) - (q.y - p.y) * (px - p.x)
}

pub(crate) fn triangle(fb: &mut Framebuffer, env: &DrawEnv, mut a: Vertex, mut b: Vertex, mut c: Vertex) {
    if a.w <= 0.0 || b.w <= 0.0 || c.w <= 0.0 {
        return;
    }
    let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if area == 0.0 {
        return;
    }
    let ccw = area > 0.0;
    let front = if env.front_face_winding == GL_CW { !ccw } else { ccw };
    if env.cull_enabled {
        match env.cull_mode {
            GL_FRONT_AND_BACK => return,
            GL_FRONT if front => return,
            GL_BACK if !front => return,
            _ => {}
        }
    }
    a.front_face = front;
    b.front_face = front;
    c.front_face = front;

    // flat shading takes the provoking (last) vertex's color
    if env.shade_model == GL_FLAT {
        for k in ATTR_R..=ATTR_A {
            a.varying[k] = c.varying[k];
            b.varying[k] = c.varying[k];
        }
    }

    // orient counter-clockwise so the edge functions are positive inside
    let (b, c, area) = if ccw { (b, c, area) } else { (c, b, -area) };
    let inv_area = 1.0 / area;

    // bounding box clipped to the framebuffer and the viewport rectangle
    let [vx, vy, vw, vh] = env.viewport;
    let lo_x = vx.max(0) as f32;
    let hi_x = (vx + vw).min(fb.width as i32) as f32;
    let lo_y = vy.max(0) as f32;
    let hi_y = (vy + vh).min(fb.height as i32) as f32;
    let min_x = a.x.min(b.x).min(c.x).floor().max(lo_x) as i32;
    let max_x = a.x.max(b.x).max(c.x).ceil().min(hi_x) as i32;
    let min_y = a.y.min(b.y).min(c.y).floor().max(lo_y) as i32;
    let max_y = a.y.max(b.y).max(c.y).ceil().min(hi_y) as i32;

    for y in min_y..max_y {
        let py = y as f32 + 0.5;
        for x in min_x..max_x {
            let px = x as f32 + 0.5;
            let w0 = edge(&b, &c, px, py);
            let w1 = edge(&c, &a, px, py);
            let w2 = edge(&a, &b, px, py);
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let l0 = w0 * inv_area;
            let l1 = w1 * inv_area;
            let l2 = 1.0 - l0 - l1;
            let z = l0 * a.z + l1 * b.z + l2 * c.z;
            let mut varying = [0.0f32; MAX_VERTEX_ATTRIBS];
            for k in 0..MAX_VERTEX_ATTRIBS {
                varying[k] = l0 * a.varying[k] + l1 * b.varying[k] + l2 * c.varying[k];
            }
            super::emit_fragment(fb, env, x, y, z, &varying);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ATTR_B, ATTR_G};
    use crate::state::GlContext;
    use approx::assert_relative_eq;

    fn screen_vertex(x: f32, y: f32, color: [f32; 3]) -> Vertex {
        let mut v = Vertex::new();
        v.x = x;
        v.y = y;
        v.z = 0.5;
        v.w = 1.0;
        v.varying[ATTR_R] = color[0];
        v.varying[ATTR_G] = color[1];
        v.varying[ATTR_B] = color[2];
        v.varying[ATTR_A] = 1.0;
        v
    }

    #[test]
    fn fills_interior_not_exterior() {
        let mut ctx = GlContext::new(16, 16);
        ctx.prepare_draw();
        let red = [1.0, 0.0, 0.0];
        ctx.raster_triangle(
            screen_vertex(2.0, 2.0, red),
            screen_vertex(14.0, 2.0, red),
            screen_vertex(2.0, 14.0, red),
        );
        assert_eq!(ctx.framebuffer.color_at(4, 4)[0], 1.0);
        assert_eq!(ctx.framebuffer.color_at(13, 13)[0], 0.0);
    }

    #[test]
    fn winding_does_not_change_coverage() {
        let mut a = GlContext::new(16, 16);
        a.prepare_draw();
        let red = [1.0, 0.0, 0.0];
        a.raster_triangle(
            screen_vertex(2.0, 2.0, red),
            screen_vertex(14.0, 2.0, red),
            screen_vertex(2.0, 14.0, red),
        );
        let mut b = GlContext::new(16, 16);
        b.prepare_draw();
        b.raster_triangle(
            screen_vertex(2.0, 2.0, red),
            screen_vertex(2.0, 14.0, red),
            screen_vertex(14.0, 2.0, red),
        );
        assert_eq!(a.framebuffer.color, b.framebuffer.color);
    }

    #[test]
    fn interpolates_barycentric_color() {
        let mut ctx = GlContext::new(32, 32);
        ctx.prepare_draw();
        let a = screen_vertex(0.0, 0.0, [1.0, 0.0, 0.0]);
        let b = screen_vertex(32.0, 0.0, [0.0, 1.0, 0.0]);
        let c = screen_vertex(0.0, 32.0, [0.0, 0.0, 1.0]);
        ctx.raster_triangle(a, b, c);
        // weights of the sampled pixel center (10.5, 10.5)
        let l1 = 10.5 / 32.0;
        let l2 = 10.5 / 32.0;
        let l0 = 1.0 - l1 - l2;
        let px = ctx.framebuffer.color_at(10, 10);
        assert_relative_eq!(px[0], l0, epsilon = 1e-5);
        assert_relative_eq!(px[1], l1, epsilon = 1e-5);
        assert_relative_eq!(px[2], l2, epsilon = 1e-5);
    }

    #[test]
    fn back_face_culling_drops_cw_triangles() {
        let mut ctx = GlContext::new(16, 16);
        ctx.enable(GL_CULL_FACE);
        ctx.prepare_draw();
        let red = [1.0, 0.0, 0.0];
        // clockwise with the default CCW front face: back-facing
        ctx.raster_triangle(
            screen_vertex(2.0, 2.0, red),
            screen_vertex(2.0, 14.0, red),
            screen_vertex(14.0, 2.0, red),
        );
        assert_eq!(ctx.framebuffer.color_at(4, 4)[0], 0.0);
        // counter-clockwise survives
        ctx.raster_triangle(
            screen_vertex(2.0, 2.0, red),
            screen_vertex(14.0, 2.0, red),
            screen_vertex(2.0, 14.0, red),
        );
        assert_eq!(ctx.framebuffer.color_at(4, 4)[0], 1.0);
    }

    #[test]
    fn flat_shading_uses_last_vertex_color() {
        let mut ctx = GlContext::new(16, 16);
        ctx.shade_model(GL_FLAT);
        ctx.prepare_draw();
        let a = screen_vertex(0.0, 0.0, [1.0, 0.0, 0.0]);
        let b = screen_vertex(16.0, 0.0, [0.0, 1.0, 0.0]);
        let c = screen_vertex(0.0, 16.0, [0.0, 0.0, 1.0]);
        ctx.raster_triangle(a, b, c);
        assert_eq!(ctx.framebuffer.color_at(3, 3), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn degenerate_triangle_draws_nothing() {
        let mut ctx = GlContext::new(16, 16);
        ctx.prepare_draw();
        let red = [1.0, 0.0, 0.0];
        ctx.raster_triangle(
            screen_vertex(2.0, 2.0, red),
            screen_vertex(8.0, 8.0, red),
            screen_vertex(14.0, 14.0, red),
        );
        assert!(ctx.framebuffer.color.iter().all(|&c| c == 0.0));
    }
}
