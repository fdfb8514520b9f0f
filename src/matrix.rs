//! Bounded matrix stacks and the classic transform builders.
//!
//! Two stacks live in the context: modelview (depth 32) and projection
//! (depth 2), selected with `matrix_mode`. All arithmetic is `glam::Mat4`;
//! the frustum/ortho builders write the classic column-major formulas.

use glam::{Mat4, Vec3};

use crate::state::GlContext;
use crate::types::*;

pub const MODELVIEW_MAX_STACK_DEPTH: usize = 32;
pub const PROJECTION_MAX_STACK_DEPTH: usize = 2;

/// Fixed-depth matrix stack. The top entry always exists.
pub struct MatrixStack {
    mats: Vec<Mat4>,
    max_depth: usize,
}

impl MatrixStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            mats: vec![Mat4::IDENTITY],
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.mats.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn top(&self) -> &Mat4 {
        // invariant: never empty
        self.mats.last().unwrap()
    }

    pub fn top_mut(&mut self) -> &mut Mat4 {
        self.mats.last_mut().unwrap()
    }

    /// Duplicate the top entry. Fails (without mutation) when full.
    pub fn push(&mut self) -> bool {
        if self.mats.len() >= self.max_depth {
            return false;
        }
        let top = *self.top();
        self.mats.push(top);
        true
    }

    /// Discard the top entry. Fails when only the base entry remains.
    pub fn pop(&mut self) -> bool {
        if self.mats.len() <= 1 {
            return false;
        }
        self.mats.pop();
        true
    }

    /// Right-multiply the top by `m`, the classic post-concatenation.
    pub fn mult(&mut self, m: Mat4) {
        let top = self.top_mut();
        *top = *top * m;
    }
}

/// Rotation about an arbitrary axis, angle in degrees.
pub fn rotation(angle_deg: f32, x: f32, y: f32, z: f32) -> Mat4 {
    let axis = Vec3::new(x, y, z);
    if axis.length_squared() == 0.0 {
        return Mat4::IDENTITY;
    }
    Mat4::from_axis_angle(axis.normalize(), angle_deg.to_radians())
}

/// Perspective frustum, column-major GL layout.
pub fn frustum(l: f64, r: f64, b: f64, t: f64, n: f64, f: f64) -> Mat4 {
    let a = ((r + l) / (r - l)) as f32;
    let bb = ((t + b) / (t - b)) as f32;
    let c = (-(f + n) / (f - n)) as f32;
    let d = (-2.0 * f * n / (f - n)) as f32;
    Mat4::from_cols_array(&[
        (2.0 * n / (r - l)) as f32, 0.0, 0.0, 0.0,
        0.0, (2.0 * n / (t - b)) as f32, 0.0, 0.0,
        a, bb, c, -1.0,
        0.0, 0.0, d, 0.0,
    ])
}

/// Orthographic projection, column-major GL layout.
pub fn ortho(l: f64, r: f64, b: f64, t: f64, n: f64, f: f64) -> Mat4 {
    let tx = (-(r + l) / (r - l)) as f32;
    let ty = (-(t + b) / (t - b)) as f32;
    let tz = (-(f + n) / (f - n)) as f32;
    Mat4::from_cols_array(&[
        (2.0 / (r - l)) as f32, 0.0, 0.0, 0.0,
        0.0, (2.0 / (t - b)) as f32, 0.0, 0.0,
        0.0, 0.0, (-2.0 / (f - n)) as f32, 0.0,
        tx, ty, tz, 1.0,
    ])
}

// ── Context API ──────────────────────────────────────────────────────────────

impl GlContext {
    fn current_stack(&mut self) -> &mut MatrixStack {
        match self.matrix_mode {
            GL_PROJECTION => &mut self.projection,
            _ => &mut self.modelview,
        }
    }

    pub fn matrix_mode(&mut self, mode: GLenum) {
        match mode {
            GL_MODELVIEW | GL_PROJECTION => self.matrix_mode = mode,
            _ => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn push_matrix(&mut self) {
        if !self.current_stack().push() {
            self.set_error(GL_STACK_OVERFLOW);
        }
    }

    pub fn pop_matrix(&mut self) {
        if !self.current_stack().pop() {
            self.set_error(GL_STACK_UNDERFLOW);
        }
    }

    pub fn load_identity(&mut self) {
        *self.current_stack().top_mut() = Mat4::IDENTITY;
    }

    /// Replace the top with `m` (column-major, like the rest of the API).
    pub fn load_matrix(&mut self, m: &[f32; 16]) {
        *self.current_stack().top_mut() = Mat4::from_cols_array(m);
    }

    pub fn mult_matrix(&mut self, m: &[f32; 16]) {
        self.current_stack().mult(Mat4::from_cols_array(m));
    }

    /// Row-major variant of `load_matrix`.
    pub fn load_transpose_matrix(&mut self, m: &[f32; 16]) {
        *self.current_stack().top_mut() = Mat4::from_cols_array(m).transpose();
    }

    /// Row-major variant of `mult_matrix`.
    pub fn mult_transpose_matrix(&mut self, m: &[f32; 16]) {
        self.current_stack().mult(Mat4::from_cols_array(m).transpose());
    }

    pub fn translatef(&mut self, x: f32, y: f32, z: f32) {
        self.current_stack().mult(Mat4::from_translation(Vec3::new(x, y, z)));
    }

    pub fn rotatef(&mut self, angle_deg: f32, x: f32, y: f32, z: f32) {
        self.current_stack().mult(rotation(angle_deg, x, y, z));
    }

    pub fn scalef(&mut self, x: f32, y: f32, z: f32) {
        self.current_stack().mult(Mat4::from_scale(Vec3::new(x, y, z)));
    }

    pub fn frustum(&mut self, l: f64, r: f64, b: f64, t: f64, n: f64, f: f64) {
        if n <= 0.0 || f <= 0.0 || l == r || b == t || n == f {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        self.current_stack().mult(frustum(l, r, b, t, n, f));
    }

    pub fn ortho(&mut self, l: f64, r: f64, b: f64, t: f64, n: f64, f: f64) {
        if l == r || b == t || n == f {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        self.current_stack().mult(ortho(l, r, b, t, n, f));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn push_pop_round_trips_top() {
        let mut ctx = GlContext::new(4, 4);
        ctx.translatef(1.0, 2.0, 3.0);
        let before = *ctx.modelview.top();
        for _ in 0..8 {
            ctx.push_matrix();
            ctx.rotatef(17.0, 0.0, 1.0, 0.0);
        }
        for _ in 0..8 {
            ctx.pop_matrix();
        }
        assert_eq!(ctx.get_error(), GL_NO_ERROR);
        assert_eq!(*ctx.modelview.top(), before);
    }

    #[test]
    fn overflow_and_underflow_are_reported_noops() {
        let mut ctx = GlContext::new(4, 4);
        ctx.matrix_mode(GL_PROJECTION);
        ctx.push_matrix();
        assert_eq!(ctx.projection.depth(), 2);
        ctx.push_matrix();
        assert_eq!(ctx.get_error(), GL_STACK_OVERFLOW);
        assert_eq!(ctx.projection.depth(), 2);

        ctx.pop_matrix();
        ctx.pop_matrix();
        assert_eq!(ctx.get_error(), GL_STACK_UNDERFLOW);
        assert_eq!(ctx.projection.depth(), 1);
    }

    #[test]
    fn modelview_allows_depth_32() {
        let mut ctx = GlContext::new(4, 4);
        for _ in 0..31 {
            ctx.push_matrix();
        }
        assert_eq!(ctx.get_error(), GL_NO_ERROR);
        ctx.push_matrix();
        assert_eq!(ctx.get_error(), GL_STACK_OVERFLOW);
    }

    #[test]
    fn ortho_maps_box_to_ndc() {
        let m = ortho(0.0, 64.0, 0.0, 64.0, -1.0, 1.0);
        let p = m * Vec4::new(32.0, 64.0, 0.0, 1.0);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn frustum_maps_near_plane_corner() {
        let m = frustum(-1.0, 1.0, -1.0, 1.0, 1.0, 10.0);
        let p = m * Vec4::new(1.0, 1.0, -1.0, 1.0);
        assert_relative_eq!(p.x / p.w, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.y / p.w, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.z / p.w, -1.0, epsilon = 1e-5);
    }
}
