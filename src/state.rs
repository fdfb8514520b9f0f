//! The rendering context and its state machine.
//!
//! `GlContext` owns everything a draw call reads: the framebuffer, both
//! matrix stacks, fixed-function toggles and parameters, the immediate-mode
//! assembler, client arrays, textures, display lists, and the three
//! specialization caches with their resolved per-draw callables.
//!
//! Every setter validates its arguments first and records a GL-style error
//! code on failure, leaving all state untouched. Successful writes OR the
//! matching bit into the dirty mask so `prepare_draw` re-resolves only what
//! changed.

use std::rc::Rc;

use bitflags::bitflags;
use log::debug;

use crate::arrays::ClientArray;
use crate::framebuffer::Framebuffer;
use crate::immediate::ImmediateState;
use crate::lists::ListStore;
use crate::matrix::{MatrixStack, MODELVIEW_MAX_STACK_DEPTH, PROJECTION_MAX_STACK_DEPTH};
use crate::pipeline::{FragmentStage, VertexStage, MAX_VERTEX_ATTRIBS};
use crate::specialize::{
    depth_test, fragment_write, CodegenBackend, DepthTestKey, DepthTestOp, FragmentWriteKey,
    FragmentWriteOp, SpecCache, TextureFetchKey, SPEC_CACHE_CAPACITY,
};
use crate::texture::TextureStore;
use crate::types::*;

pub const MAX_LIGHTS: usize = 8;

bitflags! {
    /// Which specialization-relevant state changed since the last draw.
    pub struct DirtyState: u32 {
        const BLEND_ENABLE   = 1 << 0;
        const BLEND_FUNC     = 1 << 1;
        const BLEND_EQUATION = 1 << 2;
        const COLOR_MASK     = 1 << 3;
        const DEPTH_WRITE    = 1 << 4;
        const DEPTH_ENABLE   = 1 << 5;
        const DEPTH_FUNC     = 1 << 6;
        const DEPTH_RANGE    = 1 << 7;

        const FRAGMENT_WRITE_GROUP = Self::BLEND_ENABLE.bits | Self::BLEND_FUNC.bits
            | Self::BLEND_EQUATION.bits | Self::COLOR_MASK.bits | Self::DEPTH_WRITE.bits;
        const DEPTH_TEST_GROUP = Self::DEPTH_ENABLE.bits | Self::DEPTH_FUNC.bits
            | Self::DEPTH_RANGE.bits;
    }
}

/// Fog block.
#[derive(Clone, Copy)]
pub struct Fog {
    pub mode: GLenum,
    pub density: f32,
    pub start: f32,
    pub end: f32,
    pub index: f32,
    pub color: [f32; 4],
    pub coord_src: GLenum,
}

/// One light source.
#[derive(Clone, Copy)]
pub struct Light {
    pub enabled: bool,
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub position: [f32; 4],
    pub spot_direction: [f32; 3],
    pub spot_exponent: f32,
    pub spot_cutoff: f32,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
}

/// Material parameters; the context holds a front/back pair.
#[derive(Clone, Copy)]
pub struct Material {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub emission: [f32; 4],
    pub shininess: f32,
}

impl Material {
    fn new() -> Self {
        Self {
            ambient: [0.2, 0.2, 0.2, 1.0],
            diffuse: [0.8, 0.8, 0.8, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            emission: [0.0, 0.0, 0.0, 1.0],
            shininess: 0.0,
        }
    }
}

/// Complete rendering context.
pub struct GlContext {
    // ── Render targets ──────────────────────────────────────────────────
    pub framebuffer: Framebuffer,

    // ── Matrix stacks ───────────────────────────────────────────────────
    pub(crate) modelview: MatrixStack,
    pub(crate) projection: MatrixStack,
    pub(crate) matrix_mode: GLenum,

    // ── Clear state ─────────────────────────────────────────────────────
    pub(crate) clear_color: [f32; 4],
    pub(crate) clear_depth: f32,
    pub(crate) clear_stencil: u8,

    // ── Capability flags ────────────────────────────────────────────────
    pub(crate) depth_test: bool,
    pub(crate) blend: bool,
    pub(crate) cull: bool,
    pub(crate) scissor_test: bool,
    pub(crate) fog_enabled: bool,
    pub(crate) lighting: bool,
    pub(crate) point_smooth: bool,
    pub(crate) line_smooth: bool,
    pub(crate) texture_1d: bool,
    pub(crate) texture_2d: bool,
    pub(crate) texture_3d: bool,

    // ── Depth state ─────────────────────────────────────────────────────
    pub(crate) depth_func: GLenum,
    pub(crate) depth_mask: bool,
    pub(crate) depth_range: [f32; 2],

    // ── Blend state ─────────────────────────────────────────────────────
    pub(crate) blend_src_rgb: GLenum,
    pub(crate) blend_dst_rgb: GLenum,
    pub(crate) blend_src_alpha: GLenum,
    pub(crate) blend_dst_alpha: GLenum,
    pub(crate) blend_eq_rgb: GLenum,
    pub(crate) blend_eq_alpha: GLenum,
    pub(crate) blend_color: [f32; 4],

    // ── Masks, cull, raster parameters ──────────────────────────────────
    pub(crate) color_mask: [bool; 4],
    pub(crate) cull_face_mode: GLenum,
    pub(crate) front_face: GLenum,
    pub(crate) shade_model: GLenum,
    pub(crate) point_size: f32,
    pub(crate) line_width: f32,
    pub(crate) scissor: [i32; 4],
    pub(crate) viewport: [i32; 4],

    // ── Fog & lighting ──────────────────────────────────────────────────
    pub(crate) fog: Fog,
    pub(crate) lights: [Light; MAX_LIGHTS],
    pub(crate) materials: [Material; 2],

    // ── Immediate mode ──────────────────────────────────────────────────
    pub(crate) immediate: ImmediateState,
    pub(crate) cur_color: [f32; 4],
    pub(crate) cur_normal: [f32; 3],
    pub(crate) cur_texcoord: [f32; 4],

    // ── Client arrays ───────────────────────────────────────────────────
    pub(crate) vertex_array: ClientArray,
    pub(crate) color_array: ClientArray,
    pub(crate) tex_coord_array: ClientArray,
    pub(crate) normal_array: ClientArray,

    // ── Textures ────────────────────────────────────────────────────────
    pub textures: TextureStore,
    pub(crate) binding_1d: GLuint,
    pub(crate) binding_2d: GLuint,
    pub(crate) binding_3d: GLuint,

    // ── Display lists ───────────────────────────────────────────────────
    pub(crate) lists: ListStore,

    // ── Pipeline stages ─────────────────────────────────────────────────
    pub(crate) vertex_stage: VertexStage,
    pub(crate) fragment_stage: FragmentStage,

    // ── Specialization ──────────────────────────────────────────────────
    pub(crate) fragment_write_cache: SpecCache<FragmentWriteKey>,
    pub(crate) depth_test_cache: SpecCache<DepthTestKey>,
    pub(crate) texture_fetch_cache: SpecCache<TextureFetchKey>,
    pub(crate) fragment_write_op: Rc<FragmentWriteOp>,
    pub(crate) depth_test_op: Rc<DepthTestOp>,
    pub(crate) codegen: Option<Box<dyn CodegenBackend>>,
    pub(crate) dirty: DirtyState,

    // ── Error slot ──────────────────────────────────────────────────────
    pub(crate) error: GLenum,
}

impl GlContext {
    /// Create a context with classic fixed-function defaults and buffers
    /// of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        debug!("creating {width}x{height} context");
        let default_write = FragmentWriteKey {
            blend: false,
            src_rgb: GL_ONE,
            dst_rgb: GL_ZERO,
            src_alpha: GL_ONE,
            dst_alpha: GL_ZERO,
            eq_rgb: GL_FUNC_ADD,
            eq_alpha: GL_FUNC_ADD,
            color_mask: [true; 4],
            depth_write: false,
        };
        let default_depth = DepthTestKey {
            enabled: false,
            func: GL_LESS,
            range: [0.0, 1.0],
        };
        let light = Light {
            enabled: false,
            ambient: [0.0, 0.0, 0.0, 1.0],
            diffuse: [0.0, 0.0, 0.0, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            position: [0.0, 0.0, 1.0, 0.0],
            spot_direction: [0.0, 0.0, -1.0],
            spot_exponent: 0.0,
            spot_cutoff: 180.0,
            constant_attenuation: 1.0,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
        };
        let mut lights = [light; MAX_LIGHTS];
        lights[0].diffuse = [1.0; 4];
        lights[0].specular = [1.0; 4];

        Self {
            framebuffer: Framebuffer::new(width, height),

            modelview: MatrixStack::new(MODELVIEW_MAX_STACK_DEPTH),
            projection: MatrixStack::new(PROJECTION_MAX_STACK_DEPTH),
            matrix_mode: GL_MODELVIEW,

            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,

            depth_test: false,
            blend: false,
            cull: false,
            scissor_test: false,
            fog_enabled: false,
            lighting: false,
            point_smooth: false,
            line_smooth: false,
            texture_1d: false,
            texture_2d: false,
            texture_3d: false,

            depth_func: GL_LESS,
            depth_mask: true,
            depth_range: [0.0, 1.0],

            blend_src_rgb: GL_ONE,
            blend_dst_rgb: GL_ZERO,
            blend_src_alpha: GL_ONE,
            blend_dst_alpha: GL_ZERO,
            blend_eq_rgb: GL_FUNC_ADD,
            blend_eq_alpha: GL_FUNC_ADD,
            blend_color: [0.0; 4],

            color_mask: [true; 4],
            cull_face_mode: GL_BACK,
            front_face: GL_CCW,
            shade_model: GL_SMOOTH,
            point_size: 1.0,
            line_width: 1.0,
            scissor: [0, 0, width as i32, height as i32],
            viewport: [0, 0, width as i32, height as i32],

            fog: Fog {
                mode: GL_EXP,
                density: 1.0,
                start: 0.0,
                end: 1.0,
                index: 0.0,
                color: [0.0; 4],
                coord_src: GL_FRAGMENT_DEPTH,
            },
            lights,
            materials: [Material::new(); 2],

            immediate: ImmediateState::new(),
            cur_color: [1.0; 4],
            cur_normal: [0.0, 0.0, 1.0],
            cur_texcoord: [0.0, 0.0, 0.0, 1.0],

            vertex_array: ClientArray::new(4),
            color_array: ClientArray::new(4),
            tex_coord_array: ClientArray::new(4),
            normal_array: ClientArray::new(3),

            textures: TextureStore::new(),
            binding_1d: 0,
            binding_2d: 0,
            binding_3d: 0,

            lists: ListStore::new(),

            vertex_stage: VertexStage::Fixed,
            fragment_stage: FragmentStage::Fixed,

            fragment_write_cache: SpecCache::new(SPEC_CACHE_CAPACITY),
            depth_test_cache: SpecCache::new(SPEC_CACHE_CAPACITY),
            texture_fetch_cache: SpecCache::new(SPEC_CACHE_CAPACITY),
            fragment_write_op: fragment_write::build_interpreter(&default_write),
            depth_test_op: depth_test::build_interpreter(&default_depth),
            codegen: None,
            dirty: DirtyState::all(),

            error: GL_NO_ERROR,
        }
    }

    /// Record an error; only the first one is kept until `get_error`.
    pub(crate) fn set_error(&mut self, err: GLenum) {
        if self.error == GL_NO_ERROR {
            self.error = err;
        }
    }

    /// Return and clear the pending error.
    pub fn get_error(&mut self) -> GLenum {
        let err = self.error;
        self.error = GL_NO_ERROR;
        err
    }

    // ── Capabilities ────────────────────────────────────────────────────

    fn set_cap(&mut self, cap: GLenum, value: bool) {
        match cap {
            GL_DEPTH_TEST => {
                self.depth_test = value;
                // the write key bakes "test enabled" into its depth_write flag
                self.dirty
                    .insert(DirtyState::DEPTH_ENABLE | DirtyState::DEPTH_WRITE);
            }
            GL_BLEND => {
                self.blend = value;
                self.dirty.insert(DirtyState::BLEND_ENABLE);
            }
            GL_CULL_FACE => self.cull = value,
            GL_SCISSOR_TEST => self.scissor_test = value,
            GL_FOG => self.fog_enabled = value,
            GL_LIGHTING => self.lighting = value,
            GL_POINT_SMOOTH => self.point_smooth = value,
            GL_LINE_SMOOTH => self.line_smooth = value,
            GL_TEXTURE_1D => self.texture_1d = value,
            GL_TEXTURE_2D => self.texture_2d = value,
            GL_TEXTURE_3D => self.texture_3d = value,
            GL_LIGHT0..=GL_LIGHT7 => self.lights[(cap - GL_LIGHT0) as usize].enabled = value,
            _ => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn enable(&mut self, cap: GLenum) {
        self.set_cap(cap, true);
    }

    pub fn disable(&mut self, cap: GLenum) {
        self.set_cap(cap, false);
    }

    pub fn is_enabled(&mut self, cap: GLenum) -> bool {
        match cap {
            GL_DEPTH_TEST => self.depth_test,
            GL_BLEND => self.blend,
            GL_CULL_FACE => self.cull,
            GL_SCISSOR_TEST => self.scissor_test,
            GL_FOG => self.fog_enabled,
            GL_LIGHTING => self.lighting,
            GL_POINT_SMOOTH => self.point_smooth,
            GL_LINE_SMOOTH => self.line_smooth,
            GL_TEXTURE_1D => self.texture_1d,
            GL_TEXTURE_2D => self.texture_2d,
            GL_TEXTURE_3D => self.texture_3d,
            GL_LIGHT0..=GL_LIGHT7 => self.lights[(cap - GL_LIGHT0) as usize].enabled,
            GL_VERTEX_ARRAY => self.vertex_array.enabled,
            GL_COLOR_ARRAY => self.color_array.enabled,
            GL_TEXTURE_COORD_ARRAY => self.tex_coord_array.enabled,
            GL_NORMAL_ARRAY => self.normal_array.enabled,
            _ => {
                self.set_error(GL_INVALID_ENUM);
                false
            }
        }
    }

    // ── Blend ───────────────────────────────────────────────────────────

    pub fn blend_func(&mut self, src: GLenum, dst: GLenum) {
        self.blend_func_separate(src, dst, src, dst);
    }

    pub fn blend_func_separate(
        &mut self,
        src_rgb: GLenum,
        dst_rgb: GLenum,
        src_alpha: GLenum,
        dst_alpha: GLenum,
    ) {
        if !valid_blend_factor(src_rgb, true)
            || !valid_blend_factor(dst_rgb, false)
            || !valid_blend_factor(src_alpha, true)
            || !valid_blend_factor(dst_alpha, false)
        {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.blend_src_rgb = src_rgb;
        self.blend_dst_rgb = dst_rgb;
        self.blend_src_alpha = src_alpha;
        self.blend_dst_alpha = dst_alpha;
        self.dirty.insert(DirtyState::BLEND_FUNC);
    }

    pub fn blend_equation(&mut self, eq: GLenum) {
        self.blend_equation_separate(eq, eq);
    }

    pub fn blend_equation_separate(&mut self, eq_rgb: GLenum, eq_alpha: GLenum) {
        if !valid_blend_equation(eq_rgb) || !valid_blend_equation(eq_alpha) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.blend_eq_rgb = eq_rgb;
        self.blend_eq_alpha = eq_alpha;
        self.dirty.insert(DirtyState::BLEND_EQUATION);
    }

    /// Constant blend color; a runtime input of the write callable, not
    /// part of its key.
    pub fn blend_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.blend_color = [
            r.clamp(0.0, 1.0),
            g.clamp(0.0, 1.0),
            b.clamp(0.0, 1.0),
            a.clamp(0.0, 1.0),
        ];
    }

    // ── Depth ───────────────────────────────────────────────────────────

    pub fn depth_func(&mut self, func: GLenum) {
        if !valid_compare_func(func) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        self.depth_func = func;
        self.dirty.insert(DirtyState::DEPTH_FUNC);
    }

    pub fn depth_mask(&mut self, flag: bool) {
        self.depth_mask = flag;
        self.dirty.insert(DirtyState::DEPTH_WRITE);
    }

    pub fn depth_range(&mut self, near: f64, far: f64) {
        self.depth_range = [near.clamp(0.0, 1.0) as f32, far.clamp(0.0, 1.0) as f32];
        self.dirty.insert(DirtyState::DEPTH_RANGE);
    }

    // ── Masks, cull, raster parameters ──────────────────────────────────

    pub fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        self.color_mask = [r, g, b, a];
        self.dirty.insert(DirtyState::COLOR_MASK);
    }

    pub fn cull_face(&mut self, mode: GLenum) {
        match mode {
            GL_FRONT | GL_BACK | GL_FRONT_AND_BACK => self.cull_face_mode = mode,
            _ => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn front_face_winding(&mut self, mode: GLenum) {
        match mode {
            GL_CW | GL_CCW => self.front_face = mode,
            _ => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn shade_model(&mut self, mode: GLenum) {
        match mode {
            GL_FLAT | GL_SMOOTH => self.shade_model = mode,
            _ => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn point_size(&mut self, size: f32) {
        if size <= 0.0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        self.point_size = size;
    }

    pub fn line_width(&mut self, width: f32) {
        if width <= 0.0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        self.line_width = width;
    }

    pub fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if width < 0 || height < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        self.scissor = [x, y, width, height];
    }

    /// Window rectangle the NDC cube maps onto; defaults to the full
    /// framebuffer.
    pub fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if width < 0 || height < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        self.viewport = [x, y, width, height];
    }

    // ── Clears ──────────────────────────────────────────────────────────

    pub fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color = [r, g, b, a];
    }

    pub fn clear_depth(&mut self, depth: f64) {
        self.clear_depth = depth.clamp(0.0, 1.0) as f32;
    }

    pub fn clear_stencil(&mut self, s: i32) {
        self.clear_stencil = s as u8;
    }

    pub fn clear(&mut self, mask: GLbitfield) {
        if mask & !(GL_COLOR_BUFFER_BIT | GL_DEPTH_BUFFER_BIT | GL_STENCIL_BUFFER_BIT) != 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        if mask & GL_COLOR_BUFFER_BIT != 0 {
            self.framebuffer.clear_color(self.clear_color, self.color_mask);
        }
        if mask & GL_DEPTH_BUFFER_BIT != 0 {
            self.framebuffer.clear_depth(self.clear_depth, self.depth_mask);
        }
        if mask & GL_STENCIL_BUFFER_BIT != 0 {
            self.framebuffer.clear_stencil(self.clear_stencil);
        }
    }

    // ── Fog ─────────────────────────────────────────────────────────────

    pub fn fog_f(&mut self, pname: GLenum, param: f32) {
        match pname {
            GL_FOG_MODE => match param as GLenum {
                GL_LINEAR | GL_EXP | GL_EXP2 => self.fog.mode = param as GLenum,
                _ => self.set_error(GL_INVALID_ENUM),
            },
            GL_FOG_DENSITY => {
                if param < 0.0 {
                    self.set_error(GL_INVALID_VALUE);
                } else {
                    self.fog.density = param;
                }
            }
            GL_FOG_START => self.fog.start = param,
            GL_FOG_END => self.fog.end = param,
            GL_FOG_INDEX => self.fog.index = param,
            GL_FOG_COORD_SRC => match param as GLenum {
                GL_FOG_COORD | GL_FRAGMENT_DEPTH => self.fog.coord_src = param as GLenum,
                _ => self.set_error(GL_INVALID_ENUM),
            },
            _ => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn fog_i(&mut self, pname: GLenum, param: i32) {
        self.fog_f(pname, param as f32);
    }

    pub fn fog_fv(&mut self, pname: GLenum, params: &[f32]) {
        match pname {
            GL_FOG_COLOR => {
                if params.len() < 4 {
                    self.set_error(GL_INVALID_VALUE);
                    return;
                }
                self.fog.color = [params[0], params[1], params[2], params[3]];
            }
            _ => {
                if params.is_empty() {
                    self.set_error(GL_INVALID_VALUE);
                    return;
                }
                self.fog_f(pname, params[0]);
            }
        }
    }

    // ── Lights & materials ──────────────────────────────────────────────

    fn light_index(&mut self, light: GLenum) -> Option<usize> {
        if (GL_LIGHT0..GL_LIGHT0 + MAX_LIGHTS as GLenum).contains(&light) {
            Some((light - GL_LIGHT0) as usize)
        } else {
            self.set_error(GL_INVALID_ENUM);
            None
        }
    }

    pub fn light_f(&mut self, light: GLenum, pname: GLenum, param: f32) {
        let Some(i) = self.light_index(light) else {
            return;
        };
        match pname {
            GL_SPOT_EXPONENT => {
                if !(0.0..=128.0).contains(&param) {
                    self.set_error(GL_INVALID_VALUE);
                } else {
                    self.lights[i].spot_exponent = param;
                }
            }
            GL_SPOT_CUTOFF => {
                if !(0.0..=90.0).contains(&param) && param != 180.0 {
                    self.set_error(GL_INVALID_VALUE);
                } else {
                    self.lights[i].spot_cutoff = param;
                }
            }
            GL_CONSTANT_ATTENUATION | GL_LINEAR_ATTENUATION | GL_QUADRATIC_ATTENUATION => {
                if param < 0.0 {
                    self.set_error(GL_INVALID_VALUE);
                    return;
                }
                match pname {
                    GL_CONSTANT_ATTENUATION => self.lights[i].constant_attenuation = param,
                    GL_LINEAR_ATTENUATION => self.lights[i].linear_attenuation = param,
                    _ => self.lights[i].quadratic_attenuation = param,
                }
            }
            _ => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn light_fv(&mut self, light: GLenum, pname: GLenum, params: &[f32]) {
        let Some(i) = self.light_index(light) else {
            return;
        };
        let need = match pname {
            GL_AMBIENT | GL_DIFFUSE | GL_SPECULAR | GL_POSITION => 4,
            GL_SPOT_DIRECTION => 3,
            _ => 1,
        };
        if params.len() < need {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        match pname {
            GL_AMBIENT => self.lights[i].ambient = [params[0], params[1], params[2], params[3]],
            GL_DIFFUSE => self.lights[i].diffuse = [params[0], params[1], params[2], params[3]],
            GL_SPECULAR => self.lights[i].specular = [params[0], params[1], params[2], params[3]],
            GL_POSITION => self.lights[i].position = [params[0], params[1], params[2], params[3]],
            GL_SPOT_DIRECTION => {
                self.lights[i].spot_direction = [params[0], params[1], params[2]]
            }
            _ => self.light_f(light, pname, params[0]),
        }
    }

    fn material_indices(&mut self, face: GLenum) -> Option<(usize, usize)> {
        match face {
            GL_FRONT => Some((0, 0)),
            GL_BACK => Some((1, 1)),
            GL_FRONT_AND_BACK => Some((0, 1)),
            _ => {
                self.set_error(GL_INVALID_ENUM);
                None
            }
        }
    }

    pub fn material_f(&mut self, face: GLenum, pname: GLenum, param: f32) {
        let Some((lo, hi)) = self.material_indices(face) else {
            return;
        };
        if pname != GL_SHININESS {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        if !(0.0..=128.0).contains(&param) {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        for m in &mut self.materials[lo..=hi] {
            m.shininess = param;
        }
    }

    pub fn material_fv(&mut self, face: GLenum, pname: GLenum, params: &[f32]) {
        let Some((lo, hi)) = self.material_indices(face) else {
            return;
        };
        if pname == GL_SHININESS {
            if params.is_empty() {
                self.set_error(GL_INVALID_VALUE);
                return;
            }
            self.material_f(face, pname, params[0]);
            return;
        }
        if params.len() < 4 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        let v = [params[0], params[1], params[2], params[3]];
        for m in &mut self.materials[lo..=hi] {
            match pname {
                GL_AMBIENT => m.ambient = v,
                GL_DIFFUSE => m.diffuse = v,
                GL_SPECULAR => m.specular = v,
                GL_EMISSION => m.emission = v,
                GL_AMBIENT_AND_DIFFUSE => {
                    m.ambient = v;
                    m.diffuse = v;
                }
                _ => {
                    self.set_error(GL_INVALID_ENUM);
                    return;
                }
            }
        }
    }

    // ── Pipeline stages ─────────────────────────────────────────────────

    pub fn set_vertex_stage(&mut self, stage: VertexStage) {
        if let VertexStage::Program {
            attr_count,
            varying_count,
            ..
        } = stage
        {
            if attr_count > MAX_VERTEX_ATTRIBS || varying_count > MAX_VERTEX_ATTRIBS {
                self.set_error(GL_INVALID_VALUE);
                return;
            }
        }
        self.vertex_stage = stage;
    }

    pub fn set_fragment_stage(&mut self, stage: FragmentStage) {
        if let FragmentStage::Program { varying_count, .. } = stage {
            if varying_count > MAX_VERTEX_ATTRIBS {
                self.set_error(GL_INVALID_VALUE);
                return;
            }
        }
        self.fragment_stage = stage;
    }

    // ── Queries ─────────────────────────────────────────────────────────

    fn query(&self, pname: GLenum) -> Option<([f64; 16], usize)> {
        let mut out = [0.0f64; 16];
        let n = match pname {
            GL_MATRIX_MODE => {
                out[0] = self.matrix_mode as f64;
                1
            }
            GL_MODELVIEW_MATRIX => {
                for (o, v) in out.iter_mut().zip(self.modelview.top().to_cols_array()) {
                    *o = v as f64;
                }
                16
            }
            GL_PROJECTION_MATRIX => {
                for (o, v) in out.iter_mut().zip(self.projection.top().to_cols_array()) {
                    *o = v as f64;
                }
                16
            }
            GL_MODELVIEW_STACK_DEPTH => {
                out[0] = self.modelview.depth() as f64;
                1
            }
            GL_PROJECTION_STACK_DEPTH => {
                out[0] = self.projection.depth() as f64;
                1
            }
            GL_MAX_MODELVIEW_STACK_DEPTH => {
                out[0] = MODELVIEW_MAX_STACK_DEPTH as f64;
                1
            }
            GL_MAX_PROJECTION_STACK_DEPTH => {
                out[0] = PROJECTION_MAX_STACK_DEPTH as f64;
                1
            }
            GL_MAX_LIGHTS => {
                out[0] = MAX_LIGHTS as f64;
                1
            }
            GL_DEPTH_FUNC => {
                out[0] = self.depth_func as f64;
                1
            }
            GL_DEPTH_WRITEMASK => {
                out[0] = self.depth_mask as u8 as f64;
                1
            }
            GL_DEPTH_RANGE => {
                out[0] = self.depth_range[0] as f64;
                out[1] = self.depth_range[1] as f64;
                2
            }
            GL_DEPTH_CLEAR_VALUE => {
                out[0] = self.clear_depth as f64;
                1
            }
            GL_STENCIL_CLEAR_VALUE => {
                out[0] = self.clear_stencil as f64;
                1
            }
            GL_COLOR_CLEAR_VALUE => {
                for i in 0..4 {
                    out[i] = self.clear_color[i] as f64;
                }
                4
            }
            GL_COLOR_WRITEMASK => {
                for i in 0..4 {
                    out[i] = self.color_mask[i] as u8 as f64;
                }
                4
            }
            GL_BLEND_SRC_RGB => {
                out[0] = self.blend_src_rgb as f64;
                1
            }
            GL_BLEND_DST_RGB => {
                out[0] = self.blend_dst_rgb as f64;
                1
            }
            GL_BLEND_SRC_ALPHA => {
                out[0] = self.blend_src_alpha as f64;
                1
            }
            GL_BLEND_DST_ALPHA => {
                out[0] = self.blend_dst_alpha as f64;
                1
            }
            GL_BLEND_EQUATION_RGB => {
                out[0] = self.blend_eq_rgb as f64;
                1
            }
            GL_BLEND_EQUATION_ALPHA => {
                out[0] = self.blend_eq_alpha as f64;
                1
            }
            GL_BLEND_COLOR => {
                for i in 0..4 {
                    out[i] = self.blend_color[i] as f64;
                }
                4
            }
            GL_FOG_MODE => {
                out[0] = self.fog.mode as f64;
                1
            }
            GL_FOG_DENSITY => {
                out[0] = self.fog.density as f64;
                1
            }
            GL_FOG_START => {
                out[0] = self.fog.start as f64;
                1
            }
            GL_FOG_END => {
                out[0] = self.fog.end as f64;
                1
            }
            GL_FOG_INDEX => {
                out[0] = self.fog.index as f64;
                1
            }
            GL_FOG_COLOR => {
                for i in 0..4 {
                    out[i] = self.fog.color[i] as f64;
                }
                4
            }
            GL_VIEWPORT => {
                for i in 0..4 {
                    out[i] = self.viewport[i] as f64;
                }
                4
            }
            GL_POINT_SIZE => {
                out[0] = self.point_size as f64;
                1
            }
            GL_LINE_WIDTH => {
                out[0] = self.line_width as f64;
                1
            }
            GL_SHADE_MODEL => {
                out[0] = self.shade_model as f64;
                1
            }
            GL_TEXTURE_BINDING_1D => {
                out[0] = self.binding_1d as f64;
                1
            }
            GL_TEXTURE_BINDING_2D => {
                out[0] = self.binding_2d as f64;
                1
            }
            GL_TEXTURE_BINDING_3D => {
                out[0] = self.binding_3d as f64;
                1
            }
            GL_VERTEX_ARRAY => {
                out[0] = self.vertex_array.enabled as u8 as f64;
                1
            }
            GL_COLOR_ARRAY => {
                out[0] = self.color_array.enabled as u8 as f64;
                1
            }
            GL_TEXTURE_COORD_ARRAY => {
                out[0] = self.tex_coord_array.enabled as u8 as f64;
                1
            }
            GL_NORMAL_ARRAY => {
                out[0] = self.normal_array.enabled as u8 as f64;
                1
            }
            _ => return None,
        };
        Some((out, n))
    }

    pub fn get_floatv(&mut self, pname: GLenum, out: &mut [f32]) {
        match self.query(pname) {
            Some((v, n)) => {
                for i in 0..n.min(out.len()) {
                    out[i] = v[i] as f32;
                }
            }
            None => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn get_doublev(&mut self, pname: GLenum, out: &mut [f64]) {
        match self.query(pname) {
            Some((v, n)) => {
                let count = n.min(out.len());
                out[..count].copy_from_slice(&v[..count]);
            }
            None => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn get_integerv(&mut self, pname: GLenum, out: &mut [i32]) {
        match self.query(pname) {
            Some((v, n)) => {
                for i in 0..n.min(out.len()) {
                    out[i] = v[i].round() as i32;
                }
            }
            None => self.set_error(GL_INVALID_ENUM),
        }
    }

    pub fn get_booleanv(&mut self, pname: GLenum, out: &mut [bool]) {
        match self.query(pname) {
            Some((v, n)) => {
                for i in 0..n.min(out.len()) {
                    out[i] = v[i] != 0.0;
                }
            }
            None => self.set_error(GL_INVALID_ENUM),
        }
    }
}

fn valid_blend_factor(factor: GLenum, src: bool) -> bool {
    matches!(
        factor,
        GL_ZERO
            | GL_ONE
            | GL_SRC_COLOR
            | GL_ONE_MINUS_SRC_COLOR
            | GL_DST_COLOR
            | GL_ONE_MINUS_DST_COLOR
            | GL_SRC_ALPHA
            | GL_ONE_MINUS_SRC_ALPHA
            | GL_DST_ALPHA
            | GL_ONE_MINUS_DST_ALPHA
            | GL_CONSTANT_COLOR
            | GL_ONE_MINUS_CONSTANT_COLOR
            | GL_CONSTANT_ALPHA
            | GL_ONE_MINUS_CONSTANT_ALPHA
    ) || (src && factor == GL_SRC_ALPHA_SATURATE)
}

fn valid_blend_equation(eq: GLenum) -> bool {
    matches!(
        eq,
        GL_FUNC_ADD | GL_FUNC_SUBTRACT | GL_FUNC_REVERSE_SUBTRACT | GL_MIN | GL_MAX
    )
}

fn valid_compare_func(func: GLenum) -> bool {
    matches!(
        func,
        GL_NEVER | GL_LESS | GL_EQUAL | GL_LEQUAL | GL_GREATER | GL_NOTEQUAL | GL_GEQUAL | GL_ALWAYS
    )
}
