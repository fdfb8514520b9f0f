//! End-to-end draws through the public API: state setup, immediate-mode
//! assembly, transform, rasterization, and the specialized per-pixel ops.

use approx::assert_relative_eq;
use softgl::types::*;
use softgl::GlContext;

fn ortho_ctx(width: u32, height: u32) -> GlContext {
    let mut ctx = GlContext::new(width, height);
    ctx.matrix_mode(GL_PROJECTION);
    ctx.ortho(0.0, width as f64, 0.0, height as f64, -1.0, 1.0);
    ctx.matrix_mode(GL_MODELVIEW);
    ctx
}

#[test]
fn red_triangle_lands_where_expected() {
    let mut ctx = ortho_ctx(64, 64);
    ctx.color3f(1.0, 0.0, 0.0);
    ctx.begin(GL_TRIANGLES);
    ctx.vertex2f(10.0, 10.0);
    ctx.vertex2f(50.0, 10.0);
    ctx.vertex2f(30.0, 50.0);
    ctx.end();
    assert_eq!(ctx.get_error(), GL_NO_ERROR);
    assert_eq!(ctx.framebuffer.color_at(30, 25), [1.0, 0.0, 0.0, 1.0]);
    // corners stay untouched
    assert_eq!(ctx.framebuffer.color_at(1, 60), [0.0, 0.0, 0.0, 0.0]);
    assert_eq!(ctx.framebuffer.color_at(62, 62), [0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn smooth_shading_interpolates_vertex_colors() {
    // identity transforms: vertex coordinates are NDC
    let mut ctx = GlContext::new(32, 32);
    ctx.begin(GL_TRIANGLES);
    ctx.color3f(1.0, 0.0, 0.0);
    ctx.vertex2f(-1.0, -1.0);
    ctx.color3f(0.0, 1.0, 0.0);
    ctx.vertex2f(1.0, -1.0);
    ctx.color3f(0.0, 0.0, 1.0);
    ctx.vertex2f(-1.0, 1.0);
    ctx.end();
    // weights of the sampled center (10.5, 10.5) of a 32px right triangle
    let l1 = 10.5 / 32.0;
    let l2 = 10.5 / 32.0;
    let l0 = 1.0 - l1 - l2;
    let px = ctx.framebuffer.color_at(10, 10);
    assert_relative_eq!(px[0], l0, epsilon = 1e-5);
    assert_relative_eq!(px[1], l1, epsilon = 1e-5);
    assert_relative_eq!(px[2], l2, epsilon = 1e-5);
}

fn fullscreen_triangle(ctx: &mut GlContext, z: f32, color: [f32; 3]) {
    ctx.color3f(color[0], color[1], color[2]);
    ctx.begin(GL_TRIANGLES);
    ctx.vertex3f(-4.0, -4.0, z);
    ctx.vertex3f(4.0, -4.0, z);
    ctx.vertex3f(0.0, 4.0, z);
    ctx.end();
}

#[test]
fn depth_test_keeps_the_nearer_triangle() {
    let mut ctx = GlContext::new(16, 16);
    ctx.enable(GL_DEPTH_TEST);
    ctx.clear(GL_COLOR_BUFFER_BIT | GL_DEPTH_BUFFER_BIT);
    fullscreen_triangle(&mut ctx, -0.5, [1.0, 0.0, 0.0]);
    fullscreen_triangle(&mut ctx, 0.5, [0.0, 1.0, 0.0]);
    // the farther green triangle loses the LESS test
    assert_eq!(ctx.framebuffer.color_at(8, 8)[0], 1.0);
    assert_eq!(ctx.framebuffer.color_at(8, 8)[1], 0.0);
    assert_relative_eq!(ctx.framebuffer.depth_at(8, 8), 0.25, epsilon = 1e-5);
}

#[test]
fn without_depth_test_later_draws_overwrite() {
    let mut ctx = GlContext::new(16, 16);
    ctx.clear(GL_COLOR_BUFFER_BIT | GL_DEPTH_BUFFER_BIT);
    fullscreen_triangle(&mut ctx, -0.5, [1.0, 0.0, 0.0]);
    fullscreen_triangle(&mut ctx, 0.5, [0.0, 1.0, 0.0]);
    assert_eq!(ctx.framebuffer.color_at(8, 8)[1], 1.0);
    // depth stores stay off while the test is disabled
    assert_eq!(ctx.framebuffer.depth_at(8, 8), 1.0);
}

#[test]
fn alpha_blending_mixes_with_the_clear_color() {
    let mut ctx = GlContext::new(16, 16);
    ctx.clear_color(0.0, 0.0, 1.0, 1.0);
    ctx.clear(GL_COLOR_BUFFER_BIT);
    ctx.enable(GL_BLEND);
    ctx.blend_func(GL_SRC_ALPHA, GL_ONE_MINUS_SRC_ALPHA);
    ctx.color4f(1.0, 0.0, 0.0, 0.5);
    ctx.begin(GL_TRIANGLES);
    ctx.vertex2f(-4.0, -4.0);
    ctx.vertex2f(4.0, -4.0);
    ctx.vertex2f(0.0, 4.0);
    ctx.end();
    let px = ctx.framebuffer.color_at(8, 8);
    assert_relative_eq!(px[0], 0.5, epsilon = 1e-5);
    assert_relative_eq!(px[2], 0.5, epsilon = 1e-5);
}

#[test]
fn texture_modulates_and_reupload_shows_without_rebinding() {
    let mut ctx = ortho_ctx(16, 16);
    let mut ids = [0u32];
    ctx.gen_textures(&mut ids);
    ctx.enable(GL_TEXTURE_2D);
    ctx.bind_texture(GL_TEXTURE_2D, ids[0]);
    ctx.tex_parameter_i(GL_TEXTURE_2D, GL_TEXTURE_MAG_FILTER, GL_NEAREST);
    // 2x2 RGBA: red, green / blue, white
    #[rustfmt::skip]
    let texels: [u8; 16] = [
        255, 0, 0, 255,    0, 255, 0, 255,
        0, 0, 255, 255,    255, 255, 255, 255,
    ];
    ctx.tex_image_2d(GL_TEXTURE_2D, 2, 2, GL_RGBA, &texels);
    assert_eq!(ctx.get_error(), GL_NO_ERROR);

    ctx.color3f(1.0, 1.0, 1.0);
    ctx.begin(GL_QUADS);
    ctx.tex_coord2f(0.0, 0.0);
    ctx.vertex2f(0.0, 0.0);
    ctx.tex_coord2f(1.0, 0.0);
    ctx.vertex2f(16.0, 0.0);
    ctx.tex_coord2f(1.0, 1.0);
    ctx.vertex2f(16.0, 16.0);
    ctx.tex_coord2f(0.0, 1.0);
    ctx.vertex2f(0.0, 16.0);
    ctx.end();
    assert_eq!(ctx.framebuffer.color_at(4, 4), [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(ctx.framebuffer.color_at(12, 4), [0.0, 1.0, 0.0, 1.0]);
    assert_eq!(ctx.framebuffer.color_at(4, 12), [0.0, 0.0, 1.0, 1.0]);

    // same layout, new pixels: the fetch op reads the fresh bytes
    let solid: Vec<u8> = std::iter::repeat([0u8, 255, 255, 255])
        .take(4)
        .flatten()
        .collect();
    ctx.tex_image_2d(GL_TEXTURE_2D, 2, 2, GL_RGBA, &solid);
    ctx.begin(GL_QUADS);
    ctx.tex_coord2f(0.0, 0.0);
    ctx.vertex2f(0.0, 0.0);
    ctx.tex_coord2f(1.0, 0.0);
    ctx.vertex2f(16.0, 0.0);
    ctx.tex_coord2f(1.0, 1.0);
    ctx.vertex2f(16.0, 16.0);
    ctx.tex_coord2f(0.0, 1.0);
    ctx.vertex2f(0.0, 16.0);
    ctx.end();
    assert_eq!(ctx.framebuffer.color_at(4, 4), [0.0, 1.0, 1.0, 1.0]);
}

#[test]
fn viewport_confines_the_window_mapping() {
    let mut ctx = GlContext::new(16, 16);
    ctx.viewport(0, 0, 8, 8);
    fullscreen_triangle(&mut ctx, 0.0, [1.0, 1.0, 1.0]);
    assert_eq!(ctx.framebuffer.color_at(4, 4)[0], 1.0);
    // the mapped triangle reaches past x = 8, the viewport cuts it off
    assert_eq!(ctx.framebuffer.color_at(11, 4)[0], 0.0);
    assert_eq!(ctx.framebuffer.color_at(12, 12)[0], 0.0);
}

#[test]
fn display_list_replays_an_array_draw() {
    let mut ctx = ortho_ctx(16, 16);
    let verts: Vec<u8> = [1.0f32, 1.0, 15.0, 1.0, 8.0, 15.0]
        .iter()
        .flat_map(|f| f.to_ne_bytes())
        .collect();
    ctx.enable_client_state(GL_VERTEX_ARRAY);
    ctx.vertex_pointer(2, GL_FLOAT, 0, &verts);
    ctx.color3f(1.0, 1.0, 0.0);

    let id = ctx.gen_lists(1);
    ctx.new_list(id, GL_COMPILE);
    ctx.draw_arrays(GL_TRIANGLES, 0, 3);
    ctx.end_list();
    assert_eq!(ctx.framebuffer.color_at(8, 4)[0], 0.0);
    ctx.call_list(id);
    assert_eq!(ctx.framebuffer.color_at(8, 4), [1.0, 1.0, 0.0, 1.0]);
}

#[test]
fn begin_end_misuse_reports_invalid_operation_once() {
    let mut ctx = GlContext::new(8, 8);
    ctx.end();
    ctx.begin(GL_POINTS);
    ctx.begin(GL_LINES);
    ctx.end();
    // first error wins, read clears, the run still closed cleanly
    assert_eq!(ctx.get_error(), GL_INVALID_OPERATION);
    assert_eq!(ctx.get_error(), GL_NO_ERROR);
    assert!(!ctx.is_enabled(GL_DEPTH_TEST));
}

#[test]
fn scissor_limits_a_clear_draw_sequence() {
    let mut ctx = GlContext::new(16, 16);
    ctx.enable(GL_SCISSOR_TEST);
    ctx.scissor(0, 0, 8, 16);
    fullscreen_triangle(&mut ctx, 0.0, [1.0, 1.0, 1.0]);
    assert_eq!(ctx.framebuffer.color_at(4, 8)[0], 1.0);
    assert_eq!(ctx.framebuffer.color_at(12, 8)[0], 0.0);
}
