//! Display lists.
//!
//! Only array-mode draws are recordable; a list is a replayable command
//! tape. Recording in COMPILE mode suppresses execution, COMPILE_AND_EXECUTE
//! draws while it records. Replay goes through the non-recording draw path,
//! so a list can be called while another one is being recorded.

use std::collections::HashMap;

use log::debug;

use crate::state::GlContext;
use crate::types::*;

#[derive(Clone)]
pub(crate) enum ListCmd {
    Draw {
        mode: GLenum,
        first: i32,
        count: i32,
    },
}

#[derive(Clone, Default)]
pub(crate) struct DisplayList {
    pub cmds: Vec<ListCmd>,
}

/// Handle table plus the in-progress recording, if any.
pub(crate) struct ListStore {
    pub lists: HashMap<GLuint, DisplayList>,
    pub next: GLuint,
    pub base: GLuint,
    pub recording: Option<(GLuint, GLenum, DisplayList)>,
}

impl ListStore {
    pub fn new() -> Self {
        Self {
            lists: HashMap::new(),
            next: 1,
            base: 0,
            recording: None,
        }
    }
}

impl GlContext {
    /// Allocate a contiguous range of list handles; 0 on failure.
    pub fn gen_lists(&mut self, range: i32) -> GLuint {
        if range <= 0 {
            self.set_error(GL_INVALID_VALUE);
            return 0;
        }
        let first = self.lists.next;
        for id in first..first + range as GLuint {
            self.lists.lists.insert(id, DisplayList::default());
        }
        self.lists.next = first + range as GLuint;
        debug!("gen_lists({range}) -> {first}");
        first
    }

    pub fn delete_lists(&mut self, list: GLuint, range: i32) {
        if range < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        for id in list..list + range as GLuint {
            self.lists.lists.remove(&id);
        }
    }

    pub fn is_list(&self, list: GLuint) -> bool {
        self.lists.lists.contains_key(&list)
    }

    pub fn new_list(&mut self, list: GLuint, mode: GLenum) {
        if list == 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        if !matches!(mode, GL_COMPILE | GL_COMPILE_AND_EXECUTE) {
            self.set_error(GL_INVALID_ENUM);
            return;
        }
        if self.lists.recording.is_some() {
            self.set_error(GL_INVALID_OPERATION);
            return;
        }
        self.lists.recording = Some((list, mode, DisplayList::default()));
    }

    pub fn end_list(&mut self) {
        let Some((id, _, list)) = self.lists.recording.take() else {
            self.set_error(GL_INVALID_OPERATION);
            return;
        };
        debug!("end_list: {} commands into list {id}", list.cmds.len());
        self.lists.lists.insert(id, list);
    }

    /// Record a draw if a list is open. Returns true when execution
    /// should be suppressed (COMPILE mode).
    pub(crate) fn record_draw_arrays(&mut self, mode: GLenum, first: i32, count: i32) -> bool {
        match &mut self.lists.recording {
            Some((_, list_mode, list)) => {
                list.cmds.push(ListCmd::Draw { mode, first, count });
                *list_mode == GL_COMPILE
            }
            None => false,
        }
    }

    /// Replay a list. Unknown handles are silently ignored.
    pub fn call_list(&mut self, list: GLuint) {
        let Some(cmds) = self.lists.lists.get(&list).map(|l| l.cmds.clone()) else {
            return;
        };
        for cmd in cmds {
            match cmd {
                ListCmd::Draw { mode, first, count } => self.run_draw_arrays(mode, first, count),
            }
        }
    }

    /// Replay an indexed sequence of lists, each offset by `list_base`.
    pub fn call_lists(&mut self, n: i32, type_: GLenum, lists: &[u8]) {
        if n < 0 {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        let width = match type_ {
            GL_BYTE | GL_UNSIGNED_BYTE => 1,
            GL_SHORT | GL_UNSIGNED_SHORT => 2,
            GL_INT | GL_UNSIGNED_INT => 4,
            _ => {
                self.set_error(GL_INVALID_ENUM);
                return;
            }
        };
        if n as usize * width > lists.len() {
            self.set_error(GL_INVALID_VALUE);
            return;
        }
        let base = self.lists.base;
        for k in 0..n as usize {
            let at = k * width;
            let id = match type_ {
                GL_BYTE => lists[at] as i8 as i32,
                GL_UNSIGNED_BYTE => lists[at] as i32,
                GL_SHORT => i16::from_ne_bytes([lists[at], lists[at + 1]]) as i32,
                GL_UNSIGNED_SHORT => u16::from_ne_bytes([lists[at], lists[at + 1]]) as i32,
                _ => i32::from_ne_bytes([
                    lists[at],
                    lists[at + 1],
                    lists[at + 2],
                    lists[at + 3],
                ]),
            };
            self.call_list(base.wrapping_add(id as GLuint));
        }
    }

    pub fn list_base(&mut self, base: GLuint) {
        self.lists.base = base;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_ne_bytes()).collect()
    }

    fn point_ctx() -> GlContext {
        let mut ctx = GlContext::new(16, 16);
        ctx.matrix_mode(GL_PROJECTION);
        ctx.ortho(0.0, 16.0, 0.0, 16.0, -1.0, 1.0);
        ctx.matrix_mode(GL_MODELVIEW);
        let verts = as_bytes(&[4.5, 4.5]);
        ctx.enable_client_state(GL_VERTEX_ARRAY);
        ctx.vertex_pointer(2, GL_FLOAT, 0, &verts);
        ctx.color3f(1.0, 1.0, 1.0);
        ctx
    }

    #[test]
    fn gen_lists_allocates_contiguous_handles() {
        let mut ctx = GlContext::new(4, 4);
        let first = ctx.gen_lists(3);
        assert!(first > 0);
        assert!(ctx.is_list(first));
        assert!(ctx.is_list(first + 2));
        assert!(!ctx.is_list(first + 3));
        let second = ctx.gen_lists(1);
        assert_eq!(second, first + 3);
    }

    #[test]
    fn gen_lists_rejects_non_positive_range() {
        let mut ctx = GlContext::new(4, 4);
        assert_eq!(ctx.gen_lists(0), 0);
        assert_eq!(ctx.get_error(), GL_INVALID_VALUE);
    }

    #[test]
    fn compile_mode_records_without_executing() {
        let mut ctx = point_ctx();
        let id = ctx.gen_lists(1);
        ctx.new_list(id, GL_COMPILE);
        ctx.draw_arrays(GL_POINTS, 0, 1);
        ctx.end_list();
        assert_eq!(ctx.framebuffer.color_at(4, 4)[0], 0.0);
        ctx.call_list(id);
        assert_eq!(ctx.framebuffer.color_at(4, 4)[0], 1.0);
    }

    #[test]
    fn compile_and_execute_draws_while_recording() {
        let mut ctx = point_ctx();
        let id = ctx.gen_lists(1);
        ctx.new_list(id, GL_COMPILE_AND_EXECUTE);
        ctx.draw_arrays(GL_POINTS, 0, 1);
        ctx.end_list();
        assert_eq!(ctx.framebuffer.color_at(4, 4)[0], 1.0);
    }

    #[test]
    fn call_lists_applies_the_base_offset() {
        let mut ctx = point_ctx();
        let id = ctx.gen_lists(2);
        ctx.new_list(id + 1, GL_COMPILE);
        ctx.draw_arrays(GL_POINTS, 0, 1);
        ctx.end_list();
        ctx.list_base(id);
        ctx.call_lists(1, GL_UNSIGNED_BYTE, &[1]);
        assert_eq!(ctx.framebuffer.color_at(4, 4)[0], 1.0);
    }

    #[test]
    fn nested_recording_is_invalid_operation() {
        let mut ctx = GlContext::new(4, 4);
        let id = ctx.gen_lists(2);
        ctx.new_list(id, GL_COMPILE);
        ctx.new_list(id + 1, GL_COMPILE);
        assert_eq!(ctx.get_error(), GL_INVALID_OPERATION);
        ctx.end_list();
        assert_eq!(ctx.get_error(), GL_NO_ERROR);
    }

    #[test]
    fn end_list_without_new_list_is_invalid_operation() {
        let mut ctx = GlContext::new(4, 4);
        ctx.end_list();
        assert_eq!(ctx.get_error(), GL_INVALID_OPERATION);
    }

    #[test]
    fn delete_lists_frees_handles() {
        let mut ctx = GlContext::new(4, 4);
        let id = ctx.gen_lists(2);
        ctx.delete_lists(id, 2);
        assert!(!ctx.is_list(id));
        assert!(!ctx.is_list(id + 1));
        // calling a deleted list is a silent no-op
        ctx.call_list(id);
        assert_eq!(ctx.get_error(), GL_NO_ERROR);
    }
}
