//! softgl — software fixed-function rasterizer with per-pixel operation
//! specialization.
//!
//! A GL-1.x-style immediate-mode pipeline rendering into an in-memory
//! framebuffer. The interesting part is the inner loop: the per-pixel
//! fragment write, depth test, and texture fetch are not branchy
//! interpreters but *specialized callables* resolved once per draw from
//! the exact state subset they depend on, cached by key, and optionally
//! produced by an injectable code-generation backend (the state-branching
//! interpreter is the always-correct fallback).
//!
//! # Architecture
//! - State machine in [`state::GlContext`]; every public entry point is a
//!   method on it
//! - Vertex assembly: [`immediate`] (begin/end windowed cursor) and
//!   [`arrays`] (client arrays, indexed draws), replayable via [`lists`]
//! - Transform & shading dispatch: [`matrix`], [`pipeline`]
//! - Scan conversion: [`rasterizer`]
//! - Specialization machinery: [`specialize`] (keys, FNV-1a buckets,
//!   FIFO-bounded cache, [`specialize::CodegenBackend`])

pub mod arrays;
pub mod framebuffer;
pub mod immediate;
pub mod lists;
pub mod matrix;
pub mod pipeline;
pub mod rasterizer;
pub mod specialize;
pub mod state;
pub mod texture;
pub mod types;

use std::cell::RefCell;

pub use framebuffer::Framebuffer;
pub use pipeline::{FragmentStage, Vertex, VertexStage, MAX_VERTEX_ATTRIBS};
pub use specialize::{CodegenBackend, DepthTestKey, FragmentWriteKey, TextureFetchKey};
pub use state::GlContext;

thread_local! {
    static CURRENT: RefCell<Option<GlContext>> = const { RefCell::new(None) };
}

/// Install a context as this thread's current one, returning the one it
/// displaces. There is no process-global: each thread has its own slot.
pub fn make_current(ctx: GlContext) -> Option<GlContext> {
    CURRENT.with(|slot| slot.borrow_mut().replace(ctx))
}

/// Remove and return this thread's current context.
pub fn take_current() -> Option<GlContext> {
    CURRENT.with(|slot| slot.borrow_mut().take())
}

/// Run `f` against the current context. `None` when no context is
/// installed on this thread.
pub fn with_current<R>(f: impl FnOnce(&mut GlContext) -> R) -> Option<R> {
    CURRENT.with(|slot| slot.borrow_mut().as_mut().map(f))
}
