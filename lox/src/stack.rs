//! Native stack growth for the evaluator.
//!
//! One Lox call costs several host frames (`evaluate`, `execute`, block
//! scopes). Recursive entry points run through [`ensure_sufficient_stack`],
//! which switches to a fresh segment when the current one runs low.

/// Grow when less than this remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const SEGMENT_SIZE: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
