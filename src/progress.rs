// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Progress reporting and cooperative cancellation
//!
//! Long-running reductions tick a per-run context instead of a global
//! counter, so concurrent pipeline runs keep isolated counters and
//! cancellation tokens. The hook returns `true` to continue and `false` to
//! request cancellation; [`Cancelled`] then unwinds through every pipeline
//! component untouched.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

/// Raised from a progress tick when the run should stop. The pipeline never
/// swallows this: it propagates to the caller so an aborted render leaves no
/// half-updated state behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Hook invoked on every tick with the running step counter and a short
/// description of the current stage.
pub type ProgressHook = Box<dyn Fn(u64, &str) -> bool + Send + Sync>;

/// Per-run progress state: a monotonically increasing step counter (which
/// also hands out the combiner's queue ordering marks), a cancellation
/// token, and an optional reporting hook.
#[derive(Default)]
pub struct ProgressContext {
    steps: AtomicU64,
    cancelled: AtomicBool,
    hook: Option<ProgressHook>,
}

impl ProgressContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: ProgressHook) -> Self {
        Self {
            steps: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            hook: Some(hook),
        }
    }

    /// Request cancellation from outside the run (e.g. a UI thread).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Number of steps ticked so far.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    /// Hand out the next ordering mark. Marks increase over the lifetime of
    /// the run, giving the combiner a stable tie-break between solids of
    /// equal complexity.
    pub fn next_mark(&self) -> u64 {
        self.steps.fetch_add(1, Ordering::Relaxed)
    }

    /// The single cooperative suspension point of the pipeline: advance the
    /// counter, invoke the hook, and surface any cancellation request.
    pub fn tick(&self, stage: &str) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        let step = self.steps.fetch_add(1, Ordering::Relaxed);
        if let Some(hook) = &self.hook {
            if !hook(step, stage) {
                self.cancel();
                return Err(Cancelled);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProgressContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressContext")
            .field("steps", &self.steps())
            .field("cancelled", &self.is_cancelled())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn test_tick_advances_and_reports() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let ctx = ProgressContext::with_hook(Box::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        }));

        assert!(ctx.tick("stage").is_ok());
        assert!(ctx.tick("stage").is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.steps(), 2);
    }

    #[test]
    fn test_hook_refusal_cancels() {
        let ctx = ProgressContext::with_hook(Box::new(|step, _| step < 3));

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(ctx.tick("stage"));
        }
        assert!(outcomes[..3].iter().all(Result::is_ok));
        assert_eq!(outcomes[3], Err(Cancelled));
        // Once cancelled, every later tick refuses without calling the hook.
        assert_eq!(outcomes[4], Err(Cancelled));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_external_cancel() {
        let ctx = ProgressContext::new();
        assert!(ctx.tick("stage").is_ok());
        ctx.cancel();
        assert_eq!(ctx.tick("stage"), Err(Cancelled));
    }

    #[test]
    fn test_marks_are_strictly_increasing() {
        let ctx = ProgressContext::new();
        let a = ctx.next_mark();
        let b = ctx.next_mark();
        assert!(b > a);
    }
}
