//! Single-threaded frame loop.
//!
//! Stands in for the browser event loop: local futures (the identity
//! handshake) are polled until they stall, then the callbacks posted for the
//! "next frame" run in post order.
//!
//! # Invariants
//!
//! - A callback never runs inside the call that posted it
//! - Callbacks posted while a frame is running wait for the following frame
//! - Within a frame, callbacks run in post order

use std::{cell::RefCell, collections::VecDeque, future::Future, pin::pin, rc::Rc};

use futures::{
    FutureExt,
    executor::{LocalPool, LocalSpawner},
    future::LocalBoxFuture,
    task::LocalSpawnExt,
};

/// Callback deferred to the next frame.
pub type Task = Box<dyn FnOnce()>;

/// Cloneable handle for scheduling work on a [`FrameLoop`].
#[derive(Clone)]
pub struct FrameHandle {
    spawner: LocalSpawner,
    callbacks: Rc<RefCell<VecDeque<Task>>>,
}

impl FrameHandle {
    /// Queue a callback for the next frame.
    pub fn post(&self, task: Task) {
        self.callbacks.borrow_mut().push_back(task);
    }

    /// Spawn a local future. It is first polled by the next frame.
    pub fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        if let Err(e) = self.spawner.spawn_local(future) {
            // Only happens once the owning FrameLoop has been dropped.
            tracing::error!("frame loop rejected spawned future: {}", e);
        }
    }

    /// Number of callbacks waiting for the next frame.
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.borrow().len()
    }
}

impl std::fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHandle").field("pending_callbacks", &self.pending_callbacks()).finish()
    }
}

/// Owner of the local executor and the next-frame callback queue.
pub struct FrameLoop {
    pool: LocalPool,
    handle: FrameHandle,
}

impl FrameLoop {
    /// Create an empty frame loop.
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let handle = FrameHandle { spawner: pool.spawner(), callbacks: Rc::default() };
        Self { pool, handle }
    }

    /// Handle for posting callbacks and spawning futures.
    pub fn handle(&self) -> FrameHandle {
        self.handle.clone()
    }

    /// Number of callbacks waiting for the next frame.
    pub fn pending_callbacks(&self) -> usize {
        self.handle.pending_callbacks()
    }

    /// Poll spawned futures until none can make progress. Runs no callbacks.
    pub fn poll_tasks(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Run one frame.
    ///
    /// Polls spawned futures until stalled, then runs every callback that was
    /// queued at that point. Returns the number of callbacks run.
    pub fn run_frame(&mut self) -> usize {
        self.pool.run_until_stalled();

        let due = std::mem::take(&mut *self.handle.callbacks.borrow_mut());
        let count = due.len();
        for task in due {
            task();
        }

        count
    }

    /// Run frames until no future can progress and no callback is queued.
    ///
    /// Does not return if callbacks keep re-posting themselves.
    pub fn run_until_idle(&mut self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_frame();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }

    /// Drive `future` to completion, running frames in between polls.
    ///
    /// Returns `None` if the future is still pending once the loop is idle,
    /// i.e. it waits on something outside the loop.
    pub fn block_on<F: Future>(&mut self, future: F) -> Option<F::Output> {
        let mut future = pin!(future);
        loop {
            if let Some(output) = future.as_mut().now_or_never() {
                return Some(output);
            }
            if self.run_frame() == 0 {
                return future.as_mut().now_or_never();
            }
        }
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop").field("pending_callbacks", &self.pending_callbacks()).finish()
    }
}
