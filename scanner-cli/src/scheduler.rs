//! Fixed-interval frame scheduler on a tokio `LocalSet`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use scanner_core::{FrameHandle, FrameScheduler, FrameTask};
use tokio::task::JoinHandle;

/// Runs each frame task after a fixed delay, standing in for the display
/// refresh. Must be used from within a [`tokio::task::LocalSet`].
#[derive(Debug)]
pub struct TokioFrameScheduler {
    interval: Duration,
    next: Cell<u64>,
    pending: Rc<RefCell<HashMap<u64, JoinHandle<()>>>>,
}

impl TokioFrameScheduler {
    /// Create a scheduler ticking every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Cell::new(0),
            pending: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Number of queued frames.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl FrameScheduler for TokioFrameScheduler {
    fn request_frame(&self, task: FrameTask) -> FrameHandle {
        let id = self.next.get();
        self.next.set(id.wrapping_add(1));

        let interval = self.interval;
        let pending = Rc::clone(&self.pending);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(interval).await;
            pending.borrow_mut().remove(&id);
            task();
        });
        self.pending.borrow_mut().insert(id, handle);
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let task = self.pending.borrow_mut().remove(&handle.0);
        if let Some(task) = task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    #[tokio::test]
    async fn frames_run_after_interval() {
        LocalSet::new()
            .run_until(async {
                let scheduler = TokioFrameScheduler::new(Duration::from_millis(1));
                let ran = Rc::new(Cell::new(0));
                let counter = Rc::clone(&ran);
                scheduler.request_frame(Box::new(move || counter.set(counter.get() + 1)));
                assert_eq!(scheduler.pending(), 1);

                tokio::time::sleep(Duration::from_millis(20)).await;
                assert_eq!(ran.get(), 1);
                assert_eq!(scheduler.pending(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn cancelled_frames_never_run() {
        LocalSet::new()
            .run_until(async {
                let scheduler = TokioFrameScheduler::new(Duration::from_millis(5));
                let ran = Rc::new(Cell::new(false));
                let flag = Rc::clone(&ran);
                let handle = scheduler.request_frame(Box::new(move || flag.set(true)));

                scheduler.cancel_frame(handle);
                scheduler.cancel_frame(handle);
                tokio::time::sleep(Duration::from_millis(30)).await;

                assert!(!ran.get());
                assert_eq!(scheduler.pending(), 0);
            })
            .await;
    }
}
