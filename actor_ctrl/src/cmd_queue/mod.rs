//! # Command queues
//!
//! Incoming messages are not applied to the controller on the transport's delivery thread.
//! Instead each command topic gets its own [`CmdQueue`], the subscription callback pushes into the
//! queue and a [`QueueWorker`] thread drains it, applying each command to the shared target
//! state.
//!
//! The worker blocks on the queue for at most a fixed timeout before checking whether it has been
//! asked to stop, so shutting a worker down never waits on a command that will not arrive.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, trace};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A FIFO queue of commands shared between a producer (the transport) and one worker.
pub struct CmdQueue<T> {
    inner: Mutex<Inner<T>>,
    cond: Condvar,
}

struct Inner<T> {
    items: VecDeque<T>,
    enabled: bool,
}

/// A background thread draining a [`CmdQueue`].
pub struct QueueWorker<T> {
    name: String,
    queue: Arc<CmdQueue<T>>,
    jh: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CmdQueueError {
    #[error("The queue has been disabled")]
    Disabled,

    #[error("The queue's mutex is poisoned")]
    PoisonError,

    #[error("Could not spawn the queue worker thread: {0}")]
    SpawnError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T> CmdQueue<T> {
    /// Create a new, enabled, empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                enabled: true,
            }),
            cond: Condvar::new(),
        }
    }

    /// Push a command onto the back of the queue.
    ///
    /// Returns `false` if the command was dropped because the queue is disabled.
    pub fn push(&self, item: T) -> bool {
        let mut inner = match self.inner.lock() {
            Ok(i) => i,
            Err(_) => return false,
        };

        if !inner.enabled {
            return false;
        }

        inner.items.push_back(item);
        self.cond.notify_one();

        true
    }

    /// Wait up to `timeout` for commands to be available, then pass every available command to
    /// `handler` in arrival order.
    ///
    /// The queue is not locked while `handler` runs. Returns the number of commands handled, which
    /// is zero if the timeout elapsed with nothing queued.
    pub fn drain<F>(&self, timeout: Duration, mut handler: F) -> Result<usize, CmdQueueError>
    where
        F: FnMut(T),
    {
        let batch = {
            let inner = self.inner.lock().map_err(|_| CmdQueueError::PoisonError)?;

            let (mut inner, _) = self
                .cond
                .wait_timeout_while(inner, timeout, |i| i.enabled && i.items.is_empty())
                .map_err(|_| CmdQueueError::PoisonError)?;

            if !inner.enabled {
                return Err(CmdQueueError::Disabled);
            }

            std::mem::take(&mut inner.items)
        };

        let num = batch.len();
        for item in batch {
            handler(item);
        }

        Ok(num)
    }

    /// Disable the queue, dropping any pending commands and waking any waiting worker.
    ///
    /// Once disabled all pushes are rejected and all drains return [`CmdQueueError::Disabled`].
    pub fn disable(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.enabled = false;
            inner.items.clear();
        }
        self.cond.notify_all();
    }

    /// Remove all pending commands.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.items.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self.inner.lock() {
            Ok(i) => i.enabled,
            Err(_) => false,
        }
    }

    /// Number of commands waiting in the queue.
    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(i) => i.items.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for CmdQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> QueueWorker<T> {
    /// Start a worker thread which drains `queue`, calling `handler` for each command.
    ///
    /// The worker wakes at least every `timeout` and exits once the queue is disabled.
    pub fn spawn<F>(
        name: &str,
        queue: Arc<CmdQueue<T>>,
        timeout: Duration,
        mut handler: F,
    ) -> Result<Self, CmdQueueError>
    where
        F: FnMut(T) + Send + 'static,
    {
        let worker_queue = queue.clone();
        let thread_name = String::from(name);

        let jh = thread::Builder::new()
            .name(format!("cmd_queue::{}", name))
            .spawn(move || {
                loop {
                    match worker_queue.drain(timeout, &mut handler) {
                        Ok(0) => (),
                        Ok(n) => trace!("{} worker handled {} command(s)", thread_name, n),
                        Err(CmdQueueError::Disabled) => break,
                        Err(e) => {
                            error!("{} worker stopping: {}", thread_name, e);
                            break;
                        }
                    }
                }

                debug!("{} worker stopped", thread_name);
            })
            .map_err(CmdQueueError::SpawnError)?;

        Ok(Self {
            name: String::from(name),
            queue,
            jh: Some(jh),
        })
    }
}

impl<T> QueueWorker<T> {
    /// The queue this worker drains.
    pub fn queue(&self) -> &Arc<CmdQueue<T>> {
        &self.queue
    }

    /// Returns `true` until the worker has been shut down.
    pub fn is_running(&self) -> bool {
        self.jh.is_some()
    }

    /// Stop the worker, discarding any commands it has not yet handled, and wait for its thread
    /// to exit.
    ///
    /// Calling this more than once has no further effect.
    pub fn shutdown(&mut self) {
        if let Some(jh) = self.jh.take() {
            self.queue.disable();

            if jh.join().is_err() {
                error!("{} worker panicked", self.name);
            }
        }
    }
}

impl<T> Drop for QueueWorker<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_drain_in_order() {
        let q = CmdQueue::new();
        assert!(q.push(1));
        assert!(q.push(2));
        assert!(q.push(3));
        assert_eq!(q.len(), 3);

        let mut seen = Vec::new();
        let n = q.drain(Duration::from_millis(10), |i| seen.push(i)).unwrap();

        assert_eq!(n, 3);
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_drain_times_out() {
        let q: CmdQueue<u8> = CmdQueue::new();

        let start = Instant::now();
        let n = q.drain(Duration::from_millis(10), |_| ()).unwrap();

        assert_eq!(n, 0);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_disabled_queue() {
        let q = CmdQueue::new();
        q.push(1);
        q.disable();

        assert!(!q.is_enabled());
        assert!(!q.push(2));
        assert!(q.is_empty());
        assert!(matches!(
            q.drain(Duration::from_millis(10), |_: i32| ()),
            Err(CmdQueueError::Disabled)
        ));
    }

    #[test]
    fn test_worker_handles_and_stops() {
        let q = Arc::new(CmdQueue::<i32>::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_w = seen.clone();
        let mut worker = QueueWorker::spawn("test", q.clone(), Duration::from_millis(5), move |i| {
            seen_w.lock().unwrap().push(i)
        })
        .unwrap();

        q.push(10);
        q.push(11);

        let start = Instant::now();
        while seen.lock().unwrap().len() < 2 && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(*seen.lock().unwrap(), vec![10, 11]);

        worker.shutdown();
        assert!(!worker.is_running());
        assert!(!q.push(12));

        // Second shutdown is a no-op
        worker.shutdown();
    }
}
