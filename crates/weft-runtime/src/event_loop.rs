//! Single-threaded event loop
//!
//! Each `SingleThreadEventLoop` owns one OS thread that pops tasks from a
//! lock-free FIFO queue and runs them one at a time. Producers on any
//! thread push and unpark; the loop parks when its queue is empty.
//!
//! # Lifecycle
//!
//! ```text
//!  STARTED ──shutdown_gracefully──▶ SHUTTING_DOWN ──quiet/timeout──▶ SHUTDOWN ──drain──▶ TERMINATED
//!  (accepts tasks)                  (accepts tasks)                  (rejects)           (promise done)
//! ```
//!
//! While shutting down the loop keeps running tasks. It stops once no task
//! has run for the quiet period, or once the timeout has passed since the
//! shutdown request, whichever comes first.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use tracing::{debug, trace, warn};

use weft_core::error::{ExecutorError, ExecutorResult};
use weft_core::executor::{EventExecutor, Task};
use weft_core::promise::Promise;

use crate::parking::{new_parker, LoopParker};
use crate::thread_factory::ThreadFactory;

const ST_STARTED: u8 = 1;
const ST_SHUTTING_DOWN: u8 = 2;
const ST_SHUTDOWN: u8 = 3;
const ST_TERMINATED: u8 = 4;

/// Longest single sleep while waiting out the quiet period
const QUIET_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct ShutdownParams {
    quiet_period: Duration,
    timeout: Duration,
}

/// State shared between the handle and the loop thread
struct LoopInner {
    tasks: SegQueue<Task>,
    state: AtomicU8,
    /// Callers of `execute` between their state check and their push
    submitters: AtomicUsize,
    parker: Box<dyn LoopParker>,
    park_timeout: Duration,
    thread_id: OnceLock<ThreadId>,
    /// Written once, by the caller that moves the loop to SHUTTING_DOWN
    shutdown: Mutex<Option<ShutdownParams>>,
    termination: Promise,
}

impl LoopInner {
    #[inline]
    fn state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }

    fn shutdown_params(&self) -> ShutdownParams {
        let params = *self.shutdown.lock().unwrap_or_else(|e| e.into_inner());
        params.unwrap_or(ShutdownParams {
            quiet_period: Duration::ZERO,
            timeout: Duration::ZERO,
        })
    }

    /// Run the tasks queued at entry. Returns whether at least one task ran.
    ///
    /// Tasks submitted while draining wait for the next call, so a busy
    /// producer cannot keep the loop from observing a shutdown request.
    fn run_all_tasks(&self) -> bool {
        let budget = self.tasks.len();
        let mut ran = 0;
        while ran < budget {
            let Some(task) = self.tasks.pop() else { break };
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                warn!("a task raised a panic; the event loop keeps running");
            }
            ran += 1;
        }
        ran > 0
    }

    fn drain_remaining(&self) {
        while self.run_all_tasks() {}
    }

    /// Decide whether a shutting-down loop may stop now
    fn confirm_shutdown(&self, started: Instant, last_execution: &mut Instant) -> bool {
        let params = self.shutdown_params();

        if started.elapsed() > params.timeout {
            return true;
        }

        if self.run_all_tasks() {
            *last_execution = Instant::now();
            // keep looping until the queue has been quiet long enough
            return params.quiet_period.is_zero();
        }

        let idle = last_execution.elapsed();
        if idle <= params.quiet_period {
            let left = (params.quiet_period - idle).min(QUIET_POLL);
            self.parker.park(left.max(Duration::from_millis(1)));
            return false;
        }

        true
    }

    fn run(&self) {
        let _ = self.thread_id.set(thread::current().id());
        debug!(thread = ?thread::current().name(), "event loop started");

        let mut last_execution = Instant::now();
        let mut shutdown_started: Option<Instant> = None;

        loop {
            if self.run_all_tasks() {
                last_execution = Instant::now();
            }

            if self.state() >= ST_SHUTTING_DOWN {
                let started = *shutdown_started.get_or_insert_with(|| {
                    // quiet period counts from the request at the earliest
                    last_execution = Instant::now();
                    last_execution
                });
                if self.confirm_shutdown(started, &mut last_execution) {
                    break;
                }
                continue;
            }

            if self.tasks.is_empty() {
                self.parker.park(self.park_timeout);
            }
        }

        // SeqCst pairs with `execute`: a submitter either sees SHUTDOWN and
        // backs off, or is counted here and its push lands before the drain
        self.state.store(ST_SHUTDOWN, Ordering::SeqCst);
        while self.submitters.load(Ordering::SeqCst) != 0 {
            thread::yield_now();
        }
        self.drain_remaining();
        debug_assert!(self.tasks.is_empty());
        self.state.store(ST_TERMINATED, Ordering::Release);

        debug!(thread = ?thread::current().name(), "event loop terminated");
        self.termination.try_complete();
    }
}

/// An `EventExecutor` backed by one dedicated OS thread
pub struct SingleThreadEventLoop {
    inner: Arc<LoopInner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SingleThreadEventLoop {
    /// Spawn the loop thread through `factory`.
    ///
    /// An idle loop wakes at least every `park_timeout` to re-check its state.
    pub fn new(factory: &ThreadFactory, park_timeout: Duration) -> ExecutorResult<Self> {
        let inner = Arc::new(LoopInner {
            tasks: SegQueue::new(),
            state: AtomicU8::new(ST_STARTED),
            submitters: AtomicUsize::new(0),
            parker: new_parker(),
            park_timeout,
            thread_id: OnceLock::new(),
            shutdown: Mutex::new(None),
            termination: Promise::new(),
        });

        let loop_inner = Arc::clone(&inner);
        let handle = factory.new_thread(move || loop_inner.run())?;

        Ok(Self {
            inner,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Number of tasks waiting to run (hint, may be stale)
    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.len()
    }

    fn join_thread(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("event loop thread panicked");
            }
        }
    }
}

impl EventExecutor for SingleThreadEventLoop {
    fn execute(&self, task: Task) -> ExecutorResult<()> {
        let inner = &self.inner;
        inner.submitters.fetch_add(1, Ordering::SeqCst);
        if inner.state.load(Ordering::SeqCst) >= ST_SHUTDOWN {
            inner.submitters.fetch_sub(1, Ordering::SeqCst);
            trace!("task rejected, event loop is shut down");
            return Err(ExecutorError::Rejected);
        }
        inner.tasks.push(task);
        inner.submitters.fetch_sub(1, Ordering::SeqCst);
        if !self.in_event_loop() {
            self.inner.parker.unpark();
        }
        Ok(())
    }

    #[inline]
    fn in_event_loop(&self) -> bool {
        self.inner.thread_id.get() == Some(&thread::current().id())
    }

    fn shutdown_gracefully(&self, quiet_period: Duration, timeout: Duration) -> Promise {
        {
            let mut params = self.inner.shutdown.lock().unwrap_or_else(|e| e.into_inner());
            // only the loop thread moves past SHUTTING_DOWN, and only after
            // this store, so holding the lock is enough to make this first-wins
            if self.inner.state() < ST_SHUTTING_DOWN {
                *params = Some(ShutdownParams {
                    quiet_period: quiet_period.min(timeout),
                    timeout,
                });
                self.inner.state.store(ST_SHUTTING_DOWN, Ordering::Release);
            }
        }
        self.inner.parker.unpark();
        self.inner.termination.clone()
    }

    fn is_shutting_down(&self) -> bool {
        self.inner.state() >= ST_SHUTTING_DOWN
    }

    fn is_shutdown(&self) -> bool {
        self.inner.state() >= ST_SHUTDOWN
    }

    fn is_terminated(&self) -> bool {
        self.inner.state() == ST_TERMINATED
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        if self.in_event_loop() {
            // waiting on ourselves can never succeed
            return self.is_terminated();
        }
        if self.inner.termination.wait_timeout(timeout) {
            self.join_thread();
        }
        self.is_terminated()
    }

    fn termination_future(&self) -> Promise {
        self.inner.termination.clone()
    }
}

impl Drop for SingleThreadEventLoop {
    fn drop(&mut self) {
        // the thread holds its own Arc; without this it would never exit
        if !self.is_shutting_down() {
            self.shutdown_gracefully(Duration::ZERO, Duration::ZERO);
        }
    }
}

impl std::fmt::Debug for SingleThreadEventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleThreadEventLoop")
            .field("state", &self.inner.state())
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::mpsc;
    use weft_core::executor::EventExecutorExt;

    const LONG: Duration = Duration::from_secs(10);

    fn new_loop() -> SingleThreadEventLoop {
        let factory = ThreadFactory::new("test-loop", 0);
        SingleThreadEventLoop::new(&factory, Duration::from_millis(20)).unwrap()
    }

    #[test]
    fn test_tasks_run_in_submission_order() {
        let el = new_loop();
        let (tx, rx) = mpsc::channel();

        for i in 0..1000 {
            let tx = tx.clone();
            el.spawn(move || tx.send(i).unwrap()).unwrap();
        }
        drop(tx);

        let seen: Vec<i32> = rx.iter().collect();
        assert_eq!(seen, (0..1000).collect::<Vec<_>>());

        el.shutdown_gracefully(Duration::ZERO, LONG);
        assert!(el.await_termination(LONG));
    }

    #[test]
    fn test_tasks_never_overlap() {
        let el = Arc::new(new_loop());
        let running = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let el = Arc::clone(&el);
                let running = Arc::clone(&running);
                let overlaps = Arc::clone(&overlaps);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    for _ in 0..250 {
                        let running = Arc::clone(&running);
                        let overlaps = Arc::clone(&overlaps);
                        let done = Arc::clone(&done);
                        el.spawn(move || {
                            if running.swap(true, Ordering::SeqCst) {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            std::hint::spin_loop();
                            running.store(false, Ordering::SeqCst);
                            done.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        el.shutdown_gracefully(Duration::ZERO, LONG);
        assert!(el.await_termination(LONG));
        assert_eq!(done.load(Ordering::SeqCst), 1000);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_in_event_loop() {
        let el = Arc::new(new_loop());
        assert!(!el.in_event_loop());

        let (tx, rx) = mpsc::channel();
        let el2 = Arc::clone(&el);
        el.spawn(move || tx.send(el2.in_event_loop()).unwrap()).unwrap();
        assert!(rx.recv_timeout(LONG).unwrap());

        el.shutdown_gracefully(Duration::ZERO, LONG);
        assert!(el.await_termination(LONG));
    }

    #[test]
    fn test_lifecycle_states() {
        let el = new_loop();
        assert!(!el.is_shutting_down());
        assert!(!el.is_shutdown());
        assert!(!el.is_terminated());

        let f1 = el.shutdown_gracefully(Duration::ZERO, LONG);
        assert!(el.is_shutting_down());

        // idempotent, same promise
        let f2 = el.shutdown_gracefully(Duration::from_secs(1), LONG);
        assert!(f1.ptr_eq(&f2));
        assert!(f1.ptr_eq(&el.termination_future()));

        assert!(f1.wait_timeout(LONG));
        assert!(el.await_termination(LONG));
        assert!(el.is_shutdown());
        assert!(el.is_terminated());
    }

    #[test]
    fn test_rejects_after_termination() {
        let el = new_loop();
        el.shutdown_gracefully(Duration::ZERO, LONG);
        assert!(el.await_termination(LONG));

        let err = el.spawn(|| {}).unwrap_err();
        assert!(matches!(err, ExecutorError::Rejected));
    }

    #[test]
    fn test_quiet_period_accepts_late_tasks() {
        let el = new_loop();
        el.shutdown_gracefully(Duration::from_millis(300), LONG);

        thread::sleep(Duration::from_millis(50));
        let (tx, rx) = mpsc::channel();
        el.spawn(move || tx.send(()).unwrap()).unwrap();

        assert!(rx.recv_timeout(LONG).is_ok());
        assert!(el.await_termination(LONG));
    }

    #[test]
    fn test_timeout_bounds_shutdown_under_load() {
        let el = Arc::new(new_loop());
        let stop = Arc::new(AtomicBool::new(false));

        // keep feeding tasks so the quiet period never elapses
        let feeder = {
            let el = Arc::clone(&el);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    if el.spawn(|| thread::sleep(Duration::from_millis(1))).is_err() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        let start = Instant::now();
        el.shutdown_gracefully(Duration::from_secs(5), Duration::from_millis(200));
        assert!(el.await_termination(LONG));
        assert!(start.elapsed() < Duration::from_secs(5));

        stop.store(true, Ordering::SeqCst);
        feeder.join().unwrap();
    }

    #[test]
    fn test_panicking_task_does_not_kill_loop() {
        let el = new_loop();
        el.spawn(|| panic!("task failure")).unwrap();

        let (tx, rx) = mpsc::channel();
        el.spawn(move || tx.send(7).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(LONG).unwrap(), 7);

        el.shutdown_gracefully(Duration::ZERO, LONG);
        assert!(el.await_termination(LONG));
    }

    #[test]
    fn test_accepted_tasks_always_run_across_shutdown() {
        for _ in 0..200 {
            let el = Arc::new(new_loop());
            let ran = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(std::sync::Barrier::new(5));

            let producers: Vec<_> = (0..4)
                .map(|_| {
                    let el = Arc::clone(&el);
                    let ran = Arc::clone(&ran);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        let mut accepted = 0usize;
                        loop {
                            let ran = Arc::clone(&ran);
                            let res = el.spawn(move || {
                                ran.fetch_add(1, Ordering::SeqCst);
                            });
                            if res.is_err() {
                                return accepted;
                            }
                            accepted += 1;
                        }
                    })
                })
                .collect();

            barrier.wait();
            el.shutdown_gracefully(Duration::ZERO, LONG);
            assert!(el.await_termination(LONG));

            let accepted: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
            assert_eq!(accepted, ran.load(Ordering::SeqCst));
        }
    }

    #[test]
    fn test_termination_listener_fires_once() {
        let el = new_loop();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        el.termination_future().add_listener(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        el.shutdown_gracefully(Duration::ZERO, LONG);
        el.shutdown_gracefully(Duration::ZERO, LONG);
        assert!(el.await_termination(LONG));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_await_from_own_thread_returns() {
        let el = Arc::new(new_loop());
        let (tx, rx) = mpsc::channel();
        let el2 = Arc::clone(&el);
        el.spawn(move || tx.send(el2.await_termination(LONG)).unwrap()).unwrap();

        assert!(!rx.recv_timeout(LONG).unwrap());
        el.shutdown_gracefully(Duration::ZERO, LONG);
        assert!(el.await_termination(LONG));
    }
}
