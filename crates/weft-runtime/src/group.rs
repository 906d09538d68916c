//! Fixed-size group of event executors
//!
//! The group creates all of its children up front and never changes the
//! set afterwards. Work is spread over the children by a chooser; each
//! unit of work (usually a connection) calls `next()` once and stays on
//! the returned executor for its whole life.
//!
//! Construction is all-or-nothing: if the k-th child cannot be created,
//! the k-1 children that were created are shut down and awaited before the
//! error is returned.
//!
//! ```text
//!            next()                   termination
//!   caller ─────────▶ chooser          child 0 ─┐
//!                       │              child 1 ─┼─▶ terminated == n ─▶ group promise
//!                       ▼              child 2 ─┘
//!            [ child 0 | child 1 | child 2 ]
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use weft_core::chooser::{ChooserFactory, DefaultChooserFactory, ExecutorChooser};
use weft_core::error::{BoxError, ExecutorError, ExecutorResult};
use weft_core::executor::EventExecutor;
use weft_core::promise::Promise;

use crate::config::{defaults, ConfigError, GroupConfig};
use crate::event_loop::SingleThreadEventLoop;
use crate::thread_factory::ThreadFactory;

/// Per-attempt wait while rolling back a failed construction
const ROLLBACK_WAIT: Duration = Duration::from_secs(60);

/// A group of thread-backed event loops
pub type EventLoopGroup = ExecutorGroup<SingleThreadEventLoop>;

/// Owns `n` executors, picks one per unit of work, and shuts them down together
///
/// Dropping a group that is still running only requests a graceful
/// shutdown; it does not wait. Call `shutdown_gracefully` and
/// `await_termination` (or wait on `termination_future`) before dropping
/// when the children must be gone.
pub struct ExecutorGroup<E: EventExecutor> {
    children: Box<[Arc<E>]>,
    chooser: Box<dyn ExecutorChooser>,
    terminated_children: Arc<AtomicUsize>,
    termination: Promise,
    quiet_period: Duration,
    shutdown_timeout: Duration,
}

impl EventLoopGroup {
    /// Build a group of `config.num_loops` loop threads.
    ///
    /// Threads are named `<pool_name>-<poolId>-<n>`.
    pub fn new(config: GroupConfig) -> ExecutorResult<Self> {
        config.validate().map_err(|e| match e {
            ConfigError::InvalidValue(msg) => ExecutorError::InvalidConfig(msg),
        })?;

        let factory = ThreadFactory::new(&config.pool_name, config.stack_size);
        let park_timeout = config.park_timeout;

        Self::build(
            config.num_loops,
            |_| SingleThreadEventLoop::new(&factory, park_timeout).map_err(BoxError::from),
            &DefaultChooserFactory,
            config.quiet_period,
            config.shutdown_timeout,
        )
    }
}

impl<E: EventExecutor> ExecutorGroup<E> {
    /// Build a group from a child factory.
    ///
    /// `factory` is called with indices `0..n` in order. Uses the library
    /// default quiet period and timeout for rollback and for
    /// `shutdown_gracefully_default`.
    pub fn with_factory<F>(
        n: usize,
        factory: F,
        chooser_factory: &dyn ChooserFactory,
    ) -> ExecutorResult<Self>
    where
        F: FnMut(usize) -> Result<E, BoxError>,
    {
        Self::build(
            n,
            factory,
            chooser_factory,
            Duration::from_millis(defaults::QUIET_PERIOD_MS),
            Duration::from_millis(defaults::SHUTDOWN_TIMEOUT_MS),
        )
    }

    fn build<F>(
        n: usize,
        mut factory: F,
        chooser_factory: &dyn ChooserFactory,
        quiet_period: Duration,
        shutdown_timeout: Duration,
    ) -> ExecutorResult<Self>
    where
        F: FnMut(usize) -> Result<E, BoxError>,
    {
        if n == 0 {
            return Err(ExecutorError::InvalidConfig("number of executors must be > 0"));
        }

        let mut children: Vec<Arc<E>> = Vec::with_capacity(n);
        for index in 0..n {
            let created = panic::catch_unwind(AssertUnwindSafe(|| factory(index)))
                .unwrap_or_else(|_| Err("executor factory panicked".into()));

            match created {
                Ok(child) => children.push(Arc::new(child)),
                Err(source) => {
                    warn!(index, error = %source, "failed to create child executor, rolling back");
                    rollback(&children, quiet_period, shutdown_timeout);
                    return Err(ExecutorError::ChildCreation { index, source });
                }
            }
        }

        let chooser = chooser_factory.new_chooser(n);
        if chooser.len() != n {
            warn!(
                executors = n,
                chooser_len = chooser.len(),
                "chooser does not match group size"
            );
            rollback(&children, quiet_period, shutdown_timeout);
            return Err(ExecutorError::InvalidConfig(
                "chooser length does not match executor count",
            ));
        }
        let terminated_children = Arc::new(AtomicUsize::new(0));
        let termination = Promise::new();

        for child in &children {
            let terminated_children = Arc::clone(&terminated_children);
            let termination = termination.clone();
            child.termination_future().add_listener(move || {
                if terminated_children.fetch_add(1, Ordering::AcqRel) + 1 == n {
                    termination.try_complete();
                }
            });
        }

        info!(executors = n, "executor group started");

        Ok(Self {
            children: children.into_boxed_slice(),
            chooser,
            terminated_children,
            termination,
            quiet_period,
            shutdown_timeout,
        })
    }

    /// The executor that should take the next unit of work. Never blocks.
    #[inline]
    pub fn next(&self) -> &Arc<E> {
        &self.children[self.chooser.next_index()]
    }

    /// Number of executors in the group
    #[inline]
    pub fn executor_count(&self) -> usize {
        self.children.len()
    }

    /// Children in creation order
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<E>> {
        self.children.iter()
    }

    /// Number of children that have terminated so far
    pub fn terminated_count(&self) -> usize {
        self.terminated_children.load(Ordering::Acquire)
    }

    /// Request graceful shutdown of every child. Idempotent.
    ///
    /// Returns the group termination promise, completed once every child
    /// has terminated.
    pub fn shutdown_gracefully(&self, quiet_period: Duration, timeout: Duration) -> Promise {
        if !self.is_shutting_down() {
            debug!(?quiet_period, ?timeout, "shutting down executor group");
        }
        for child in self.children.iter() {
            child.shutdown_gracefully(quiet_period, timeout);
        }
        self.termination.clone()
    }

    /// `shutdown_gracefully` with the configured quiet period and timeout
    pub fn shutdown_gracefully_default(&self) -> Promise {
        self.shutdown_gracefully(self.quiet_period, self.shutdown_timeout)
    }

    /// Completed exactly once, after every child has terminated
    pub fn termination_future(&self) -> Promise {
        self.termination.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.children.iter().all(|c| c.is_shutting_down())
    }

    pub fn is_shutdown(&self) -> bool {
        self.children.iter().all(|c| c.is_shutdown())
    }

    pub fn is_terminated(&self) -> bool {
        self.children.iter().all(|c| c.is_terminated())
    }

    /// Wait for every child, sharing one deadline across all of them.
    ///
    /// Returns `is_terminated()`.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        'children: for child in self.children.iter() {
            loop {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break 'children;
                }
                if child.await_termination(left) {
                    break;
                }
            }
        }
        self.is_terminated()
    }
}

impl<'a, E: EventExecutor> IntoIterator for &'a ExecutorGroup<E> {
    type Item = &'a Arc<E>;
    type IntoIter = std::slice::Iter<'a, Arc<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<E: EventExecutor> Drop for ExecutorGroup<E> {
    fn drop(&mut self) {
        if !self.is_shutting_down() {
            debug!("executor group dropped while running, requesting shutdown");
            self.shutdown_gracefully(self.quiet_period, self.shutdown_timeout);
        }
    }
}

impl<E: EventExecutor> std::fmt::Debug for ExecutorGroup<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorGroup")
            .field("executors", &self.children.len())
            .field("terminated", &self.terminated_count())
            .finish()
    }
}

/// Shut down and wait out every child created before a failure
fn rollback<E: EventExecutor>(created: &[Arc<E>], quiet_period: Duration, timeout: Duration) {
    for child in created {
        child.shutdown_gracefully(quiet_period, timeout);
    }
    for child in created {
        while !child.await_termination(ROLLBACK_WAIT) {}
    }
    debug!(children = created.len(), "rolled back partially created group");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use weft_core::executor::{EventExecutorExt, Task};

    const LONG: Duration = Duration::from_secs(10);

    /// Executor whose termination is driven by the test
    struct ManualExecutor {
        id: usize,
        shutting_down: AtomicBool,
        terminated: AtomicBool,
        termination: Promise,
        auto_terminate: bool,
        tasks: Mutex<Vec<Task>>,
    }

    impl ManualExecutor {
        fn new(id: usize, auto_terminate: bool) -> Self {
            Self {
                id,
                shutting_down: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
                termination: Promise::new(),
                auto_terminate,
                tasks: Mutex::new(Vec::new()),
            }
        }

        fn terminate(&self) {
            self.terminated.store(true, Ordering::SeqCst);
            self.termination.try_complete();
        }
    }

    impl EventExecutor for ManualExecutor {
        fn execute(&self, task: Task) -> ExecutorResult<()> {
            self.tasks.lock().unwrap().push(task);
            Ok(())
        }

        fn in_event_loop(&self) -> bool {
            false
        }

        fn shutdown_gracefully(&self, _quiet: Duration, _timeout: Duration) -> Promise {
            self.shutting_down.store(true, Ordering::SeqCst);
            if self.auto_terminate {
                self.terminate();
            }
            self.termination.clone()
        }

        fn is_shutting_down(&self) -> bool {
            self.shutting_down.load(Ordering::SeqCst)
        }

        fn is_shutdown(&self) -> bool {
            self.is_terminated()
        }

        fn is_terminated(&self) -> bool {
            self.terminated.load(Ordering::SeqCst)
        }

        fn await_termination(&self, timeout: Duration) -> bool {
            self.termination.wait_timeout(timeout);
            self.is_terminated()
        }

        fn termination_future(&self) -> Promise {
            self.termination.clone()
        }
    }

    fn manual_group(n: usize) -> ExecutorGroup<ManualExecutor> {
        ExecutorGroup::with_factory(
            n,
            |i| Ok(ManualExecutor::new(i, false)),
            &DefaultChooserFactory,
        )
        .unwrap()
    }

    #[test]
    fn test_zero_executors_rejected() {
        let err = ExecutorGroup::with_factory(
            0,
            |i| Ok(ManualExecutor::new(i, true)),
            &DefaultChooserFactory,
        )
        .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidConfig(_)));
    }

    #[test]
    fn test_next_visits_each_child_once_per_cycle() {
        for n in [1, 2, 3, 4, 5, 7, 8, 12] {
            let group = manual_group(n);
            assert_eq!(group.executor_count(), n);

            let ids: Vec<usize> = (0..n).map(|_| group.next().id).collect();
            assert_eq!(ids, (0..n).collect::<Vec<_>>(), "n={}", n);
            assert_eq!(group.next().id, 0);

            // distinct executors, not just distinct ids
            let ptrs: Vec<*const ManualExecutor> = group.iter().map(Arc::as_ptr).collect();
            for (i, p) in ptrs.iter().enumerate() {
                assert!(!ptrs[i + 1..].contains(p));
            }

            for child in &group {
                child.terminate();
            }
        }
    }

    #[test]
    fn test_failed_creation_rolls_back_created_children() {
        let created: Arc<Mutex<Vec<Promise>>> = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&created);
        let result = ExecutorGroup::with_factory(
            5,
            move |i| {
                if i == 3 {
                    return Err("no more threads".into());
                }
                let exec = ManualExecutor::new(i, true);
                seen.lock().unwrap().push(exec.termination_future());
                Ok(exec)
            },
            &DefaultChooserFactory,
        );

        match result {
            Err(ExecutorError::ChildCreation { index, source }) => {
                assert_eq!(index, 3);
                assert_eq!(source.to_string(), "no more threads");
            }
            other => panic!("expected ChildCreation, got {:?}", other.map(|_| ())),
        }

        let created = created.lock().unwrap();
        assert_eq!(created.len(), 3);
        assert!(created.iter().all(|p| p.is_done()));
    }

    /// Always builds a chooser for a fixed length, whatever it is asked for
    struct FixedLenChooserFactory(usize);

    impl ChooserFactory for FixedLenChooserFactory {
        fn new_chooser(&self, _len: usize) -> Box<dyn ExecutorChooser> {
            DefaultChooserFactory.new_chooser(self.0)
        }
    }

    #[test]
    fn test_mismatched_chooser_rejected_and_rolled_back() {
        let created: Arc<Mutex<Vec<Promise>>> = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&created);
        let result = ExecutorGroup::with_factory(
            3,
            move |i| {
                let exec = ManualExecutor::new(i, true);
                seen.lock().unwrap().push(exec.termination_future());
                Ok(exec)
            },
            &FixedLenChooserFactory(4),
        );
        assert!(matches!(result, Err(ExecutorError::InvalidConfig(_))));

        let created = created.lock().unwrap();
        assert_eq!(created.len(), 3);
        assert!(created.iter().all(|p| p.is_done()));
    }

    #[test]
    fn test_drop_requests_shutdown_without_waiting() {
        let group = manual_group(2);
        let children: Vec<_> = group.iter().cloned().collect();

        let start = Instant::now();
        drop(group);
        assert!(start.elapsed() < Duration::from_secs(1));

        // children never terminate on their own here, yet drop returned
        assert!(children.iter().all(|c| c.is_shutting_down()));
        assert!(children.iter().all(|c| !c.is_terminated()));
        for child in &children {
            child.terminate();
        }
    }

    #[test]
    fn test_panicking_factory_is_a_creation_error() {
        let result = ExecutorGroup::with_factory(
            2,
            |i| {
                if i == 1 {
                    panic!("factory bug");
                }
                Ok(ManualExecutor::new(i, true))
            },
            &DefaultChooserFactory,
        );
        assert!(matches!(result, Err(ExecutorError::ChildCreation { index: 1, .. })));
    }

    #[test]
    fn test_termination_fires_once_after_all_children() {
        let group = manual_group(3);
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        group.termination_future().add_listener(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        let promise = group.shutdown_gracefully(Duration::ZERO, LONG);
        assert!(group.is_shutting_down());

        // out of order on purpose
        let children: Vec<_> = group.iter().cloned().collect();
        children[2].terminate();
        assert!(!promise.is_done());
        children[0].terminate();
        assert!(!promise.is_done());
        assert!(!group.is_terminated());
        assert_eq!(group.terminated_count(), 2);

        children[1].terminate();
        assert!(promise.is_done());
        assert!(group.is_terminated());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // a late duplicate completion from a child changes nothing
        children[1].terminate();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let group = manual_group(2);
        let p1 = group.shutdown_gracefully(Duration::ZERO, LONG);
        let p2 = group.shutdown_gracefully_default();
        assert!(p1.ptr_eq(&p2));

        for child in &group {
            child.terminate();
        }
        assert!(p1.is_done());
    }

    #[test]
    fn test_await_termination_shares_deadline() {
        let group = manual_group(4);
        group.shutdown_gracefully(Duration::ZERO, LONG);

        let start = Instant::now();
        assert!(!group.await_termination(Duration::from_millis(100)));
        // one deadline for all four, not 100ms each
        assert!(start.elapsed() < Duration::from_millis(350));

        for child in &group {
            child.terminate();
        }
        assert!(group.await_termination(LONG));
    }

    #[test]
    fn test_event_loop_group_end_to_end() {
        let config = GroupConfig::new()
            .num_loops(3)
            .pool_name("group-test")
            .quiet_period(Duration::ZERO)
            .park_timeout(Duration::from_millis(10));
        let group = EventLoopGroup::new(config).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..30 {
            let hits = Arc::clone(&hits);
            group
                .next()
                .spawn(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        let promise = group.shutdown_gracefully_default();
        assert!(promise.wait_timeout(LONG));
        assert!(group.await_termination(LONG));
        assert!(group.is_shutdown());
        assert_eq!(hits.load(Ordering::SeqCst), 30);
        assert_eq!(group.terminated_count(), 3);
    }

    #[test]
    fn test_event_loop_group_rejects_bad_config() {
        let err = EventLoopGroup::new(GroupConfig::new().num_loops(0)).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidConfig(_)));
    }

    #[test]
    fn test_real_loops_are_terminated_on_rollback() {
        let factory = ThreadFactory::new("rollback-test", 0);
        let spawned: Arc<Mutex<Vec<Promise>>> = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&spawned);
        let result = ExecutorGroup::build(
            4,
            move |i| {
                if i == 2 {
                    return Err("simulated spawn failure".into());
                }
                let el = SingleThreadEventLoop::new(&factory, Duration::from_millis(10))?;
                seen.lock().unwrap().push(el.termination_future());
                Ok(el)
            },
            &DefaultChooserFactory,
            Duration::from_millis(10),
            LONG,
        );
        assert!(matches!(result, Err(ExecutorError::ChildCreation { index: 2, .. })));

        let spawned = spawned.lock().unwrap();
        assert_eq!(spawned.len(), 2);
        // terminated before the error was returned, no waiting needed
        assert!(spawned.iter().all(|p| p.is_done()));
    }
}
