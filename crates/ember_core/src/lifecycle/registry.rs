//! # Resource Registry
//!
//! Tracks live resources and the three deferred work queues.
//!
//! ## Architecture
//!
//! ```text
//!   Worker 1 ──register────┐        ┌──────────────┐
//!   Worker 2 ──invalidate──┼──────> │  init queue  │──┐
//!   Worker N ──unregister──┘        │ update queue │──┼──> process()  (render thread,
//!                                   │release queue │──┘     once per frame)
//!                                   └──────────────┘
//! ```
//!
//! `process()` drains init, then update, then release, each in FIFO order.
//! An object created, invalidated and dropped within one frame is therefore
//! initialized, updated and released in that order, and a released handle
//! is only recycled after its old occupant's releaser has run.

use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};

use super::object::{run_initializer, run_releaser, run_updater, LifecycleObject};
use super::state::{LifecycleState, ResourceHandle};
use crate::config::RegistryConfig;
use crate::error::{ConfigError, LifecycleError, LifecycleResult};
use crate::memory::IdAllocator;
use crate::sync::{FrameClock, RenderThread};

type ObjectRef = Arc<dyn LifecycleObject>;

// ============================================================================
// WORK QUEUE
// ============================================================================

/// Lock-free FIFO of pending lifecycle work.
struct WorkQueue {
    sender: Sender<ObjectRef>,
    receiver: Receiver<ObjectRef>,
}

impl WorkQueue {
    fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    fn push(&self, object: ObjectRef) {
        // Both ends live in `self`, so the channel cannot be disconnected
        let _ = self.sender.send(object);
    }

    fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Pops everything queued when the drain starts. Work pushed while
    /// draining waits for the next pass.
    fn drain_pending(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        let pending = self.receiver.len();
        (0..pending).map_while(|_| self.receiver.try_recv().ok())
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Work done by a single `process()` pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Frame number the pass advanced to.
    pub frame: u64,
    /// Initializers that fired.
    pub initialized: usize,
    /// Updaters that fired.
    pub updated: usize,
    /// Releasers that fired.
    pub released: usize,
    /// Entries pushed back to the next pass (not yet initialized).
    pub deferred: usize,
    /// Entries dropped because their object was already released.
    pub skipped: usize,
}

impl ProcessReport {
    /// True if the pass did nothing.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.initialized == 0
            && self.updated == 0
            && self.released == 0
            && self.deferred == 0
            && self.skipped == 0
    }
}

/// Number of entries waiting in each queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingCounts {
    /// Waiting for their initializer.
    pub init: usize,
    /// Waiting for their updater.
    pub update: usize,
    /// Waiting for their releaser.
    pub release: usize,
}

/// Cumulative registry statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Successful `register` calls.
    pub registered: u64,
    /// Successful `unregister` calls.
    pub unregistered: u64,
    /// Initializers fired.
    pub initialized: u64,
    /// Updaters fired.
    pub updated: u64,
    /// Releasers fired.
    pub released: u64,
    /// Completed `process()` passes.
    pub frames: u64,
}

#[derive(Default)]
struct StatsCounters {
    registered: AtomicU64,
    unregistered: AtomicU64,
    initialized: AtomicU64,
    updated: AtomicU64,
    released: AtomicU64,
    frames: AtomicU64,
}

impl StatsCounters {
    fn record(&self, report: &ProcessReport) {
        self.initialized
            .fetch_add(report.initialized as u64, Ordering::Relaxed);
        self.updated.fetch_add(report.updated as u64, Ordering::Relaxed);
        self.released.fetch_add(report.released as u64, Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RegistryStats {
        RegistryStats {
            registered: self.registered.load(Ordering::Relaxed),
            unregistered: self.unregistered.load(Ordering::Relaxed),
            initialized: self.initialized.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Owner of the tracked-object set and the deferred init/update/release
/// queues.
///
/// The tracked set holds only weak references; the application owns its
/// resources. A queued entry keeps its object alive until the queued work
/// has run, so a resource dropped in the frame it was created is still
/// initialized and then released.
///
/// # Thread Safety
///
/// `register`, `unregister`, `invalidate` and lookups are callable from any
/// thread and never block `process()`. `process()` runs on the render thread
/// only.
///
/// # Example
///
/// ```rust,ignore
/// let registry = ResourceRegistry::new(RegistryConfig::default())?;
///
/// // Any thread
/// let buffer = Arc::new(Buffer::new(device.clone(), desc));
/// registry.register(&buffer)?;
/// buffer.write(&vertices)?; // invalidates
///
/// // Render thread, once per frame
/// let report = registry.process()?;
/// ```
pub struct ResourceRegistry {
    config: RegistryConfig,
    render_thread: RenderThread,
    /// Handle -> weak membership reference.
    objects: IdAllocator<Weak<dyn LifecycleObject>>,
    init_queue: WorkQueue,
    update_queue: WorkQueue,
    release_queue: WorkQueue,
    clock: FrameClock,
    stats: StatsCounters,
}

impl ResourceRegistry {
    /// Creates a registry whose render thread is the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` does not validate.
    pub fn new(config: RegistryConfig) -> Result<Arc<Self>, ConfigError> {
        let render_thread = RenderThread::current(config.affinity);
        Self::with_render_thread(config, render_thread)
    }

    /// Creates a registry driven by an explicit render thread.
    ///
    /// # Errors
    ///
    /// As [`ResourceRegistry::new`].
    pub fn with_render_thread(
        config: RegistryConfig,
        render_thread: RenderThread,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::with_clock(config, render_thread, FrameClock::new())
    }

    /// Creates a registry that advances an existing frame clock.
    ///
    /// # Errors
    ///
    /// As [`ResourceRegistry::new`].
    pub fn with_clock(
        config: RegistryConfig,
        render_thread: RenderThread,
        clock: FrameClock,
    ) -> Result<Arc<Self>, ConfigError> {
        // Handle 0 is the unregistered sentinel and must never be issued
        config.validate()?;
        let objects = IdAllocator::with_capacity(config.first_handle, config.expected_objects);
        Ok(Arc::new(Self {
            config,
            render_thread,
            objects,
            init_queue: WorkQueue::new(),
            update_queue: WorkQueue::new(),
            release_queue: WorkQueue::new(),
            clock,
            stats: StatsCounters::default(),
        }))
    }

    /// Configuration this registry was built with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The render thread allowed to call [`ResourceRegistry::process`].
    #[must_use]
    pub fn render_thread(&self) -> &RenderThread {
        &self.render_thread
    }

    /// Frame counter advanced at the end of each pass.
    #[must_use]
    pub fn frame_clock(&self) -> &FrameClock {
        &self.clock
    }

    // ========================================================================
    // Any-thread API
    // ========================================================================

    /// Registers `object` and queues its initializer.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the object is already registered
    /// - `PreconditionViolation` if it has been released
    /// - `IdSpaceExhausted` if no handle is left
    pub fn register<T: LifecycleObject>(
        self: &Arc<Self>,
        object: &Arc<T>,
    ) -> LifecycleResult<ResourceHandle> {
        let erased: ObjectRef = Arc::clone(object) as ObjectRef;
        self.register_dyn(&erased)
    }

    /// [`ResourceRegistry::register`] for type-erased objects.
    ///
    /// The object turns `PendingInit` before its handle is bound. Concurrent
    /// `unregister` and `invalidate` calls that land in between wait for the
    /// bind instead of reporting `NotFound`.
    ///
    /// # Errors
    ///
    /// As [`ResourceRegistry::register`].
    pub fn register_dyn(
        self: &Arc<Self>,
        object: &Arc<dyn LifecycleObject>,
    ) -> LifecycleResult<ResourceHandle> {
        let lifecycle = object.lifecycle();
        match lifecycle.transition(LifecycleState::Unregistered, LifecycleState::PendingInit) {
            Ok(()) => {}
            Err(LifecycleState::Released) => {
                return Err(LifecycleError::PreconditionViolation(format!(
                    "{} has been released and cannot be registered again",
                    object.label()
                )));
            }
            Err(state) => {
                return Err(LifecycleError::InvalidArgument(format!(
                    "{} {} is already registered ({state:?})",
                    object.label(),
                    lifecycle.handle()
                )));
            }
        }

        let raw = match self.objects.allocate_with(Arc::downgrade(object)) {
            Ok(raw) => raw,
            Err(err) => {
                lifecycle.set_state(LifecycleState::Unregistered);
                return Err(err);
            }
        };
        let handle = ResourceHandle::new(raw);
        lifecycle.bind(handle, self);
        self.init_queue.push(Arc::clone(object));
        self.stats.registered.fetch_add(1, Ordering::Relaxed);

        tracing::debug!("Registered {} as {}", object.label(), handle);
        Ok(handle)
    }

    /// Unregisters `object` and queues its releaser. The handle stays
    /// resolvable until the releaser has run.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the object is not tracked by this registry
    /// - `InvalidArgument` if it was already unregistered
    pub fn unregister(&self, object: &(impl LifecycleObject + ?Sized)) -> LifecycleResult<()> {
        let lifecycle = object.lifecycle();
        match lifecycle.state() {
            LifecycleState::PendingRelease | LifecycleState::Released => {
                return Err(LifecycleError::InvalidArgument(format!(
                    "{} was already unregistered",
                    object.label()
                )));
            }
            LifecycleState::Unregistered => {
                return Err(LifecycleError::NotFound(format!(
                    "{} is not registered",
                    object.label()
                )));
            }
            LifecycleState::PendingInit | LifecycleState::Ready => {}
        }

        let (handle, strong) = self.resolve(object)?;

        let mut current = lifecycle.state();
        loop {
            match current {
                LifecycleState::PendingInit | LifecycleState::Ready => {}
                _ => {
                    return Err(LifecycleError::InvalidArgument(format!(
                        "{} {handle} was already unregistered",
                        object.label()
                    )));
                }
            }
            match lifecycle.transition(current, LifecycleState::PendingRelease) {
                Ok(()) => break,
                Err(observed) => current = observed,
            }
        }

        self.release_queue.push(strong);
        self.stats.unregistered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Unregistered {} {}", object.label(), handle);
        Ok(())
    }

    /// Marks `object` dirty and queues its updater, at most once per pending
    /// update. Returns true if this call queued the update.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the object is not tracked by this registry
    /// - `PreconditionViolation` if it has been released
    pub fn invalidate(&self, object: &(impl LifecycleObject + ?Sized)) -> LifecycleResult<bool> {
        let lifecycle = object.lifecycle();
        match lifecycle.state() {
            LifecycleState::Released => {
                return Err(LifecycleError::PreconditionViolation(format!(
                    "{} has been released",
                    object.label()
                )));
            }
            LifecycleState::Unregistered => {
                return Err(LifecycleError::NotFound(format!(
                    "{} is not registered",
                    object.label()
                )));
            }
            LifecycleState::PendingRelease => {
                tracing::trace!("Ignoring invalidate of {} pending release", object.label());
                return Ok(false);
            }
            LifecycleState::PendingInit | LifecycleState::Ready => {}
        }

        let (_, strong) = self.resolve(object)?;
        if !lifecycle.mark_dirty() {
            return Ok(false);
        }
        self.update_queue.push(strong);
        Ok(true)
    }

    /// Resolves a handle to its object, if the object is still alive.
    #[must_use]
    pub fn lookup(&self, handle: ResourceHandle) -> Option<Arc<dyn LifecycleObject>> {
        self.objects
            .lookup(handle.raw())
            .and_then(|weak| weak.upgrade())
    }

    /// True if `handle` is tracked (including objects pending release).
    #[must_use]
    pub fn contains(&self, handle: ResourceHandle) -> bool {
        !handle.is_null() && self.objects.contains(handle.raw())
    }

    /// Number of tracked objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Snapshot of tracked handles, ascending.
    #[must_use]
    pub fn handles(&self) -> Vec<ResourceHandle> {
        self.objects
            .ids()
            .into_iter()
            .map(ResourceHandle::new)
            .collect()
    }

    /// Entries waiting in each queue.
    #[must_use]
    pub fn pending(&self) -> PendingCounts {
        PendingCounts {
            init: self.init_queue.len(),
            update: self.update_queue.len(),
            release: self.release_queue.len(),
        }
    }

    /// Cumulative statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.stats.snapshot()
    }

    // ========================================================================
    // Render-thread API
    // ========================================================================

    /// Drains the init, update and release queues, in that order, and
    /// advances the frame clock. Call once per frame.
    ///
    /// # Errors
    ///
    /// `PreconditionViolation` when called off the render thread.
    pub fn process(&self) -> LifecycleResult<ProcessReport> {
        self.render_thread.check("ResourceRegistry::process")?;

        let mut report = ProcessReport::default();

        for object in self.init_queue.drain_pending() {
            self.process_init(&object, &mut report);
        }
        for object in self.update_queue.drain_pending() {
            self.process_update(object, &mut report);
        }
        for object in self.release_queue.drain_pending() {
            self.process_release(object, &mut report);
        }

        report.frame = self.clock.advance();
        self.stats.record(&report);

        if !report.is_idle() {
            tracing::debug!(
                "Frame {}: {} initialized, {} updated, {} released, {} deferred",
                report.frame,
                report.initialized,
                report.updated,
                report.released,
                report.deferred
            );
        }
        Ok(report)
    }

    fn process_init(&self, object: &ObjectRef, report: &mut ProcessReport) {
        let lifecycle = object.lifecycle();
        if lifecycle.state() == LifecycleState::Released {
            report.skipped += 1;
            return;
        }
        if run_initializer(&**object) {
            report.initialized += 1;
        }
        // Stays PendingRelease if it was unregistered before this pass
        let _ = lifecycle.transition(LifecycleState::PendingInit, LifecycleState::Ready);
    }

    fn process_update(&self, object: ObjectRef, report: &mut ProcessReport) {
        let lifecycle = object.lifecycle();
        if lifecycle.state() == LifecycleState::Released {
            lifecycle.clear_update_queued();
            report.skipped += 1;
            return;
        }
        if !lifecycle.is_initialized() {
            // Registered after this pass's init drain; retry after next init
            self.update_queue.push(object);
            report.deferred += 1;
            return;
        }

        lifecycle.clear_update_queued();
        if run_updater(&*object) {
            report.updated += 1;
        }
    }

    fn process_release(&self, object: ObjectRef, report: &mut ProcessReport) {
        let lifecycle = object.lifecycle();
        if lifecycle.state() == LifecycleState::Released {
            report.skipped += 1;
            return;
        }
        if !lifecycle.is_initialized() {
            // Init must run first so the native handle exists to be freed
            self.release_queue.push(object);
            report.deferred += 1;
            return;
        }

        if run_releaser(&*object) {
            report.released += 1;
        }

        let handle = lifecycle.handle();
        lifecycle.set_state(LifecycleState::Released);
        lifecycle.unbind();
        if let Err(err) = self.objects.free(handle.raw()) {
            tracing::error!("Releasing {} {}: {}", object.label(), handle, err);
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Resolves `object` through its handle and checks that the tracked
    /// entry is this very object.
    ///
    /// `register` publishes `PendingInit` before it binds the handle. A caller
    /// racing into that window waits for the bind, or for the rollback to
    /// `Unregistered` if allocation failed.
    fn resolve(
        &self,
        object: &(impl LifecycleObject + ?Sized),
    ) -> LifecycleResult<(ResourceHandle, ObjectRef)> {
        let lifecycle = object.lifecycle();
        let mut handle = lifecycle.handle();
        while handle.is_null() && lifecycle.state() == LifecycleState::PendingInit {
            std::thread::yield_now();
            handle = lifecycle.handle();
        }
        let not_found = || {
            LifecycleError::NotFound(format!(
                "{} {handle} is not tracked by this registry",
                object.label()
            ))
        };

        if handle.is_null() {
            return Err(not_found());
        }
        let strong = self.lookup(handle).ok_or_else(not_found)?;
        if !ptr::eq(strong.lifecycle(), lifecycle) {
            return Err(not_found());
        }
        Ok((handle, strong))
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("tracked", &self.len())
            .field("pending", &self.pending())
            .field("frame", &self.clock.current())
            .finish_non_exhaustive()
    }
}

impl Drop for ResourceRegistry {
    fn drop(&mut self) {
        let pending = self.pending();
        let tracked = self.objects.len();
        if tracked > 0 || pending.release > 0 {
            tracing::warn!(
                "Resource registry dropped with {} tracked objects and {} pending releases",
                tracked,
                pending.release
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Lifecycle, LifecycleExt};
    use crate::sync::{ActionRef, OneShotAction};
    use parking_lot::Mutex;
    use std::thread;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Resource that records hook executions into a shared log.
    struct Recorder {
        name: &'static str,
        lifecycle: Lifecycle,
        init: ActionRef,
        release: ActionRef,
        log: Log,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Arc<Self> {
            let (l1, l2) = (Arc::clone(log), Arc::clone(log));
            Arc::new(Self {
                name,
                lifecycle: Lifecycle::new(),
                init: OneShotAction::from_fn(move || l1.lock().push(format!("init {name}")))
                    .into_ref(),
                release: OneShotAction::from_fn(move || l2.lock().push(format!("release {name}")))
                    .into_ref(),
                log: Arc::clone(log),
            })
        }
    }

    impl LifecycleObject for Recorder {
        fn lifecycle(&self) -> &Lifecycle {
            &self.lifecycle
        }

        fn initializer(&self) -> ActionRef {
            Arc::clone(&self.init)
        }

        fn updater(&self) -> ActionRef {
            let log = Arc::clone(&self.log);
            let name = self.name;
            OneShotAction::from_fn(move || log.lock().push(format!("update {name}"))).into_ref()
        }

        fn releaser(&self) -> ActionRef {
            Arc::clone(&self.release)
        }

        fn label(&self) -> &str {
            self.name
        }
    }

    fn registry() -> Arc<ResourceRegistry> {
        ResourceRegistry::new(RegistryConfig::default()).unwrap()
    }

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_register_assigns_handles_from_one() {
        let registry = registry();
        let log = new_log();
        let a = Recorder::new("a", &log);
        let b = Recorder::new("b", &log);

        assert_eq!(registry.register(&a).unwrap(), ResourceHandle::new(1));
        assert_eq!(registry.register(&b).unwrap(), ResourceHandle::new(2));
        assert_eq!(a.state(), LifecycleState::PendingInit);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.pending().init, 2);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_null_first_handle_rejected() {
        let config = RegistryConfig {
            first_handle: 0,
            ..RegistryConfig::default()
        };
        let err = ResourceRegistry::new(config.clone()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = ResourceRegistry::with_render_thread(
            config,
            RenderThread::current(crate::config::AffinityPolicy::Error),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unregister_racing_register_waits_for_bind() {
        let registry = registry();
        let log = new_log();

        for _ in 0..200 {
            let recorder = Recorder::new("racer", &log);
            let registering = {
                let registry = Arc::clone(&registry);
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || registry.register(&recorder).unwrap())
            };

            while recorder.state() == LifecycleState::Unregistered {
                std::hint::spin_loop();
            }
            registry.unregister(&*recorder).unwrap();

            let handle = registering.join().unwrap();
            assert_eq!(recorder.handle(), handle);
            assert_eq!(recorder.state(), LifecycleState::PendingRelease);
        }

        registry.process().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_full_lifecycle_order() {
        let registry = registry();
        let log = new_log();
        let a = Recorder::new("a", &log);

        let handle = registry.register(&a).unwrap();
        assert!(a.invalidate().unwrap());
        assert!(!a.invalidate().unwrap());
        registry.unregister(&*a).unwrap();
        assert!(registry.contains(handle));

        let report = registry.process().unwrap();
        assert_eq!(
            *log.lock(),
            vec!["init a".to_string(), "update a".into(), "release a".into()]
        );
        assert_eq!(report.initialized, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.released, 1);
        assert_eq!(report.frame, 1);

        assert_eq!(a.state(), LifecycleState::Released);
        assert!(a.handle().is_null());
        assert!(!registry.contains(handle));
        assert!(registry.is_empty());
        assert!(a.ensure_ready().unwrap_err().is_precondition_violation());
    }

    #[test]
    fn test_handle_recycled_after_release() {
        let registry = registry();
        let log = new_log();
        let a = Recorder::new("a", &log);
        let b = Recorder::new("b", &log);

        registry.register(&a).unwrap();
        registry.unregister(&*a).unwrap();
        registry.process().unwrap();

        assert_eq!(registry.register(&b).unwrap(), ResourceHandle::new(1));
    }

    #[test]
    fn test_double_register_rejected() {
        let registry = registry();
        let a = Recorder::new("a", &new_log());
        registry.register(&a).unwrap();

        let err = registry.register(&a).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_after_release_rejected() {
        let registry = registry();
        let a = Recorder::new("a", &new_log());
        registry.register(&a).unwrap();
        registry.unregister(&*a).unwrap();
        registry.process().unwrap();

        assert!(registry.register(&a).unwrap_err().is_precondition_violation());
    }

    #[test]
    fn test_unregister_errors() {
        let registry = registry();
        let a = Recorder::new("a", &new_log());

        assert!(registry.unregister(&*a).unwrap_err().is_not_found());

        registry.register(&a).unwrap();
        registry.unregister(&*a).unwrap();
        assert!(registry.unregister(&*a).unwrap_err().is_invalid_argument());
        assert_eq!(registry.pending().release, 1);
    }

    #[test]
    fn test_unregister_foreign_object_not_found() {
        let first = registry();
        let second = registry();
        let a = Recorder::new("a", &new_log());
        first.register(&a).unwrap();

        assert!(second.unregister(&*a).unwrap_err().is_not_found());
        assert!(second.invalidate(&*a).unwrap_err().is_not_found());
    }

    #[test]
    fn test_invalidate_states() {
        let registry = registry();
        let a = Recorder::new("a", &new_log());
        assert!(a.invalidate().unwrap_err().is_not_found());

        registry.register(&a).unwrap();
        registry.unregister(&*a).unwrap();
        assert!(!registry.invalidate(&*a).unwrap());

        registry.process().unwrap();
        assert!(registry.invalidate(&*a).unwrap_err().is_precondition_violation());
        assert!(a.invalidate().unwrap_err().is_precondition_violation());
    }

    #[test]
    fn test_update_requeued_after_it_runs() {
        let registry = registry();
        let log = new_log();
        let a = Recorder::new("a", &log);
        registry.register(&a).unwrap();
        registry.process().unwrap();

        assert!(a.invalidate().unwrap());
        registry.process().unwrap();
        assert!(a.invalidate().unwrap());
        registry.process().unwrap();

        let updates = log.lock().iter().filter(|e| e.starts_with("update")).count();
        assert_eq!(updates, 2);
        assert!(!a.is_dirty());
    }

    #[test]
    fn test_dropped_object_still_released() {
        let registry = registry();
        let log = new_log();
        let a = Recorder::new("a", &log);
        let handle = registry.register(&a).unwrap();
        registry.unregister(&*a).unwrap();
        drop(a);

        registry.process().unwrap();
        assert_eq!(*log.lock(), vec!["init a".to_string(), "release a".into()]);
        assert!(!registry.contains(handle));
    }

    #[test]
    fn test_lookup_resolves_live_objects() {
        let registry = registry();
        let a = Recorder::new("a", &new_log());
        let handle = registry.register(&a).unwrap();

        let found = registry.lookup(handle).unwrap();
        assert!(ptr::eq(found.lifecycle(), a.lifecycle()));
        assert!(registry.lookup(ResourceHandle::NULL).is_none());
        assert!(registry.lookup(ResourceHandle::new(99)).is_none());
        assert_eq!(registry.handles(), vec![handle]);
    }

    #[test]
    fn test_process_off_thread_rejected() {
        let registry = registry();
        let a = Recorder::new("a", &new_log());
        registry.register(&a).unwrap();

        let remote = Arc::clone(&registry);
        let result = thread::spawn(move || remote.process()).join().unwrap();
        assert!(result.unwrap_err().is_precondition_violation());
        assert_eq!(registry.pending().init, 1);
    }

    #[test]
    fn test_ensure_ready_runs_immediately() {
        let registry = registry();
        let log = new_log();
        let a = Recorder::new("a", &log);
        registry.register(&a).unwrap();
        a.invalidate().unwrap();

        a.ensure_ready().unwrap();
        assert_eq!(a.state(), LifecycleState::Ready);
        assert!(a.is_initialized());
        assert_eq!(*log.lock(), vec!["init a".to_string(), "update a".into()]);

        // Queued entries become no-ops
        let report = registry.process().unwrap();
        assert_eq!(report.initialized, 0);
        assert_eq!(report.updated, 0);
    }

    #[test]
    fn test_ensure_updated_requires_init() {
        let registry = registry();
        let a = Recorder::new("a", &new_log());
        registry.register(&a).unwrap();

        assert!(a.ensure_updated().unwrap_err().is_precondition_violation());
    }

    #[test]
    fn test_stats_accumulate() {
        let registry = registry();
        let log = new_log();
        for name in ["a", "b", "c"] {
            let recorder = Recorder::new(name, &log);
            registry.register(&recorder).unwrap();
            registry.unregister(&*recorder).unwrap();
        }
        registry.process().unwrap();
        registry.process().unwrap();

        let stats = registry.stats();
        assert_eq!(stats.registered, 3);
        assert_eq!(stats.unregistered, 3);
        assert_eq!(stats.initialized, 3);
        assert_eq!(stats.released, 3);
        assert_eq!(stats.frames, 2);
        assert_eq!(registry.frame_clock().current(), 2);
        assert!(registry.process().unwrap().is_idle());
    }
}
