//! A pool of open handles, keyed by path, with automatic eviction.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use derivative::Derivative;
use fdpool_cache::{
    Bound, Clock, Closeable, EvictionCondition, EvictionPolicy, EvictionReport, PolicyError,
    Priority, SystemClock, TrackedMap,
};
use fdpool_cfg::ConfigSet;
use fdpool_ore::assert_none;
use fdpool_ore::cast::CastFrom;

use crate::handle::Descriptor;
use crate::path::PoolPath;
use crate::platform::{FilesystemPlatform, OpenOptions, Platform};
use crate::{EVICTION_INTERVAL, MAX_OPEN_HANDLES};

/// Handle limit to use if we can't ask the OS for one.
const FALLBACK_HANDLE_LIMIT: usize = 256;
/// Shortest interval the background evictor will sleep for.
const MIN_EVICTION_INTERVAL: Duration = Duration::from_millis(10);

type HandleMap<C> = TrackedMap<PoolPath, Descriptor, C>;

/// A pool of open handles.
///
/// Opening a path that is already open returns the existing [`Descriptor`] and marks it as
/// used. Handles stay open until they're explicitly closed, or closed by an eviction pass, the
/// pool never closes anything when it's dropped.
///
/// Cloning a [`HandlePool`] is cheap and all clones share the same handles. Every operation
/// takes a single lock over the whole pool.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct HandlePool<C = SystemClock> {
    #[derivative(Debug = "ignore")]
    handles: Arc<Mutex<HandleMap<C>>>,
    configs: ConfigSet,
}

impl<C> Clone for HandlePool<C> {
    fn clone(&self) -> Self {
        HandlePool {
            handles: Arc::clone(&self.handles),
            configs: self.configs.clone(),
        }
    }
}

impl HandlePool<SystemClock> {
    /// Create a new, empty, [`HandlePool`].
    ///
    /// `configs` must have been registered with [`crate::register_configs`].
    pub fn new(configs: ConfigSet) -> Self {
        HandlePool::with_clock(configs, SystemClock)
    }
}

impl<C: Clock> HandlePool<C> {
    /// Create a new, empty, [`HandlePool`] that reads time from `clock`.
    pub fn with_clock(configs: ConfigSet, clock: C) -> Self {
        let mut handles = TrackedMap::with_clock(clock);
        // Passes made by the pool itself go by use, only a caller supplied policy ordered by
        // `Added` leaves the map needing a rebuild.
        handles.reorder(Priority::Used);

        HandlePool {
            handles: Arc::new(Mutex::new(handles)),
            configs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandleMap<C>> {
        self.handles.lock().expect("HandlePool lock poisoned")
    }

    pub fn configs(&self) -> &ConfigSet {
        &self.configs
    }

    /// Number of handles currently open.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns if there is an open handle for `path`, without marking it as used.
    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }

    /// Returns the paths of all open handles, least recently used first.
    pub fn paths(&self) -> Vec<PoolPath> {
        self.lock().iter().map(|(path, _)| path.clone()).collect()
    }

    /// Open `path`, or return the handle that's already open for it.
    ///
    /// Apart from the access mode, `options` only apply when a new handle is opened. Asking for
    /// a writable handle when `path` is already open read-only fails with
    /// [`Error::ReadOnly`](crate::Error::ReadOnly), close it first to re-open it. If opening
    /// pushes the pool over its limit the least recently used handles are closed.
    pub fn open(&self, path: &str, options: OpenOptions) -> Result<Descriptor, crate::Error> {
        let path = PoolPath::new(path)?;
        let mut handles = self.lock();

        if let Some(descriptor) = handles.get_entry(path.as_str()).map(|entry| *entry.value()) {
            if options.is_writable() && !descriptor.options().is_writable() {
                return Err(crate::Error::ReadOnly(path.to_string()));
            }
            handles.lookup(path.as_str());
            tracing::debug!(%path, "reusing open handle");
            return Ok(descriptor);
        }

        let raw = FilesystemPlatform::open(&path, options)?;
        let descriptor = Descriptor::from_raw(raw, options);
        let prev = handles.insert(path.clone(), descriptor);
        assert_none!(prev, "replaced handle for {path}");
        tracing::debug!(%path, open = handles.len(), "opened handle");

        self.enforce_limit_locked(&mut handles);
        Ok(descriptor)
    }

    /// Close the handle for `path`.
    ///
    /// Returns `false` if no handle was open. If closing fails the handle stays in the pool.
    pub fn close(&self, path: &str) -> Result<bool, crate::Error> {
        let mut handles = self.lock();
        let Some(entry) = handles.get_entry(path) else {
            return Ok(false);
        };
        entry.value().close()?;
        handles.remove(path);
        tracing::debug!(%path, "closed handle");
        Ok(true)
    }

    /// Run a single eviction pass with `policy`.
    ///
    /// Fails without closing anything if `policy`'s bounds don't fit the current number of
    /// open handles, see [`TrackedMap::evict`].
    pub fn evict(&self, policy: &EvictionPolicy) -> Result<EvictionReport<PoolPath>, PolicyError> {
        self.lock().evict(policy)
    }

    /// Run a single eviction pass with the policy described by our [`ConfigSet`].
    pub fn evict_configured(&self) -> Result<EvictionReport<PoolPath>, anyhow::Error> {
        let policy = EvictionPolicy::from_configs(&self.configs)?;
        Ok(self.evict(&policy)?)
    }

    /// Close every handle in the pool.
    pub fn close_all(&self) -> EvictionReport<PoolPath> {
        let policy = EvictionPolicy::builder(EvictionCondition::all())
            .priority(Priority::Used)
            .build()
            .expect("known valid");
        self.evict(&policy)
            .expect("a min of 0 is always below an unset max")
    }

    /// Maximum number of handles this pool keeps open.
    pub fn handle_limit(&self) -> usize {
        let configured = usize::cast_from(MAX_OPEN_HANDLES.read(&self.configs));
        if configured > 0 {
            return configured;
        }

        match FilesystemPlatform::file_handle_max() {
            Ok(max) => (max / 2).max(1),
            Err(err) => {
                tracing::warn!(%err, FALLBACK_HANDLE_LIMIT, "failed to get process handle limit");
                FALLBACK_HANDLE_LIMIT
            }
        }
    }

    /// Close the least recently used handles until the pool is within its limit.
    ///
    /// Returns `None` if the pool was already within its limit.
    pub fn enforce_limit(&self) -> Option<EvictionReport<PoolPath>> {
        let mut handles = self.lock();
        self.enforce_limit_locked(&mut handles)
    }

    fn enforce_limit_locked(&self, handles: &mut HandleMap<C>) -> Option<EvictionReport<PoolPath>> {
        let limit = self.handle_limit();
        let excess = handles.len().saturating_sub(limit);
        if excess == 0 {
            return None;
        }

        tracing::info!(limit, excess, "handle pool over its limit");
        let policy = EvictionPolicy::builder(EvictionCondition::all())
            .priority(Priority::Used)
            .max(Bound::Count(excess))
            .build()
            .expect("known valid");
        let report = handles
            .evict(&policy)
            .expect("a min of 0 is always below a non-zero max");
        Some(report)
    }
}

impl<C: Clock + Send + 'static> HandlePool<C> {
    /// Spawn a task that runs [`HandlePool::evict_configured`] every [`EVICTION_INTERVAL`].
    ///
    /// The interval is re-read before every pass, so updates to the [`ConfigSet`] are picked up
    /// without restarting the task. Dropping the returned handle does not stop the task, abort it
    /// instead.
    pub fn spawn_evictor(&self) -> tokio::task::JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            loop {
                let interval = EVICTION_INTERVAL.read(&pool.configs).max(MIN_EVICTION_INTERVAL);
                tokio::time::sleep(interval).await;

                match pool.evict_configured() {
                    Ok(report) => tracing::debug!(
                        closed = report.closed.len(),
                        failed = report.failed.len(),
                        open = pool.len(),
                        "background eviction pass"
                    ),
                    Err(err) => tracing::warn!(?err, "invalid eviction config, skipping pass"),
                }
            }
        })
    }
}
