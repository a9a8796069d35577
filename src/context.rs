//! Explicit device context
//!
//! A [`Context`] owns the devices a run may use. Each [`Device`] is a dedicated
//! `rayon` thread pool plus a memory budget; every data-parallel phase runs
//! inside the owning device's pool. There is no process-global state: the
//! context is created once, passed by reference to `Problem::init`, and
//! released on drop.

use crate::error::{FrontierError, Phase, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default per-device memory budget (4 GiB)
pub const DEFAULT_MEMORY_BUDGET: usize = 4 << 30;

/// Device context configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Number of devices
    pub device_count: usize,
    /// Worker threads per device (0 = split the host's parallelism evenly)
    pub threads_per_device: usize,
    /// Memory budget per device in bytes
    pub memory_budget_bytes: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            device_count: 1,
            threads_per_device: 0,
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET,
        }
    }
}

impl ContextConfig {
    /// Config with `device_count` devices and default threads and budget
    #[must_use]
    pub fn with_devices(device_count: usize) -> Self {
        Self {
            device_count,
            ..Self::default()
        }
    }

    /// Set the per-device memory budget
    #[must_use]
    pub const fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget_bytes = bytes;
        self
    }

    /// Set the worker threads per device
    #[must_use]
    pub const fn with_threads_per_device(mut self, threads: usize) -> Self {
        self.threads_per_device = threads;
        self
    }

    fn resolved_threads(&self) -> usize {
        if self.threads_per_device > 0 {
            return self.threads_per_device;
        }
        let host = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        (host / self.device_count.max(1)).max(1)
    }
}

/// One accelerator device: a worker pool and a memory budget
#[derive(Debug)]
pub struct Device {
    id: usize,
    pool: rayon::ThreadPool,
    budget: usize,
    used: AtomicUsize,
}

impl Device {
    /// Device index within its context
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Worker threads in the device pool
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Memory budget in bytes
    #[must_use]
    pub const fn budget(&self) -> usize {
        self.budget
    }

    /// Bytes currently reserved
    #[must_use]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Bytes still available
    #[must_use]
    pub fn available(&self) -> usize {
        self.budget.saturating_sub(self.used())
    }

    /// Run `op` inside this device's worker pool
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// Reserve `bytes` of device memory for `what`
    ///
    /// The reservation is released when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns `OutOfDeviceMemory` if the reservation would exceed the budget
    pub fn reserve(self: &Arc<Self>, what: &'static str, bytes: usize) -> Result<MemoryReservation> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|total| *total <= self.budget)
            })
            .map_err(|used| FrontierError::OutOfDeviceMemory {
                device: self.id,
                what,
                required: bytes,
                available: self.budget.saturating_sub(used),
            })?;

        tracing::debug!(device = self.id, what, bytes, "reserved device memory");
        Ok(MemoryReservation {
            device: Arc::clone(self),
            what,
            bytes,
        })
    }
}

/// Device memory held until drop
#[derive(Debug)]
pub struct MemoryReservation {
    device: Arc<Device>,
    what: &'static str,
    bytes: usize,
}

impl MemoryReservation {
    /// Reserved bytes
    #[must_use]
    pub const fn bytes(&self) -> usize {
        self.bytes
    }

    /// What the memory was reserved for
    #[must_use]
    pub const fn what(&self) -> &'static str {
        self.what
    }
}

impl Drop for MemoryReservation {
    fn drop(&mut self) {
        self.device.used.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

/// Set of devices available to a run
#[derive(Debug)]
pub struct Context {
    devices: Vec<Arc<Device>>,
}

impl Context {
    /// Create a context with the configured devices
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for zero devices, `DeviceFault` if a device
    /// worker pool cannot be started
    pub fn new(config: &ContextConfig) -> Result<Self> {
        if config.device_count == 0 {
            return Err(FrontierError::InvalidConfig(
                "context needs at least one device".to_string(),
            ));
        }

        let threads = config.resolved_threads();
        let devices = (0..config.device_count)
            .map(|id| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(move |worker| format!("frontier-dev{id}-w{worker}"))
                    .build()
                    .map_err(|err| FrontierError::DeviceFault {
                        device: id,
                        phase: Phase::Init,
                        iteration: 0,
                        message: err.to_string(),
                    })?;
                Ok(Arc::new(Device {
                    id,
                    pool,
                    budget: config.memory_budget_bytes,
                    used: AtomicUsize::new(0),
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            devices = config.device_count,
            threads_per_device = threads,
            budget_bytes = config.memory_budget_bytes,
            "device context ready"
        );
        Ok(Self { devices })
    }

    /// Number of devices
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Device by index
    #[must_use]
    pub fn device(&self, id: usize) -> Option<&Arc<Device>> {
        self.devices.get(id)
    }

    /// All devices
    #[must_use]
    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }
}

#[cfg(feature = "gpu")]
impl Context {
    /// Create a context whose per-device budget follows the GPU adapter limits
    ///
    /// Uses 70% of the adapter's maximum buffer size, leaving headroom for
    /// driver allocations.
    ///
    /// # Errors
    ///
    /// Same as [`Context::new`]
    pub fn with_gpu_budget(config: &ContextConfig, gpu: &crate::gpu::GpuDevice) -> Result<Self> {
        let config = config
            .clone()
            .with_memory_budget(gpu.memory_budget_bytes());
        Self::new(&config)
    }
}

/// A per-device work item the enactor can run a phase on
pub(crate) trait OnDevice: Send {
    fn device(&self) -> &Arc<Device>;
}

/// Run `op` on every slot concurrently, one host thread per device
///
/// Returns once every device has finished (full barrier). A panic inside a
/// device pool is reported as `DeviceFault` for that device. When several
/// devices fail, the error of the lowest device index is returned.
pub(crate) fn run_on_devices<T, R, F>(
    slots: &mut [T],
    phase: Phase,
    iteration: u32,
    op: F,
) -> Result<Vec<R>>
where
    T: OnDevice,
    R: Send,
    F: Fn(&mut T) -> Result<R> + Sync,
{
    let fault = |device: usize, message: String| FrontierError::DeviceFault {
        device,
        phase,
        iteration,
        message,
    };

    std::thread::scope(|scope| {
        let op = &op;
        let mut handles = Vec::with_capacity(slots.len());
        for slot in slots.iter_mut() {
            let device = Arc::clone(slot.device());
            let id = device.id();
            let spawned = std::thread::Builder::new()
                .name(format!("frontier-dev{id}"))
                .spawn_scoped(scope, move || device.install(|| op(slot)));
            handles.push((id, spawned));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for (id, spawned) in handles {
            let outcome = match spawned {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|payload| Err(fault(id, panic_message(payload.as_ref())))),
                Err(err) => Err(fault(id, format!("failed to launch device thread: {err}"))),
            };
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    tracing::warn!(device = id, %phase, iteration, error = %err, "device phase failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}
