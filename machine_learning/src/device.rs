use std::{fmt, sync::Arc, thread};

use log::info;
use ndarray::Array1;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{MlErr, Result};

/// The kind of compute backend a `Device` dispatches work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Runs everything on the calling thread.
    Cpu,
    /// Runs everything inside a dedicated rayon thread pool.
    Parallel,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Parallel => "parallel",
        }
    }
}

/// A compute backend tensors and models can be resident on.
///
/// Cloning a `Device` is cheap, every clone shares the same thread pool. Two devices are equal
/// only if they dispatch to the very same pool.
#[derive(Clone)]
pub struct Device {
    backend: Backend,
    pool: Option<Arc<ThreadPool>>,
}

impl Device {
    /// Returns the host device.
    pub fn cpu() -> Self {
        Self {
            backend: Backend::Cpu,
            pool: None,
        }
    }

    /// Creates a new parallel device.
    ///
    /// # Arguments
    /// * `threads` - The amount of threads in the pool, `0` uses every available core.
    ///
    /// # Returns
    /// The new device or `MlErr::BackendUnavailable` if the machine can't host it.
    pub fn parallel(threads: usize) -> Result<Self> {
        let threads = match threads {
            0 => thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };

        if threads < 2 {
            return Err(MlErr::BackendUnavailable {
                backend: Backend::Parallel.name(),
                reason: format!("it needs at least 2 threads, {threads} available"),
            });
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("parallel-backend-{i}"))
            .build()
            .map_err(|e| MlErr::BackendUnavailable {
                backend: Backend::Parallel.name(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            backend: Backend::Parallel,
            pool: Some(Arc::new(pool)),
        })
    }

    /// Creates a parallel device and checks it can actually run work.
    ///
    /// The scratch tensor used for the check is released before returning.
    pub fn probe(threads: usize) -> Result<Self> {
        let device = Self::parallel(threads)?;

        let scratch = device.run(|| Array1::<f32>::ones(1) + 1.0);
        let healthy = scratch[0] == 2.0;
        drop(scratch);

        if !healthy {
            return Err(MlErr::BackendUnavailable {
                backend: Backend::Parallel.name(),
                reason: "initialization test produced a wrong result".into(),
            });
        }

        info!("backend initialization test - tensor is on: {device}");
        Ok(device)
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn is_accelerator(&self) -> bool {
        self.pool.is_some()
    }

    /// Returns the amount of threads work is spread across.
    pub fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, |pool| pool.current_num_threads())
    }

    /// Runs `f` on this device, blocking until it returns.
    pub fn run<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// Blocks until every thread of the device has drained its queued work.
    pub fn synchronize(&self) {
        if let Some(pool) = &self.pool {
            pool.broadcast(|_| ());
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        match (&self.pool, &other.pool) {
            (None, None) => self.backend == other.backend,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Device {}

impl Default for Device {
    fn default() -> Self {
        Self::cpu()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.backend {
            Backend::Cpu => write!(f, "cpu"),
            Backend::Parallel => write!(f, "parallel:{}", self.threads()),
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_devices_are_equal() {
        assert_eq!(Device::cpu(), Device::cpu());
        assert!(!Device::cpu().is_accelerator());
        assert_eq!(Device::cpu().threads(), 1);
    }

    #[test]
    fn parallel_device_needs_two_threads() {
        let err = Device::parallel(1).unwrap_err();
        assert!(matches!(err, MlErr::BackendUnavailable { .. }));
    }

    #[test]
    fn parallel_devices_compare_by_pool() {
        let a = Device::parallel(2).unwrap();
        let b = Device::parallel(2).unwrap();

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a, Device::cpu());
        assert_eq!(a.to_string(), "parallel:2");
    }

    #[test]
    fn run_executes_inside_the_pool() {
        let device = Device::parallel(2).unwrap();
        let inside = device.run(|| rayon::current_thread_index().is_some());
        device.synchronize();

        assert!(inside);
        assert!(Device::cpu().run(|| rayon::current_thread_index().is_none()));
    }
}
