use std::{
    ops::{Deref, DerefMut},
    time::Instant,
};

use log::{info, warn};
use machine_learning::{
    MlErr,
    arch::Model,
    dataset::TensorDataset,
    device::{Backend, Device},
};

use crate::Result;

/// Binds a model to a device for as long as the guard lives.
///
/// The model goes back to the device it was resident on when the guard is dropped, whether the
/// scope ends normally or through an early return.
pub struct DeviceGuard<'m, M: Model + ?Sized> {
    model: &'m mut M,
    original: Device,
}

impl<'m, M: Model + ?Sized> DeviceGuard<'m, M> {
    pub fn bind(model: &'m mut M, device: &Device) -> Self {
        let original = model.device().clone();
        model.to_device(device.clone());

        Self { model, original }
    }
}

impl<M: Model + ?Sized> Deref for DeviceGuard<'_, M> {
    type Target = M;

    fn deref(&self) -> &Self::Target {
        &*self.model
    }
}

impl<M: Model + ?Sized> DerefMut for DeviceGuard<'_, M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.model
    }
}

impl<M: Model + ?Sized> Drop for DeviceGuard<'_, M> {
    fn drop(&mut self) {
        self.model.to_device(std::mem::take(&mut self.original));
    }
}

/// The inference latency measured on one backend.
#[derive(Debug, Clone, PartialEq)]
pub enum TimingReport {
    Measured {
        backend: String,
        total_ns: u128,
        invocations: usize,
        ns_per_example: f64,
    },
    Skipped {
        backend: &'static str,
        reason: String,
    },
}

impl TimingReport {
    pub fn invocations(&self) -> usize {
        match self {
            TimingReport::Measured { invocations, .. } => *invocations,
            TimingReport::Skipped { .. } => 0,
        }
    }
}

/// Measures the per example inference latency of `model` on every candidate backend.
///
/// # Arguments
/// * `model` - The trained model, resident on the same device once this returns.
/// * `test` - The examples to score one by one.
/// * `candidates` - Every backend to measure and the device it was resolved to, a backend that
///   couldn't be brought up is skipped.
pub fn time_inference<M, I>(
    model: &mut M,
    test: &TensorDataset,
    candidates: I,
) -> Result<Vec<TimingReport>>
where
    M: Model + ?Sized,
    I: IntoIterator<Item = (Backend, machine_learning::Result<Device>)>,
{
    let mut reports = Vec::new();

    for (backend, device) in candidates {
        let report = match device {
            Ok(device) => time_on(model, test, &device)?,
            Err(e) => skipped(backend, e),
        };

        reports.push(report);
    }

    Ok(reports)
}

fn skipped(backend: Backend, e: MlErr) -> TimingReport {
    warn!("skipping timing on {}: {e}", backend.name());

    TimingReport::Skipped {
        backend: backend.name(),
        reason: e.to_string(),
    }
}

/// Warms `device` up with the whole test set, then scores every example on its own.
fn time_on<M: Model + ?Sized>(
    model: &mut M,
    test: &TensorDataset,
    device: &Device,
) -> Result<TimingReport> {
    info!("timing inference on {device}");

    let model = DeviceGuard::bind(model, device);
    let inputs = test.full().to_device(device);

    model.infer(&inputs)?;
    device.synchronize();

    let examples: Vec<_> = (0..inputs.len()).filter_map(|i| inputs.example(i)).collect();
    let mut invocations = 0;

    let start = Instant::now();
    for example in &examples {
        model.infer(example)?;
        device.synchronize();
        invocations += 1;
    }
    let total_ns = start.elapsed().as_nanos();

    let ns_per_example = total_ns as f64 / invocations.max(1) as f64;
    info!("Total {total_ns}ns, {ns_per_example:.2}ns per one on {device}");

    Ok(TimingReport::Measured {
        backend: device.to_string(),
        total_ns,
        invocations,
        ns_per_example,
    })
}
