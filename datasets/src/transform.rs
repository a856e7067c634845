//! Per-sequence preprocessing shared by the dataset adapters.

use ndarray::{Array, Array1, Array2, Array3, ArrayView1, ArrayView3, Axis, Dimension, s};

/// Below this magnitude a mean is treated as zero by `norm_scale`.
const MEAN_EPS: f32 = 1e-12;

/// Resamples `pose`, shaped `(T, J, D)`, to `target` frames.
///
/// Every coordinate series is smoothed with a 3-tap median filter and then linearly
/// interpolated, the first and last frames are kept as is.
pub fn zoom(pose: ArrayView3<f32>, target: usize) -> Array3<f32> {
    let (frames, joints, dims) = pose.dim();
    let mut out = Array3::zeros((target, joints, dims));

    if frames == 0 {
        return out;
    }

    for j in 0..joints {
        for d in 0..dims {
            let series = median3(pose.slice(s![.., j, d]));
            let resampled = interpolate(series.view(), target);
            out.slice_mut(s![.., j, d]).assign(&resampled);
        }
    }

    out
}

/// Replaces every value with the median of itself and its neighbours, edges repeat.
fn median3(x: ArrayView1<f32>) -> Array1<f32> {
    let n = x.len();

    Array1::from_shape_fn(n, |i| {
        let mut w = [x[i.saturating_sub(1)], x[i], x[(i + 1).min(n - 1)]];
        w.sort_by(f32::total_cmp);
        w[1]
    })
}

fn interpolate(x: ArrayView1<f32>, target: usize) -> Array1<f32> {
    let n = x.len();
    if n == 1 || target == 1 {
        return Array1::from_elem(target, x[0]);
    }

    let step = (n - 1) as f32 / (target - 1) as f32;

    Array1::from_shape_fn(target, |i| {
        let pos = i as f32 * step;
        let lo = (pos.floor() as usize).min(n - 1);
        let hi = (lo + 1).min(n - 1);
        let w = pos - lo as f32;
        x[lo] * (1. - w) + x[hi] * w
    })
}

/// Subtracts from the x and y coordinates their mean over every frame and joint.
pub fn center_xy(pose: &mut Array3<f32>) {
    let dims = pose.len_of(Axis(2)).min(2);

    for d in 0..dims {
        let mut axis = pose.slice_mut(s![.., .., d]);
        if let Some(mean) = axis.mean() {
            axis -= mean;
        }
    }
}

/// Normalizes `a` in place to `(a - mean) / mean`.
///
/// A zero mean only centers the values.
pub fn norm_scale<D: Dimension>(a: &mut Array<f32, D>) {
    let Some(mean) = a.mean() else {
        return;
    };

    if mean.abs() < MEAN_EPS {
        a.mapv_inplace(|x| x - mean);
    } else {
        a.mapv_inplace(|x| (x - mean) / mean);
    }
}

/// Computes the joint collection distances of `pose`, shaped `(T, J, D)`.
///
/// # Returns
/// The euclidean distance between every pair of joints `i < j` in every frame, shaped
/// `(T, J * (J - 1) / 2)` and normalized by `norm_scale`.
pub fn jcd(pose: ArrayView3<f32>) -> Array2<f32> {
    let (frames, joints, _) = pose.dim();
    let pairs: Vec<(usize, usize)> = (0..joints)
        .flat_map(|i| (i + 1..joints).map(move |j| (i, j)))
        .collect();

    let mut m = Array2::from_shape_fn((frames, pairs.len()), |(t, k)| {
        let (i, j) = pairs[k];
        let a = pose.slice(s![t, i, ..]);
        let b = pose.slice(s![t, j, ..]);
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f32>()
            .sqrt()
    });

    norm_scale(&mut m);
    m
}
