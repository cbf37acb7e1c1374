//! Loudness gain computation.

/// Gains smaller than this (in dB) are not worth a filter pass.
pub const GAIN_SNAP_DB: f64 = 0.5;

/// Gain in dB taking `measured` loudness to `target`.
///
/// A missing target (normalization off) and a missing measurement both yield
/// exactly `0.0`, as does any gain under [`GAIN_SNAP_DB`].
pub fn compute_gain(target: Option<f64>, measured: Option<f64>) -> f64 {
    let (Some(target), Some(measured)) = (target, measured) else {
        return 0.0;
    };
    let gain = target - measured;
    if !gain.is_finite() || gain.abs() < GAIN_SNAP_DB {
        return 0.0;
    }
    gain
}
