//! Closed-form solution of the conversion reaction `A <=> B`.
//!
//! Mass-action kinetics with forward rate `k1` and backward rate `k2`:
//!
//! ```text
//! dA/dt = -k1*A + k2*B
//! dB/dt =  k1*A - k2*B
//! ```
//!
//! The total `A + B` is conserved, so each species relaxes exponentially
//! with rate `k1 + k2` towards its steady-state share of the total.

/// Amount of `A` at time `t`, starting from `(a0, b0)`.
pub fn conversion_a(t: f64, a0: f64, b0: f64, k1: f64, k2: f64) -> f64 {
    let steady = k2 * (a0 + b0) / (k1 + k2);
    steady + (a0 - steady) * (-(k1 + k2) * t).exp()
}

/// Amount of `B` at time `t`, starting from `(a0, b0)`.
pub fn conversion_b(t: f64, a0: f64, b0: f64, k1: f64, k2: f64) -> f64 {
    let steady = k1 * (a0 + b0) / (k1 + k2);
    steady + (b0 - steady) * (-(k1 + k2) * t).exp()
}
