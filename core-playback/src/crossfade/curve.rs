//! Volume ramp shapes for crossfading
//!
//! Each curve maps normalized fade progress to a volume multiplier. The
//! controller applies the fade-out shape to the outgoing engine and the
//! fade-in shape to the incoming one on every ticker step.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Shape of the volume ramp applied during a crossfade.
///
/// - `Linear`: constant rate of change, precise and predictable
/// - `Exponential`: slow start, fast finish
/// - `Logarithmic`: fast start, slow finish
/// - `SCurve`: smooth acceleration and deceleration
/// - `EqualPower`: constant perceived loudness across the overlap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    #[default]
    Linear,
    Exponential,
    Logarithmic,
    SCurve,
    EqualPower,
}

impl FadeCurve {
    /// Volume multiplier for the incoming engine.
    ///
    /// `progress` runs 0.0 at the start of the fade to 1.0 at the end;
    /// out-of-range values are clamped. Returns 0.0 (silent) through 1.0
    /// (full volume).
    pub fn fade_in(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            // Inverted quadratic so the fade-in mirrors the fade-out shape.
            FadeCurve::Logarithmic => t.sqrt(),
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Volume multiplier for the outgoing engine.
    ///
    /// `progress` runs 0.0 at the start of the fade to 1.0 at the end;
    /// out-of-range values are clamped. Returns 1.0 (full volume) through
    /// 0.0 (silent).
    pub fn fade_out(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Exponential => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }
}
