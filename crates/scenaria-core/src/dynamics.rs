//! Transition dynamics: how an action moves a value from its start to its
//! target.
//!
//! [`interpolate`] is a pure shape function. [`Ramp`] couples it with a
//! domain (time, distance or rate) and the baseline captured when the
//! action started; the action runtime samples a ramp once per tick.

use std::f64::consts::PI;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ScenarioError, ScenarioResult};
use crate::id::normalize_tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DynamicsShape {
    #[default]
    Step,
    Linear,
    Cubic,
    Sinusoidal,
}

impl FromStr for DynamicsShape {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "step" => Ok(DynamicsShape::Step),
            "linear" => Ok(DynamicsShape::Linear),
            "cubic" => Ok(DynamicsShape::Cubic),
            "sinusoidal" => Ok(DynamicsShape::Sinusoidal),
            _ => Err(ScenarioError::unknown_kind("dynamics shape", s)),
        }
    }
}

/// Interpolate between `from` and `to` at `fraction` along the shape.
///
/// `fraction` is not clamped here; callers keep it in `[0, 1]`.
pub fn interpolate(shape: DynamicsShape, from: f64, to: f64, fraction: f64) -> f64 {
    let k = match shape {
        DynamicsShape::Step => return to,
        DynamicsShape::Linear => fraction,
        DynamicsShape::Cubic => fraction * fraction * (3.0 - 2.0 * fraction),
        DynamicsShape::Sinusoidal => (1.0 - (PI * fraction).cos()) / 2.0,
    };
    from + (to - from) * k
}

/// What a transition is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DynamicsDomain {
    /// Applied at once, completes on the start tick.
    Instant,
    /// Seconds of simulated time.
    Time(f64),
    /// Metres travelled by the actor.
    Distance(f64),
    /// Units per second toward the target.
    Rate(f64),
}

/// Shape plus optional time/distance/rate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dynamics {
    pub shape: DynamicsShape,
    pub time: Option<f64>,
    pub distance: Option<f64>,
    pub rate: Option<f64>,
}

impl Dynamics {
    pub fn step() -> Self {
        Self::default()
    }

    pub fn timed(shape: DynamicsShape, time: f64) -> Self {
        Self {
            shape,
            time: Some(time),
            ..Self::default()
        }
    }

    pub fn over_distance(shape: DynamicsShape, distance: f64) -> Self {
        Self {
            shape,
            distance: Some(distance),
            ..Self::default()
        }
    }

    pub fn at_rate(shape: DynamicsShape, rate: f64) -> Self {
        Self {
            shape,
            rate: Some(rate),
            ..Self::default()
        }
    }

    /// Pick the domain this transition runs in. Time wins over distance,
    /// distance over rate. Step without a time is instant.
    pub fn domain(&self, action: &str) -> ScenarioResult<DynamicsDomain> {
        if self.shape == DynamicsShape::Step {
            return Ok(match self.time {
                Some(t) if t > 0.0 => DynamicsDomain::Time(t),
                _ => DynamicsDomain::Instant,
            });
        }
        let invalid = |reason: String| ScenarioError::InvalidDynamics {
            action: action.to_string(),
            reason,
        };
        if let Some(t) = self.time {
            return if t > 0.0 {
                Ok(DynamicsDomain::Time(t))
            } else {
                Err(invalid(format!("time must be positive, got {t}")))
            };
        }
        if let Some(d) = self.distance {
            return if d > 0.0 {
                Ok(DynamicsDomain::Distance(d))
            } else {
                Err(invalid(format!("distance must be positive, got {d}")))
            };
        }
        if let Some(r) = self.rate {
            return if r > 0.0 {
                Ok(DynamicsDomain::Rate(r))
            } else {
                Err(invalid(format!("rate must be positive, got {r}")))
            };
        }
        Err(invalid(format!("{:?} shape needs a time, distance or rate", self.shape)))
    }
}

// ---------------------------------------------------------------------------
// Ramp
// ---------------------------------------------------------------------------

/// A transition in flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub shape: DynamicsShape,
    pub from: f64,
    pub to: f64,
    domain: DynamicsDomain,
    start_time: f64,
    start_distance: f64,
}

impl Ramp {
    /// Start a ramp at `start_time` (elapsed seconds) with the actor having
    /// travelled `start_distance`. A rate is turned into the time it takes
    /// to cover `|to - from|`.
    pub fn new(
        shape: DynamicsShape,
        domain: DynamicsDomain,
        from: f64,
        to: f64,
        start_time: f64,
        start_distance: f64,
    ) -> Self {
        let domain = match domain {
            DynamicsDomain::Rate(rate) => DynamicsDomain::Time((to - from).abs() / rate),
            other => other,
        };
        Self {
            shape,
            from,
            to,
            domain,
            start_time,
            start_distance,
        }
    }

    pub fn domain(&self) -> DynamicsDomain {
        self.domain
    }

    /// Signed change this ramp applies.
    pub fn span(&self) -> f64 {
        self.to - self.from
    }

    /// Value at the given clock/odometer reading, and whether the ramp has
    /// finished. A finished ramp always yields `to`.
    pub fn sample(&self, elapsed: f64, distance: f64) -> (f64, bool) {
        let (progress, length) = match self.domain {
            DynamicsDomain::Instant => return (self.to, true),
            DynamicsDomain::Time(t) => (elapsed - self.start_time, t),
            DynamicsDomain::Distance(d) => (distance - self.start_distance, d),
            // Converted in `new`.
            DynamicsDomain::Rate(_) => return (self.to, true),
        };
        if length <= 0.0 || progress > length {
            return (self.to, true);
        }
        let fraction = (progress / length).clamp(0.0, 1.0);
        (interpolate(self.shape, self.from, self.to, fraction), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn shape_endpoints() {
        for shape in [
            DynamicsShape::Linear,
            DynamicsShape::Cubic,
            DynamicsShape::Sinusoidal,
        ] {
            assert_relative_eq!(interpolate(shape, 2.0, 10.0, 0.0), 2.0, epsilon = 1e-12);
            assert_relative_eq!(interpolate(shape, 2.0, 10.0, 1.0), 10.0, epsilon = 1e-12);
            assert_relative_eq!(interpolate(shape, 2.0, 10.0, 0.5), 6.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn step_ignores_fraction() {
        assert_eq!(interpolate(DynamicsShape::Step, 0.0, 20.0, 0.0), 20.0);
        assert_eq!(interpolate(DynamicsShape::Step, 0.0, 20.0, 0.3), 20.0);
    }

    #[test]
    fn cubic_eases_in() {
        let linear = interpolate(DynamicsShape::Linear, 0.0, 1.0, 0.1);
        let cubic = interpolate(DynamicsShape::Cubic, 0.0, 1.0, 0.1);
        assert!(cubic < linear);
    }

    #[test]
    fn parse_shapes() {
        assert_eq!("linear".parse::<DynamicsShape>().unwrap(), DynamicsShape::Linear);
        assert_eq!("Sinusoidal".parse::<DynamicsShape>().unwrap(), DynamicsShape::Sinusoidal);
        let err = "bouncy".parse::<DynamicsShape>().unwrap_err();
        assert!(err.is_definition_error());
    }

    #[test]
    fn domain_preference() {
        let d = Dynamics {
            shape: DynamicsShape::Linear,
            time: Some(2.0),
            distance: Some(50.0),
            rate: None,
        };
        assert_eq!(d.domain("a").unwrap(), DynamicsDomain::Time(2.0));
        let d = Dynamics {
            time: None,
            ..d
        };
        assert_eq!(d.domain("a").unwrap(), DynamicsDomain::Distance(50.0));
        assert_eq!(Dynamics::step().domain("a").unwrap(), DynamicsDomain::Instant);
    }

    #[test]
    fn missing_domain_is_definition_error() {
        let d = Dynamics {
            shape: DynamicsShape::Cubic,
            ..Dynamics::default()
        };
        let err = d.domain("Accelerate").unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidDynamics { ref action, .. } if action == "Accelerate"));
        assert!(Dynamics::timed(DynamicsShape::Linear, 0.0).domain("a").is_err());
    }

    #[test]
    fn timed_ramp_completes_after_time() {
        let ramp = Ramp::new(DynamicsShape::Linear, DynamicsDomain::Time(2.0), 10.0, 20.0, 1.0, 0.0);
        assert_eq!(ramp.sample(1.0, 0.0), (10.0, false));
        assert_eq!(ramp.sample(2.0, 0.0), (15.0, false));
        assert_eq!(ramp.sample(3.0, 0.0), (20.0, false));
        assert_eq!(ramp.sample(3.5, 0.0), (20.0, true));
    }

    #[test]
    fn rate_becomes_time() {
        let ramp = Ramp::new(DynamicsShape::Linear, DynamicsDomain::Rate(2.0), 20.0, 10.0, 0.0, 0.0);
        assert_eq!(ramp.domain(), DynamicsDomain::Time(5.0));
        assert_eq!(ramp.span(), -10.0);
        let (v, done) = ramp.sample(2.5, 0.0);
        assert_relative_eq!(v, 15.0);
        assert!(!done);
    }

    #[test]
    fn distance_ramp_uses_odometer() {
        let ramp =
            Ramp::new(DynamicsShape::Linear, DynamicsDomain::Distance(100.0), 0.0, 1.0, 0.0, 50.0);
        assert_eq!(ramp.sample(99.0, 50.0), (0.0, false));
        let (v, _) = ramp.sample(0.0, 100.0);
        assert_relative_eq!(v, 0.5);
        assert_eq!(ramp.sample(0.0, 151.0), (1.0, true));
    }

    #[test]
    fn zero_length_rate_ramp_is_immediate() {
        let ramp = Ramp::new(DynamicsShape::Linear, DynamicsDomain::Rate(1.0), 5.0, 5.0, 0.0, 0.0);
        assert_eq!(ramp.sample(0.0, 0.0), (5.0, true));
    }
}
