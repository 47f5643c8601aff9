use crate::sensor::direction::Direction;
use crate::sensor::orientation_source::RawOrientation;
use crate::sensor::sensor_config::SensorConfig;
use tilt_core::Vector2;

/// Changes produced by one filter step. `None` means "unchanged".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilterOutput {
    pub vector: Option<Vector2>,
    pub direction: Option<Direction>,
}

impl FilterOutput {
    pub fn is_empty(&self) -> bool {
        self.vector.is_none() && self.direction.is_none()
    }
}

/// Turns raw orientation readings into a bounded, calibrated vector.
///
/// Per sample: subtract the baseline, smooth, clamp and normalise, apply the
/// dead zone, then classify. Only differences from the last emitted value are
/// reported, so a steady reading produces nothing.
#[derive(Debug, Clone)]
pub struct MotionFilter {
    config: SensorConfig,
    baseline: RawOrientation,
    // Smoothed tilt in degrees, relative to the baseline.
    smoothed: Vector2,
    last_vector: Vector2,
    last_direction: Direction,
}

impl MotionFilter {
    pub fn new(config: SensorConfig) -> Self {
        Self {
            config,
            baseline: RawOrientation::default(),
            smoothed: Vector2::ZERO,
            last_vector: Vector2::ZERO,
            last_direction: Direction::Still,
        }
    }

    pub fn baseline(&self) -> RawOrientation {
        self.baseline
    }

    pub fn vector(&self) -> Vector2 {
        self.last_vector
    }

    pub fn direction(&self) -> Direction {
        self.last_direction
    }

    pub fn process(&mut self, raw: RawOrientation) -> FilterOutput {
        // Top edge tilting away from the player (beta decreasing) is forward.
        let rel = Vector2::new(
            raw.gamma - self.baseline.gamma,
            self.baseline.beta - raw.beta,
        );

        let alpha = self.config.smoothing_factor.clamp(0.0, 1.0);
        self.smoothed = Vector2::new(
            alpha * self.smoothed.x + (1.0 - alpha) * rel.x,
            alpha * self.smoothed.y + (1.0 - alpha) * rel.y,
        );

        let vector = self.normalise(self.smoothed);
        let direction = Direction::classify(vector, self.config.movement_threshold);
        self.emit(vector, direction)
    }

    /// Install a new baseline and restart smoothing from rest.
    pub fn recalibrate(&mut self, baseline: RawOrientation) -> FilterOutput {
        self.baseline = baseline;
        self.smoothed = Vector2::ZERO;
        self.emit(Vector2::ZERO, Direction::Still)
    }

    fn normalise(&self, tilt: Vector2) -> Vector2 {
        let max = self.config.max_threshold.abs().max(f64::EPSILON);
        let axis = |v: f64| quantise(v.clamp(-max, max) / max);
        let vector = Vector2::new(axis(tilt.x), axis(tilt.y));
        if vector.magnitude() < self.config.dead_zone {
            Vector2::ZERO
        } else {
            vector
        }
    }

    fn emit(&mut self, vector: Vector2, direction: Direction) -> FilterOutput {
        let mut out = FilterOutput::default();
        if vector != self.last_vector {
            self.last_vector = vector;
            out.vector = Some(vector);
        }
        if direction != self.last_direction {
            self.last_direction = direction;
            out.direction = Some(direction);
        }
        out
    }
}

// Two decimals, and never a negative zero on the wire.
fn quantise(v: f64) -> f64 {
    let q = (v * 100.0).round() / 100.0;
    if q == 0.0 { 0.0 } else { q }
}
