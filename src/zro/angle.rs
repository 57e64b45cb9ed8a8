/// Degrees in a full turn.
pub const FULL_TURN: f64 = 360.0;

/// Wrap an angle into `[0, 360)`.
pub fn normalize_angle(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(FULL_TURN);
    // `rem_euclid` can round up to exactly 360 for tiny negative inputs.
    if normalized >= FULL_TURN {
        0.0
    } else {
        normalized
    }
}

/// Converts between azimuth in degrees and encoder ticks.
///
/// Tick 0 is the home sensor, which sits at `home_offset` degrees of azimuth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleConverter {
    ticks_per_turn: i32,
    home_offset: f64,
}

impl AngleConverter {
    /// `ticks_per_turn` must be positive; the dome configuration is validated before it gets here.
    pub const fn new(ticks_per_turn: i32, home_offset: f64) -> Self {
        Self {
            ticks_per_turn,
            home_offset,
        }
    }

    /// Encoder ticks in a full turn.
    pub const fn ticks_per_turn(&self) -> i32 {
        self.ticks_per_turn
    }

    /// Size of a single tick in degrees.
    pub fn resolution(&self) -> f64 {
        FULL_TURN / f64::from(self.ticks_per_turn)
    }

    /// Azimuth to the nearest tick in `[0, ticks_per_turn)`.
    pub fn degrees_to_ticks(&self, degrees: f64) -> i32 {
        let turns = normalize_angle(degrees - self.home_offset) / FULL_TURN;
        let ticks = (turns * f64::from(self.ticks_per_turn)).round();
        // `ticks` lies within `[0, ticks_per_turn]`.
        #[expect(clippy::as_conversions, clippy::cast_possible_truncation)]
        let ticks = ticks as i32;
        ticks.rem_euclid(self.ticks_per_turn)
    }

    /// Tick position to azimuth in `[0, 360)`.
    pub fn ticks_to_degrees(&self, ticks: i32) -> f64 {
        normalize_angle(
            f64::from(ticks) * FULL_TURN / f64::from(self.ticks_per_turn) + self.home_offset,
        )
    }
}
