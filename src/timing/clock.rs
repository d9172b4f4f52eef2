use std::time::Duration;

use crate::error::TimingError;

fn validate_ticks_per_beat(ticks_per_beat: f64) -> Result<f64, TimingError> {
    if ticks_per_beat.is_finite() && ticks_per_beat > 0.0 {
        Ok(ticks_per_beat)
    } else {
        Err(TimingError::InvalidTicksPerBeat(ticks_per_beat))
    }
}

fn validate_bpm(bpm: f64) -> Result<f64, TimingError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(TimingError::InvalidTempo(bpm))
    }
}

/// Converts ticks to wall time under a tempo that may change mid-sequence.
///
/// Times are measured from the start of the current playback pass. After a
/// tempo change every conversion is relative to the tick and time at which
/// that change happened, so each segment keeps the tempo it started with.
#[derive(Debug, Clone)]
pub struct TempoClock {
    ticks_per_beat: f64,
    bpm: f64,
    initial_bpm: f64,
    anchor_tick: u64,
    anchor_time: Duration,
}

impl TempoClock {
    pub fn new(ticks_per_beat: f64, bpm: f64) -> Result<Self, TimingError> {
        let ticks_per_beat = validate_ticks_per_beat(ticks_per_beat)?;
        let bpm = validate_bpm(bpm)?;
        Ok(Self {
            ticks_per_beat,
            bpm,
            initial_bpm: bpm,
            anchor_tick: 0,
            anchor_time: Duration::ZERO,
        })
    }

    pub fn ticks_per_beat(&self) -> f64 {
        self.ticks_per_beat
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn ticks_to_seconds(&self, relative_ticks: f64) -> f64 {
        let beats = relative_ticks / self.ticks_per_beat;
        beats / (self.bpm / 60.0)
    }

    pub fn seconds_to_ticks(&self, seconds: f64) -> f64 {
        let ticks_per_second = (self.bpm * self.ticks_per_beat) / 60.0;
        ticks_per_second * seconds
    }

    /// Wall time at which `tick` is due, measured from the pass origin.
    ///
    /// Ticks before the current anchor are due at the anchor time; the merge
    /// order never asks for one. Extreme tempo settings can push a tick past
    /// what a `Duration` holds, which is reported as `DurationOverflow`.
    pub fn due_time(&self, tick: u64) -> Result<Duration, TimingError> {
        let relative = tick.saturating_sub(self.anchor_tick) as f64;
        Duration::try_from_secs_f64(self.ticks_to_seconds(relative))
            .ok()
            .and_then(|offset| self.anchor_time.checked_add(offset))
            .ok_or(TimingError::DurationOverflow { tick })
    }

    pub fn apply_tempo_change(
        &mut self,
        new_bpm: f64,
        at_tick: u64,
        at_time: Duration,
    ) -> Result<(), TimingError> {
        self.bpm = validate_bpm(new_bpm)?;
        self.anchor_tick = at_tick;
        self.anchor_time = at_time;
        Ok(())
    }

    /// Back to the load-time tempo with the anchor at tick zero.
    pub fn reset(&mut self) {
        self.bpm = self.initial_bpm;
        self.anchor_tick = 0;
        self.anchor_time = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn rejects_invalid_configuration() {
        assert_eq!(
            TempoClock::new(0.0, 120.0).unwrap_err(),
            TimingError::InvalidTicksPerBeat(0.0)
        );
        assert_eq!(
            TempoClock::new(480.0, -1.0).unwrap_err(),
            TimingError::InvalidTempo(-1.0)
        );
        assert!(TempoClock::new(f64::NAN, 120.0).is_err());
        assert!(TempoClock::new(480.0, f64::INFINITY).is_err());
    }

    #[test]
    fn one_beat_at_120_bpm_is_half_a_second() {
        let clock = TempoClock::new(480.0, 120.0).unwrap();
        assert!((clock.ticks_to_seconds(480.0) - 0.5).abs() < EPSILON);
        assert!((clock.ticks_to_seconds(1920.0) - 2.0).abs() < EPSILON);
        assert_eq!(clock.due_time(960).unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn conversions_are_inverse() {
        let clock = TempoClock::new(96.0, 137.5).unwrap();
        for ticks in [0.0, 1.0, 95.0, 96.0, 1234.0, 99_999.0] {
            let back = clock.seconds_to_ticks(clock.ticks_to_seconds(ticks));
            assert!((back - ticks).abs() < 1e-6, "{ticks} -> {back}");
        }
    }

    #[test]
    fn tempo_change_is_piecewise() {
        let mut clock = TempoClock::new(480.0, 120.0).unwrap();
        let change_tick = 960;
        let before = clock.due_time(480).unwrap();
        let at_change = clock.due_time(change_tick).unwrap();
        let old_rate = clock.due_time(change_tick + 480).unwrap() - at_change;

        clock.apply_tempo_change(60.0, change_tick, at_change).unwrap();

        // Ticks up to the change keep their old times.
        assert_eq!(clock.due_time(change_tick).unwrap(), at_change);
        assert_eq!(before, Duration::from_millis(500));

        // After the change one beat takes twice as long.
        let new_rate = clock.due_time(change_tick + 480).unwrap() - at_change;
        assert_eq!(new_rate, old_rate * 2);
        assert_eq!(clock.due_time(change_tick + 480).unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn invalid_tempo_change_keeps_previous_state() {
        let mut clock = TempoClock::new(480.0, 120.0).unwrap();
        assert!(clock.apply_tempo_change(0.0, 10, Duration::from_secs(1)).is_err());
        assert_eq!(clock.bpm(), 120.0);
        assert_eq!(clock.due_time(480).unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn overflowing_due_time_is_an_error() {
        let clock = TempoClock::new(1e-300, 120.0).unwrap();
        assert_eq!(clock.due_time(0).unwrap(), Duration::ZERO);
        assert_eq!(
            clock.due_time(1).unwrap_err(),
            TimingError::DurationOverflow { tick: 1 }
        );

        // The slowest tempo a meta event can express.
        let mut clock = TempoClock::new(1e-19, 6000.0).unwrap();
        assert!(clock.due_time(1).is_ok());
        clock
            .apply_tempo_change(60_000_000.0 / 16_777_215.0, 0, Duration::ZERO)
            .unwrap();
        assert!(clock.due_time(1).is_err());
    }

    #[test]
    fn reset_restores_initial_tempo() {
        let mut clock = TempoClock::new(480.0, 120.0).unwrap();
        clock
            .apply_tempo_change(240.0, 480, Duration::from_millis(500))
            .unwrap();
        assert_eq!(clock.due_time(960).unwrap(), Duration::from_millis(750));
        clock.reset();
        assert_eq!(clock.bpm(), 120.0);
        assert_eq!(clock.due_time(960).unwrap(), Duration::from_secs(1));
    }
}
