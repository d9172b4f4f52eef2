use std::time::Duration;

use tracing::debug;

use super::TempoClock;
use crate::error::TimingError;
use crate::events::{PlaybackEvent, TrackEvent};

pub type EventList = Vec<PlaybackEvent>;

/// Places one track's delta-timed events on the absolute tick timeline.
///
/// Meta events are dropped except tempo changes, which stay in the list so
/// that they take effect when playback reaches them.
pub fn load_track(track: usize, events: &[TrackEvent]) -> Result<EventList, TimingError> {
    let mut tick: u64 = 0;
    let mut list = EventList::with_capacity(events.len());

    for event in events {
        tick += u64::from(event.delta);

        let message = &event.message;
        if message.is_meta_event() {
            if !message.is_tempo_change() {
                continue;
            }
            if message.tempo_bpm().is_none() {
                return Err(TimingError::InvalidTempoEvent { track, tick });
            }
        }

        list.push(PlaybackEvent {
            tick,
            track,
            message: message.clone(),
        });
    }

    Ok(list)
}

/// Everything one playback run needs, immutable once built.
#[derive(Debug, Clone)]
pub struct LoadedSequence {
    pub tracks: Vec<EventList>,
    pub ticks_per_beat: f64,
    pub initial_bpm: f64,
    pub length: Duration,
}

impl LoadedSequence {
    pub fn empty() -> Self {
        Self {
            tracks: Vec::new(),
            ticks_per_beat: 1.0,
            initial_bpm: 120.0,
            length: Duration::ZERO,
        }
    }

    pub fn load(
        tracks: &[Vec<TrackEvent>],
        ticks_per_beat: f64,
        initial_bpm: f64,
    ) -> Result<Self, TimingError> {
        let clock = TempoClock::new(ticks_per_beat, initial_bpm)?;

        let tracks = tracks
            .iter()
            .enumerate()
            .map(|(index, events)| load_track(index, events))
            .collect::<Result<Vec<_>, _>>()?;

        // Length uses the initial tempo only.
        let last_tick = tracks
            .iter()
            .filter_map(|list| list.last())
            .map(|event| event.tick)
            .max()
            .unwrap_or(0);
        let length = clock.due_time(last_tick)?;

        debug!(
            tracks = tracks.len(),
            events = tracks.iter().map(Vec::len).sum::<usize>(),
            last_tick,
            length_secs = length.as_secs_f64(),
            "sequence loaded"
        );

        Ok(Self {
            tracks,
            ticks_per_beat,
            initial_bpm,
            length,
        })
    }

    pub fn clock(&self) -> Result<TempoClock, TimingError> {
        TempoClock::new(self.ticks_per_beat, self.initial_bpm)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.iter().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MidiMessage;

    fn ticks(list: &EventList) -> Vec<u64> {
        list.iter().map(|e| e.tick).collect()
    }

    #[test]
    fn accumulates_deltas() {
        let events = vec![
            TrackEvent::new(0, MidiMessage::note_on(0, 60, 100)),
            TrackEvent::new(120, MidiMessage::note_off(0, 60)),
            TrackEvent::new(0, MidiMessage::note_on(0, 62, 100)),
            TrackEvent::new(240, MidiMessage::note_off(0, 62)),
        ];
        let list = load_track(2, &events).unwrap();
        assert_eq!(ticks(&list), vec![0, 120, 120, 360]);
        assert!(list.iter().all(|e| e.track == 2));
    }

    #[test]
    fn drops_meta_events_but_keeps_tempo() {
        let events = vec![
            TrackEvent::new(0, MidiMessage::meta(0x03, b"Lead")),
            TrackEvent::new(10, MidiMessage::note_on(0, 60, 100)),
            TrackEvent::new(10, MidiMessage::tempo(1_000_000)),
            TrackEvent::new(5, MidiMessage::meta(0x06, b"verse")),
            TrackEvent::new(5, MidiMessage::note_off(0, 60)),
            TrackEvent::new(0, MidiMessage::meta(0x2F, &[])),
        ];
        let list = load_track(0, &events).unwrap();

        // Dropped events still contribute their deltas.
        assert_eq!(ticks(&list), vec![10, 20, 30]);
        assert!(list[1].message.is_tempo_change());
        assert!(list.iter().all(|e| !e.message.is_meta_event() || e.message.is_tempo_change()));
    }

    #[test]
    fn rejects_zero_tempo_payload() {
        let events = vec![
            TrackEvent::new(48, MidiMessage::note_on(0, 60, 100)),
            TrackEvent::new(48, MidiMessage::tempo(0)),
        ];
        assert_eq!(
            load_track(1, &events).unwrap_err(),
            TimingError::InvalidTempoEvent { track: 1, tick: 96 }
        );
    }

    #[test]
    fn length_comes_from_longest_track() {
        let tracks = vec![
            vec![TrackEvent::new(480, MidiMessage::note_on(0, 60, 1))],
            vec![
                TrackEvent::new(960, MidiMessage::note_on(1, 60, 1)),
                TrackEvent::new(960, MidiMessage::note_off(1, 60)),
            ],
            vec![],
        ];
        let sequence = LoadedSequence::load(&tracks, 480.0, 120.0).unwrap();
        assert_eq!(sequence.tracks.len(), 3);
        assert_eq!(sequence.length, Duration::from_secs(2));
    }

    #[test]
    fn length_ignores_tempo_changes() {
        let tracks = vec![vec![
            TrackEvent::new(0, MidiMessage::tempo(1_000_000)),
            TrackEvent::new(960, MidiMessage::note_on(0, 60, 1)),
        ]];
        let sequence = LoadedSequence::load(&tracks, 480.0, 120.0).unwrap();
        assert_eq!(sequence.length, Duration::from_secs(1));
    }

    #[test]
    fn load_validates_tempo_configuration() {
        assert!(LoadedSequence::load(&[], 0.0, 120.0).is_err());
        assert!(LoadedSequence::load(&[], 480.0, 0.0).is_err());
        assert!(LoadedSequence::load(&[], 480.0, 120.0).unwrap().is_empty());
    }

    #[test]
    fn length_beyond_duration_range_is_rejected() {
        let tracks = vec![vec![TrackEvent::new(1, MidiMessage::note_on(0, 60, 100))]];
        assert_eq!(
            LoadedSequence::load(&tracks, 1e-300, 120.0).unwrap_err(),
            TimingError::DurationOverflow { tick: 1 }
        );
    }
}
