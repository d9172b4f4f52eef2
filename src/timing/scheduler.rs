use super::EventList;
use crate::events::PlaybackEvent;

/// K-way merge over per-track event lists.
///
/// Each call to [`MergeScheduler::next`] scans every track's cursor and
/// returns the earliest pending event. Events sharing a tick are returned in
/// track index order.
#[derive(Debug, Clone)]
pub struct MergeScheduler {
    cursors: Vec<usize>,
}

impl MergeScheduler {
    pub fn new(track_count: usize) -> Self {
        Self {
            cursors: vec![0; track_count],
        }
    }

    pub fn next<'a>(&self, tracks: &'a [EventList]) -> Option<&'a PlaybackEvent> {
        let mut next: Option<&PlaybackEvent> = None;
        for (track, cursor) in tracks.iter().zip(&self.cursors) {
            let Some(candidate) = track.get(*cursor) else {
                continue;
            };
            // Strict comparison keeps the lowest track index on ties.
            if next.is_none_or(|best| candidate.tick < best.tick) {
                next = Some(candidate);
            }
        }
        next
    }

    pub fn advance(&mut self, track: usize) {
        if let Some(cursor) = self.cursors.get_mut(track) {
            *cursor += 1;
        }
    }

    pub fn reset(&mut self) {
        self.cursors.fill(0);
    }

    pub fn is_exhausted(&self, tracks: &[EventList]) -> bool {
        self.next(tracks).is_none()
    }
}
