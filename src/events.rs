use std::sync::Arc;

pub const META_STATUS: u8 = 0xFF;
pub const ALL_SOUND_OFF: u8 = 120;
pub const MIDI_CHANNELS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaEventType {
    SequenceNumber,
    Text,
    Copyright,
    TrackName,
    InstrumentName,
    Lyric,
    Marker,
    CuePoint,
    ChannelPrefix,
    EndOfTrack,
    TempoChange,
    SmpteOffset,
    TimeSignature,
    KeySignature,
    SequencerSpecific,
    Unknown(u8),
}

impl From<u8> for MetaEventType {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => MetaEventType::SequenceNumber,
            0x01 => MetaEventType::Text,
            0x02 => MetaEventType::Copyright,
            0x03 => MetaEventType::TrackName,
            0x04 => MetaEventType::InstrumentName,
            0x05 => MetaEventType::Lyric,
            0x06 => MetaEventType::Marker,
            0x07 => MetaEventType::CuePoint,
            0x20 => MetaEventType::ChannelPrefix,
            0x2F => MetaEventType::EndOfTrack,
            0x51 => MetaEventType::TempoChange,
            0x54 => MetaEventType::SmpteOffset,
            0x58 => MetaEventType::TimeSignature,
            0x59 => MetaEventType::KeySignature,
            0x7F => MetaEventType::SequencerSpecific,
            other => MetaEventType::Unknown(other),
        }
    }
}

/// An encoded MIDI message as produced by the track source.
///
/// Meta events keep their file encoding: `FF <type> <len> <data..>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiMessage {
    data: Vec<u8>,
}

impl MidiMessage {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn note_on(channel: u8, pitch: u8, velocity: u8) -> Self {
        Self::from_bytes([0x90 | (channel & 0x0F), pitch & 0x7F, velocity & 0x7F])
    }

    pub fn note_off(channel: u8, pitch: u8) -> Self {
        Self::from_bytes([0x80 | (channel & 0x0F), pitch & 0x7F, 0])
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::from_bytes([0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F])
    }

    pub fn all_sound_off(channel: u8) -> Self {
        Self::control_change(channel, ALL_SOUND_OFF, 0)
    }

    /// Tempo meta event carrying microseconds per quarter note (24-bit).
    pub fn tempo(microseconds_per_quarter: u32) -> Self {
        let us = microseconds_per_quarter.min(0x00FF_FFFF);
        Self::from_bytes([
            META_STATUS,
            0x51,
            0x03,
            (us >> 16) as u8,
            (us >> 8) as u8,
            us as u8,
        ])
    }

    pub fn tempo_from_bpm(bpm: f64) -> Self {
        Self::tempo((60_000_000.0 / bpm).round() as u32)
    }

    pub fn meta(kind: u8, payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(payload.len() + 3);
        data.push(META_STATUS);
        data.push(kind);
        data.push(payload.len().min(0x7F) as u8);
        data.extend_from_slice(payload);
        Self { data }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn status(&self) -> Option<u8> {
        self.data.first().copied().filter(|b| *b >= 0x80)
    }

    pub fn channel(&self) -> Option<u8> {
        self.status()
            .filter(|_| self.is_channel_voice())
            .map(|s| s & 0x0F)
    }

    pub fn is_channel_voice(&self) -> bool {
        matches!(self.status(), Some(0x80..=0xEF))
    }

    pub fn is_meta_event(&self) -> bool {
        self.status() == Some(META_STATUS)
    }

    pub fn meta_subtype(&self) -> Option<MetaEventType> {
        if !self.is_meta_event() {
            return None;
        }
        self.data.get(1).map(|b| MetaEventType::from(*b))
    }

    pub fn is_tempo_change(&self) -> bool {
        self.meta_subtype() == Some(MetaEventType::TempoChange)
    }

    /// Microseconds per quarter note for a tempo meta event.
    pub fn tempo_microseconds(&self) -> Option<u32> {
        if !self.is_tempo_change() {
            return None;
        }
        let payload = self.data.get(3..6)?;
        Some(u32::from(payload[0]) << 16 | u32::from(payload[1]) << 8 | u32::from(payload[2]))
    }

    /// `None` for non-tempo messages and for a zero payload.
    pub fn tempo_bpm(&self) -> Option<f64> {
        match self.tempo_microseconds()? {
            0 => None,
            us => Some(60_000_000.0 / us as f64),
        }
    }
}

/// One event of a track as handed over by the track source.
#[derive(Debug, Clone)]
pub struct TrackEvent {
    /// Ticks since the previous event in the same track.
    pub delta: u32,
    pub message: Arc<MidiMessage>,
}

impl TrackEvent {
    pub fn new(delta: u32, message: MidiMessage) -> Self {
        Self {
            delta,
            message: Arc::new(message),
        }
    }
}

/// An event placed on the global timeline.
#[derive(Debug, Clone)]
pub struct PlaybackEvent {
    pub tick: u64,
    pub track: usize,
    pub message: Arc<MidiMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerNotification {
    Started,
    Looped,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_channel_voice_and_meta() {
        let on = MidiMessage::note_on(3, 60, 100);
        assert!(on.is_channel_voice());
        assert_eq!(on.status(), Some(0x93));
        assert_eq!(on.channel(), Some(3));
        assert!(!on.is_meta_event());

        let name = MidiMessage::meta(0x03, b"Piano");
        assert!(name.is_meta_event());
        assert!(!name.is_channel_voice());
        assert_eq!(name.meta_subtype(), Some(MetaEventType::TrackName));
        assert_eq!(name.channel(), None);
    }

    #[test]
    fn decodes_tempo_payload() {
        let tempo = MidiMessage::tempo(500_000);
        assert_eq!(tempo.bytes(), &[0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        assert_eq!(tempo.tempo_microseconds(), Some(500_000));
        assert_eq!(tempo.tempo_bpm(), Some(120.0));

        assert_eq!(MidiMessage::tempo(0).tempo_bpm(), None);
        assert_eq!(MidiMessage::note_on(0, 60, 1).tempo_bpm(), None);
    }

    #[test]
    fn truncated_tempo_is_rejected() {
        let short = MidiMessage::from_bytes([0xFF, 0x51, 0x03, 0x07]);
        assert!(short.is_tempo_change());
        assert_eq!(short.tempo_microseconds(), None);
    }

    #[test]
    fn data_byte_has_no_status() {
        let msg = MidiMessage::from_bytes([0x40, 0x7F]);
        assert_eq!(msg.status(), None);
        assert!(!msg.is_channel_voice());
    }
}
