use seqplay::{Config, MidiMessage, MidiPort, PlayerNotification, SequencePlayer, TrackEvent};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

const TICKS_PER_BEAT: u32 = 480;

/// A C major arpeggio over a held bass note, halving the tempo in bar two.
fn demo_tracks() -> Vec<Vec<TrackEvent>> {
    let eighth = TICKS_PER_BEAT / 2;

    let mut melody = Vec::new();
    for bar in 0..2 {
        for pitch in [60, 64, 67, 72, 67, 64, 60, 55] {
            melody.push(TrackEvent::new(0, MidiMessage::note_on(0, pitch, 90)));
            melody.push(TrackEvent::new(eighth, MidiMessage::note_off(0, pitch)));
        }
        if bar == 0 {
            melody.push(TrackEvent::new(0, MidiMessage::tempo_from_bpm(60.0)));
        }
    }

    let bass = vec![
        TrackEvent::new(0, MidiMessage::meta(0x03, b"Bass")),
        TrackEvent::new(0, MidiMessage::note_on(1, 36, 80)),
        TrackEvent::new(TICKS_PER_BEAT * 8, MidiMessage::note_off(1, 36)),
    ];

    vec![melody, bass]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seqplay=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };

    let port = MidiPort::open(&config.output)?;
    if let Some(info) = port.info() {
        info!(port = %info.name, "playing demo sequence");
    }

    let mut player = SequencePlayer::with_config(port, config.playback);
    let notifications = player.subscribe();
    player.load_multiple_tracks(&demo_tracks(), f64::from(TICKS_PER_BEAT), 120.0)?;
    info!(length_secs = player.length(), "demo loaded");

    player.start()?;
    for notification in notifications.iter() {
        match notification {
            PlayerNotification::Looped => info!("looping"),
            PlayerNotification::Stopped => break,
            PlayerNotification::Started => {}
        }
    }

    player.shutdown()?;
    Ok(())
}
