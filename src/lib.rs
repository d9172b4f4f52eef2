//! Real-time playback of multi-track MIDI sequences.
//!
//! Tracks of delta-timed events are placed on one absolute tick timeline,
//! merged across tracks and dispatched to a [`MidiSink`] from a dedicated
//! thread, with tempo changes applied as playback reaches them.
//!
//! ```no_run
//! use seqplay::{MidiMessage, MidiPort, SequencePlayer, TrackEvent};
//!
//! let mut port = MidiPort::new("seqplay");
//! port.open_port(0)?;
//!
//! let mut player = SequencePlayer::new(port);
//! let track = vec![
//!     TrackEvent::new(0, MidiMessage::note_on(0, 60, 100)),
//!     TrackEvent::new(480, MidiMessage::note_off(0, 60)),
//! ];
//! player.load_multiple_tracks(&[track], 480.0, 120.0)?;
//! player.start()?;
//! player.wait_until_stopped()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod output;
pub mod player;
pub mod timing;

pub use config::{Config, OutputConfig, PlaybackConfig, PortSelector, ThreadPriority, WaitStrategy};
pub use engine::RunStats;
pub use error::{ConfigError, OutputError, PlayerError, TimingError};
pub use events::{MetaEventType, MidiMessage, PlaybackEvent, PlayerNotification, TrackEvent};
pub use output::{MidiPort, MidiSink, PortInfo, RunningStatus};
pub use player::SequencePlayer;
pub use timing::{EventList, LoadedSequence, MergeScheduler, TempoClock};
