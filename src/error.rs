use thiserror::Error;

/// Invalid tempo or tick-resolution values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimingError {
    #[error("ticks per beat must be positive and finite, got {0}")]
    InvalidTicksPerBeat(f64),

    #[error("tempo must be positive and finite, got {0} bpm")]
    InvalidTempo(f64),

    #[error("tempo change on track {track} at tick {tick} has an invalid payload")]
    InvalidTempoEvent { track: usize, tick: u64 },

    #[error("tick {tick} falls beyond the representable playback time")]
    DurationOverflow { tick: u64 },
}

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("playback is already running; call stop() first")]
    AlreadyRunning,

    #[error("cannot load tracks while playback is running")]
    LoadWhileRunning,

    #[error(transparent)]
    Timing(#[from] TimingError),

    #[error("failed to spawn dispatch thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("dispatch thread panicked and could not be joined")]
    DispatchThreadPanicked,
}

/// Transport failures reported by an output sink.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to initialize MIDI output: {0}")]
    Init(String),

    #[error("failed to connect to MIDI port: {0}")]
    Connect(String),

    #[error("MIDI output port not found: {0}")]
    PortNotFound(String),

    #[error("output is already attached to port '{0}'")]
    AlreadyAttached(String),

    #[error("output is not attached to a port")]
    NotAttached,

    #[error("failed to send MIDI message: {0}")]
    Send(String),

    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
}
