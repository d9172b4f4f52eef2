use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

use crate::config::{ThreadPriority, WaitStrategy};
use crate::error::TimingError;
use crate::events::{MIDI_CHANNELS, MidiMessage, PlaybackEvent};
use crate::output::{MidiSink, RunningStatus, SendKind};
use crate::timing::{LoadedSequence, MergeScheduler, TempoClock};

/// Longest single sleep in hybrid waiting, which bounds stop latency.
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(1);

/// Flags shared between the controller and the dispatch thread.
#[derive(Debug, Default)]
pub struct RunControl {
    pub stop_requested: AtomicBool,
    pub looping: AtomicBool,
    pub active: AtomicBool,
    pub transport_failures: AtomicU64,
}

impl RunControl {
    fn should_stop(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Running,
    Stopping,
    Exhausted,
    Idle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub events_sent: u64,
    pub elided_sends: u64,
    pub tempo_changes: u64,
    pub transport_failures: u64,
    pub passes: u64,
    pub swept: bool,
}

/// Waits until `due` has elapsed since `origin`. Returns `false` if a stop
/// was requested first.
fn wait_until(origin: Instant, due: Duration, control: &RunControl, strategy: WaitStrategy) -> bool {
    let spin_window = strategy.spin_window();
    loop {
        if control.should_stop() {
            return false;
        }
        let elapsed = origin.elapsed();
        if elapsed >= due {
            return true;
        }
        let remaining = due - elapsed;
        match spin_window {
            Some(window) if remaining > window => {
                thread::sleep((remaining - window).min(MAX_SLEEP_SLICE));
            }
            _ => std::hint::spin_loop(),
        }
    }
}

fn record_failure(control: &RunControl, stats: &mut RunStats) {
    stats.transport_failures += 1;
    control.transport_failures.fetch_add(1, Ordering::Relaxed);
}

fn apply_tempo(clock: &mut TempoClock, event: &PlaybackEvent, due: Duration, stats: &mut RunStats) {
    let applied = event
        .message
        .tempo_bpm()
        .ok_or(TimingError::InvalidTempoEvent {
            track: event.track,
            tick: event.tick,
        })
        .and_then(|bpm| clock.apply_tempo_change(bpm, event.tick, due));
    match applied {
        Ok(()) => {
            stats.tempo_changes += 1;
            trace!(tick = event.tick, bpm = clock.bpm(), "tempo change");
        }
        Err(e) => warn!(error = %e, "ignoring tempo change"),
    }
}

fn send_event<S: MidiSink + ?Sized>(
    sink: &mut S,
    running_status: &mut RunningStatus,
    event: &PlaybackEvent,
    control: &RunControl,
    stats: &mut RunStats,
) {
    let (kind, result) = running_status.dispatch(sink, &event.message);
    match result {
        Ok(()) => {
            stats.events_sent += 1;
            if kind == SendKind::Elided {
                stats.elided_sends += 1;
            }
            trace!(
                tick = event.tick,
                track = event.track,
                channel = ?event.message.channel(),
                ?kind,
                "dispatched"
            );
        }
        Err(e) => {
            warn!(tick = event.tick, track = event.track, error = %e, "send failed");
            record_failure(control, stats);
        }
    }
}

/// All Sound Off on every channel, always sent with a full status byte.
fn panic_sweep<S: MidiSink + ?Sized>(sink: &Mutex<S>, control: &RunControl, stats: &mut RunStats) {
    let mut sink = sink.lock();
    for channel in 0..MIDI_CHANNELS {
        let message = MidiMessage::all_sound_off(channel);
        if let Err(e) = sink.send(message.bytes()) {
            warn!(channel, error = %e, "all sound off failed");
            record_failure(control, stats);
        }
    }
    stats.swept = true;
}

pub fn apply_priority_hint(priority: ThreadPriority) {
    match priority {
        ThreadPriority::Normal => {}
        ThreadPriority::Elevated => {
            debug!("elevated dispatch priority requested; no portable control, keeping default");
        }
    }
}

/// Plays `sequence` on the calling thread until it runs out or a stop is
/// requested. Looping restarts happen inside this call.
pub fn run_sequence<S, F>(
    sequence: &LoadedSequence,
    sink: &Mutex<S>,
    control: &RunControl,
    strategy: WaitStrategy,
    mut on_loop: F,
) -> Result<RunStats, TimingError>
where
    S: MidiSink + ?Sized,
    F: FnMut(),
{
    let tracks = &sequence.tracks;
    let mut clock = sequence.clock()?;
    let mut scheduler = MergeScheduler::new(tracks.len());
    let mut running_status = RunningStatus::new(sink.lock().connection_epoch());
    let mut stats = RunStats {
        passes: 1,
        ..Default::default()
    };

    let mut origin = Instant::now();
    let mut state = DispatchState::Running;

    loop {
        state = match state {
            DispatchState::Running => match scheduler.next(tracks) {
                None => DispatchState::Exhausted,
                Some(event) => match clock.due_time(event.tick) {
                    Err(e) => {
                        error!(error = %e, "cannot schedule event, stopping");
                        DispatchState::Stopping
                    }
                    Ok(due) if wait_until(origin, due, control, strategy) => {
                        if event.message.is_tempo_change() {
                            apply_tempo(&mut clock, event, due, &mut stats);
                        } else {
                            let mut sink = sink.lock();
                            send_event(&mut *sink, &mut running_status, event, control, &mut stats);
                        }
                        scheduler.advance(event.track);
                        DispatchState::Running
                    }
                    Ok(_) => DispatchState::Stopping,
                },
            },
            DispatchState::Stopping => {
                panic_sweep(sink, control, &mut stats);
                DispatchState::Idle
            }
            DispatchState::Exhausted => {
                debug_assert!(scheduler.is_exhausted(tracks));
                // A stop that lands after the last event still silences.
                if control.should_stop() {
                    DispatchState::Stopping
                } else if control.looping.load(Ordering::Acquire) {
                    scheduler.reset();
                    running_status.clear();
                    clock.reset();
                    origin = Instant::now();
                    stats.passes += 1;
                    debug!(pass = stats.passes, "looping sequence");
                    on_loop();
                    DispatchState::Running
                } else {
                    DispatchState::Idle
                }
            }
            DispatchState::Idle => break,
        };
    }

    Ok(stats)
}
