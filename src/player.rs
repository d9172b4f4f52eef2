use arc_swap::ArcSwap;
use crossbeam::channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::PlaybackConfig;
use crate::engine::{self, RunControl};
use crate::error::PlayerError;
use crate::events::{PlayerNotification, TrackEvent};
use crate::output::MidiSink;
use crate::timing::LoadedSequence;

type Hook = Box<dyn Fn() + Send + Sync>;

struct Shared<S> {
    sink: Arc<Mutex<S>>,
    sequence: ArcSwap<LoadedSequence>,
    control: RunControl,
    on_started: RwLock<Option<Hook>>,
    on_stopped: RwLock<Option<Hook>>,
    subscribers: Mutex<Vec<Sender<PlayerNotification>>>,
}

impl<S> Shared<S> {
    fn notify(&self, notification: PlayerNotification) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(notification).is_ok());
    }

    fn fire(hook: &RwLock<Option<Hook>>) {
        if let Some(hook) = hook.read().as_ref() {
            hook();
        }
    }
}

/// Clears the active flag even if the dispatch thread unwinds.
struct ActiveGuard<'a>(&'a RunControl);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.store(false, Ordering::Release);
    }
}

/// Plays loaded tracks to a [`MidiSink`] on a dedicated thread.
///
/// Dropping the player requests a stop and waits for the dispatch thread,
/// so the panic sweep always reaches the sink.
pub struct SequencePlayer<S: MidiSink + 'static> {
    shared: Arc<Shared<S>>,
    config: PlaybackConfig,
    thread: Option<JoinHandle<()>>,
}

impl<S: MidiSink + 'static> SequencePlayer<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, PlaybackConfig::default())
    }

    pub fn with_config(sink: S, config: PlaybackConfig) -> Self {
        let control = RunControl::default();
        control.looping.store(config.looping, Ordering::Release);

        Self {
            shared: Arc::new(Shared {
                sink: Arc::new(Mutex::new(sink)),
                sequence: ArcSwap::from_pointee(LoadedSequence::empty()),
                control,
                on_started: RwLock::new(None),
                on_stopped: RwLock::new(None),
                subscribers: Mutex::new(Vec::new()),
            }),
            config,
            thread: None,
        }
    }

    /// Replaces the loaded sequence. Fails while playback is running.
    pub fn load_multiple_tracks(
        &mut self,
        tracks: &[Vec<TrackEvent>],
        ticks_per_beat: f64,
        bpm: f64,
    ) -> Result<(), PlayerError> {
        if self.is_playing() {
            return Err(PlayerError::LoadWhileRunning);
        }
        self.reset();

        let sequence = LoadedSequence::load(tracks, ticks_per_beat, bpm)?;
        if sequence.is_empty() {
            warn!("loaded sequence has no playable events");
        }
        info!(
            tracks = sequence.tracks.len(),
            length_secs = sequence.length.as_secs_f64(),
            "tracks loaded"
        );
        self.shared.sequence.store(Arc::new(sequence));
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), PlayerError> {
        let stop_requested = self.shared.control.stop_requested.load(Ordering::Acquire);
        if self.is_playing() && !stop_requested {
            return Err(PlayerError::AlreadyRunning);
        }
        self.join_dispatch_thread()?;

        let control = &self.shared.control;
        let sequence = self.shared.sequence.load_full();
        control.stop_requested.store(false, Ordering::Release);
        control.active.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let wait = self.config.wait;
        let priority = self.config.thread_priority;
        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                engine::apply_priority_hint(priority);
                let guard = ActiveGuard(&shared.control);

                let result = engine::run_sequence(
                    &sequence,
                    &shared.sink,
                    &shared.control,
                    wait,
                    || shared.notify(PlayerNotification::Looped),
                );
                match result {
                    Ok(stats) => debug!(?stats, "dispatch run finished"),
                    Err(e) => error!(error = %e, "dispatch run aborted"),
                }

                drop(guard);
                info!("playback stopped");
                Shared::<S>::fire(&shared.on_stopped);
                shared.notify(PlayerNotification::Stopped);
            });

        match spawned {
            Ok(handle) => self.thread = Some(handle),
            Err(e) => {
                self.shared.control.active.store(false, Ordering::Release);
                return Err(PlayerError::SpawnFailed(e));
            }
        }

        info!("playback started");
        Shared::<S>::fire(&self.shared.on_started);
        self.shared.notify(PlayerNotification::Started);
        Ok(())
    }

    /// Requests a stop without waiting for the dispatch thread.
    pub fn stop(&self) {
        self.shared
            .control
            .stop_requested
            .store(true, Ordering::Release);
    }

    pub fn set_looping(&self, looping: bool) {
        self.shared.control.looping.store(looping, Ordering::Release);
    }

    pub fn is_looping(&self) -> bool {
        self.shared.control.looping.load(Ordering::Acquire)
    }

    pub fn is_playing(&self) -> bool {
        self.shared.control.active.load(Ordering::Acquire)
    }

    /// Length in seconds at the load-time tempo.
    pub fn length(&self) -> f64 {
        self.shared.sequence.load().length.as_secs_f64()
    }

    /// Drops the loaded tracks. A running thread keeps its own copy.
    pub fn reset(&mut self) {
        self.shared
            .sequence
            .store(Arc::new(LoadedSequence::empty()));
    }

    pub fn on_started(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.shared.on_started.write() = Some(Box::new(hook));
    }

    pub fn on_stopped(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.shared.on_stopped.write() = Some(Box::new(hook));
    }

    pub fn subscribe(&self) -> Receiver<PlayerNotification> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    pub fn sink(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.shared.sink)
    }

    pub fn transport_failures(&self) -> u64 {
        self.shared
            .control
            .transport_failures
            .load(Ordering::Relaxed)
    }

    /// Blocks until the current run ends on its own (or after `stop`).
    pub fn wait_until_stopped(&mut self) -> Result<(), PlayerError> {
        self.join_dispatch_thread()
    }

    /// Stops playback and waits for the dispatch thread to exit.
    pub fn shutdown(mut self) -> Result<(), PlayerError> {
        self.stop();
        self.join_dispatch_thread()
    }

    fn join_dispatch_thread(&mut self) -> Result<(), PlayerError> {
        match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PlayerError::DispatchThreadPanicked),
            None => Ok(()),
        }
    }
}

impl<S: MidiSink + 'static> Drop for SequencePlayer<S> {
    fn drop(&mut self) {
        self.stop();
        if let Err(e) = self.join_dispatch_thread() {
            error!(error = %e, "dispatch thread did not shut down cleanly");
        }
    }
}
