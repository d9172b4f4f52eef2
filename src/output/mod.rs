mod port;

pub use port::{MidiPort, PortInfo};

use crate::error::OutputError;
use crate::events::MidiMessage;

/// Destination for dispatched MIDI bytes.
///
/// Only the dispatch thread calls into a sink while a run is active. Sinks
/// shared between several players are responsible for their own locking.
pub trait MidiSink: Send {
    fn send(&mut self, message: &[u8]) -> Result<(), OutputError>;

    /// Sends a channel message whose status byte matches the previous one.
    /// `message` still carries the status byte; the sink omits it.
    fn send_running_status(&mut self, message: &[u8]) -> Result<(), OutputError> {
        self.send(message.get(1..).unwrap_or_default())
    }

    /// Changes whenever the sink is attached to a new connection.
    fn connection_epoch(&self) -> u64 {
        0
    }
}

impl<S: MidiSink + ?Sized> MidiSink for Box<S> {
    fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        (**self).send(message)
    }

    fn send_running_status(&mut self, message: &[u8]) -> Result<(), OutputError> {
        (**self).send_running_status(message)
    }

    fn connection_epoch(&self) -> u64 {
        (**self).connection_epoch()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    Full,
    Elided,
}

/// Running-status state for one playback run.
#[derive(Debug, Default, Clone)]
pub struct RunningStatus {
    status: Option<u8>,
    epoch: u64,
}

impl RunningStatus {
    pub fn new(epoch: u64) -> Self {
        Self {
            status: None,
            epoch,
        }
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<u8> {
        self.status
    }

    pub fn clear(&mut self) {
        self.status = None;
    }

    pub fn dispatch<S: MidiSink + ?Sized>(
        &mut self,
        sink: &mut S,
        message: &MidiMessage,
    ) -> (SendKind, Result<(), OutputError>) {
        let epoch = sink.connection_epoch();
        if epoch != self.epoch {
            self.epoch = epoch;
            self.status = None;
        }

        if !message.is_channel_voice() {
            return (SendKind::Full, sink.send(message.bytes()));
        }

        let status = message.status();
        if status.is_some() && status == self.status {
            return (SendKind::Elided, sink.send_running_status(message.bytes()));
        }

        let result = sink.send(message.bytes());
        // A failed send leaves the receiver's status unknown.
        self.status = if result.is_ok() { status } else { None };
        (SendKind::Full, result)
    }
}
