use midir::{MidiOutput, MidiOutputConnection};
use tracing::info;

use super::MidiSink;
use crate::config::{OutputConfig, PortSelector};
use crate::error::OutputError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// `None` for virtual ports.
    pub index: Option<usize>,
    pub name: String,
    pub is_virtual: bool,
}

/// A `midir` output that can be attached to one port at a time.
pub struct MidiPort {
    client_name: String,
    connection: Option<MidiOutputConnection>,
    info: Option<PortInfo>,
    epoch: u64,
}

impl MidiPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            connection: None,
            info: None,
            epoch: 0,
        }
    }

    /// Creates a port from config and attaches it as the config selects.
    pub fn open(config: &OutputConfig) -> Result<Self, OutputError> {
        let mut port = Self::new(config.client_name.clone());
        match &config.port {
            PortSelector::First => port.open_port(0)?,
            PortSelector::Index(index) => port.open_port(*index)?,
            PortSelector::Name(name) => port.open_port_by_name(name)?,
            PortSelector::Virtual(name) => port.open_virtual_port(name)?,
        }
        Ok(port)
    }

    fn output(&self) -> Result<MidiOutput, OutputError> {
        MidiOutput::new(&self.client_name).map_err(|e| OutputError::Init(e.to_string()))
    }

    pub fn port_names(&self) -> Result<Vec<String>, OutputError> {
        let output = self.output()?;
        Ok(output
            .ports()
            .iter()
            .map(|p| output.port_name(p).unwrap_or_default())
            .collect())
    }

    fn ensure_detached(&self) -> Result<(), OutputError> {
        match &self.info {
            Some(info) => Err(OutputError::AlreadyAttached(info.name.clone())),
            None => Ok(()),
        }
    }

    fn attach(&mut self, connection: MidiOutputConnection, info: PortInfo) {
        info!(port = %info.name, is_virtual = info.is_virtual, "MIDI output attached");
        self.connection = Some(connection);
        self.info = Some(info);
        self.epoch += 1;
    }

    pub fn open_port(&mut self, index: usize) -> Result<(), OutputError> {
        self.ensure_detached()?;
        let output = self.output()?;
        let ports = output.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| OutputError::PortNotFound(format!("#{index}")))?;
        let name = output
            .port_name(port)
            .map_err(|e| OutputError::Connect(e.to_string()))?;
        let connection = output
            .connect(port, &index.to_string())
            .map_err(|e| OutputError::Connect(e.to_string()))?;

        self.attach(
            connection,
            PortInfo {
                index: Some(index),
                name,
                is_virtual: false,
            },
        );
        Ok(())
    }

    pub fn open_port_by_name(&mut self, name: &str) -> Result<(), OutputError> {
        self.ensure_detached()?;
        let index = self
            .port_names()?
            .iter()
            .position(|candidate| candidate == name)
            .ok_or_else(|| OutputError::PortNotFound(name.to_string()))?;
        self.open_port(index)
    }

    #[cfg(unix)]
    pub fn open_virtual_port(&mut self, name: &str) -> Result<(), OutputError> {
        use midir::os::unix::VirtualOutput;

        self.ensure_detached()?;
        let connection = self
            .output()?
            .create_virtual(name)
            .map_err(|e| OutputError::Connect(e.to_string()))?;

        self.attach(
            connection,
            PortInfo {
                index: None,
                name: name.to_string(),
                is_virtual: true,
            },
        );
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn open_virtual_port(&mut self, _name: &str) -> Result<(), OutputError> {
        Err(OutputError::Unsupported("virtual MIDI ports"))
    }

    pub fn close_port(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
        if let Some(info) = self.info.take() {
            info!(port = %info.name, "MIDI output detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.connection.is_some()
    }

    pub fn info(&self) -> Option<&PortInfo> {
        self.info.as_ref()
    }
}

impl MidiSink for MidiPort {
    fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        let connection = self.connection.as_mut().ok_or(OutputError::NotAttached)?;
        connection
            .send(message)
            .map_err(|e| OutputError::Send(e.to_string()))
    }

    fn connection_epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for MidiPort {
    fn drop(&mut self) {
        self.close_port();
    }
}
