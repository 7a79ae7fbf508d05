// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{fmt, sync::Arc};

use tokio::sync::mpsc::Sender;

mod midir;
#[cfg(test)]
pub(crate) mod mock;

/// The direction of a MIDI port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A MIDI port as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    id: String,
    name: String,
    direction: Direction,
}

impl Port {
    /// Creates a new port description.
    pub fn new(id: &str, name: &str, direction: Direction) -> Port {
        Port {
            id: id.to_string(),
            name: name.to_string(),
            direction,
        }
    }

    /// The platform identifier of the port.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The display name of the port.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Input => "Input",
            Direction::Output => "Output",
        };
        write!(f, "{} ({}, {})", self.name, direction, self.id)
    }
}

/// Errors raised by the platform MIDI layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("MIDI access failed: {0}")]
    Init(#[from] ::midir::InitError),

    #[error("unable to read port info: {0}")]
    PortInfo(#[from] ::midir::PortInfoError),

    #[error("no port with id {0}")]
    PortNotFound(String),

    #[error("unable to connect to {0}")]
    Connect(String),

    #[error("unable to send: {0}")]
    Send(#[from] ::midir::SendError),
}

/// An open input subscription. Dropping it tears the subscription down.
pub trait InputConnection: Send {}

/// An open output port.
pub trait OutputConnection: Send {
    /// Sends raw bytes to the port.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// The platform MIDI API. This is the only part of the crate that touches hardware.
pub trait Transport: Send + Sync {
    /// Lists the input ports.
    fn inputs(&self) -> Result<Vec<Port>, TransportError>;

    /// Lists the output ports.
    fn outputs(&self) -> Result<Vec<Port>, TransportError>;

    /// Subscribes to the given input. Every message received is forwarded to the sender.
    fn connect_input(
        &self,
        port: &Port,
        sender: Sender<Vec<u8>>,
    ) -> Result<Box<dyn InputConnection>, TransportError>;

    /// Opens the given output.
    fn connect_output(&self, port: &Port) -> Result<Box<dyn OutputConnection>, TransportError>;
}

/// Returns the transport backed by the platform MIDI API.
pub fn platform() -> Arc<dyn Transport> {
    Arc::new(midir::Transport::new())
}
