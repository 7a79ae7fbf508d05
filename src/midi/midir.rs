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
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, span, Level};

use super::{Direction, Port, TransportError};

/// A transport backed by midir.
pub struct Transport {}

impl Transport {
    pub fn new() -> Transport {
        Transport {}
    }
}

struct InputConnection {
    _connection: MidiInputConnection<()>,
}

impl super::InputConnection for InputConnection {}

struct OutputConnection {
    connection: MidiOutputConnection,
}

impl super::OutputConnection for OutputConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        Ok(self.connection.send(bytes)?)
    }
}

impl super::Transport for Transport {
    fn inputs(&self) -> Result<Vec<Port>, TransportError> {
        let input = MidiInput::new("ash-control input listing")?;
        input
            .ports()
            .iter()
            .map(|port| Ok(Port::new(&port.id(), &input.port_name(port)?, Direction::Input)))
            .collect()
    }

    fn outputs(&self) -> Result<Vec<Port>, TransportError> {
        let output = MidiOutput::new("ash-control output listing")?;
        output
            .ports()
            .iter()
            .map(|port| {
                Ok(Port::new(
                    &port.id(),
                    &output.port_name(port)?,
                    Direction::Output,
                ))
            })
            .collect()
    }

    fn connect_input(
        &self,
        port: &Port,
        sender: Sender<Vec<u8>>,
    ) -> Result<Box<dyn super::InputConnection>, TransportError> {
        let span = span!(Level::INFO, "connect input (midir)");
        let _enter = span.enter();

        let mut input = MidiInput::new("ash-control input")?;
        // SysEx is the whole point, so don't let midir filter it.
        input.ignore(Ignore::TimeAndActiveSense);

        let midir_port = input
            .find_port_by_id(port.id().to_string())
            .ok_or_else(|| TransportError::PortNotFound(port.id().to_string()))?;

        let connection = input
            .connect(
                &midir_port,
                "ash-control input watcher",
                move |_, raw_event, _| {
                    debug!(len = raw_event.len(), "Received MIDI message.");
                    if let Err(e) = sender.blocking_send(Vec::from(raw_event)) {
                        error!(
                            err = format!("{:?}", e),
                            "Error sending MIDI message to receiver."
                        );
                    }
                },
                (),
            )
            .map_err(|e| TransportError::Connect(format!("{}: {}", port.name(), e)))?;

        info!(port = port.name(), "Watching MIDI input.");
        Ok(Box::new(InputConnection {
            _connection: connection,
        }))
    }

    fn connect_output(
        &self,
        port: &Port,
    ) -> Result<Box<dyn super::OutputConnection>, TransportError> {
        let output = MidiOutput::new("ash-control output")?;
        let midir_port = output
            .find_port_by_id(port.id().to_string())
            .ok_or_else(|| TransportError::PortNotFound(port.id().to_string()))?;

        let connection = output
            .connect(&midir_port, "ash-control")
            .map_err(|e| TransportError::Connect(format!("{}: {}", port.name(), e)))?;

        info!(port = port.name(), "Opened MIDI output.");
        Ok(Box::new(OutputConnection { connection }))
    }
}
