// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
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
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;

use super::{Direction, Port, TransportError};

#[derive(Default)]
struct State {
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    denied: bool,
    /// Bumped on every input connection so stale connections don't clear a newer one.
    generation: u64,
    sender: Option<Sender<Vec<u8>>>,
    connected_input: Option<String>,
    connected_output: Option<String>,
    sent: Vec<Vec<u8>>,
}

/// A mock transport. Records everything sent and lets tests inject input.
#[derive(Clone, Default)]
pub struct Transport {
    state: Arc<Mutex<State>>,
}

impl Transport {
    pub fn new() -> Transport {
        Transport::default()
    }

    /// Adds a port with the given id and name in both directions.
    pub fn add_device(&self, id: &str, name: &str) {
        self.add_input(id, name);
        self.add_output(&format!("{}-out", id), name);
    }

    pub fn add_input(&self, id: &str, name: &str) {
        self.state
            .lock()
            .inputs
            .push(Port::new(id, name, Direction::Input));
    }

    pub fn add_output(&self, id: &str, name: &str) {
        self.state
            .lock()
            .outputs
            .push(Port::new(id, name, Direction::Output));
    }

    /// Removes all ports.
    pub fn unplug_all(&self) {
        let mut state = self.state.lock();
        state.inputs.clear();
        state.outputs.clear();
    }

    /// Makes every enumeration fail, as if MIDI access was refused.
    pub fn deny(&self) {
        self.state.lock().denied = true;
    }

    /// Delivers the message to the connected input, if any.
    pub fn inject(&self, bytes: &[u8]) -> bool {
        match self.state.lock().sender.as_ref() {
            Some(sender) => sender.try_send(bytes.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Returns every frame sent so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    pub fn connected_input(&self) -> Option<String> {
        self.state.lock().connected_input.clone()
    }

    pub fn connected_output(&self) -> Option<String> {
        self.state.lock().connected_output.clone()
    }
}

struct InputConnection {
    state: Arc<Mutex<State>>,
    generation: u64,
}

impl super::InputConnection for InputConnection {}

impl Drop for InputConnection {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.generation == self.generation {
            state.sender = None;
            state.connected_input = None;
        }
    }
}

struct OutputConnection {
    state: Arc<Mutex<State>>,
}

impl super::OutputConnection for OutputConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.state.lock().sent.push(bytes.to_vec());
        Ok(())
    }
}

impl super::Transport for Transport {
    fn inputs(&self) -> Result<Vec<Port>, TransportError> {
        let state = self.state.lock();
        if state.denied {
            return Err(TransportError::Connect("access denied".to_string()));
        }
        Ok(state.inputs.clone())
    }

    fn outputs(&self) -> Result<Vec<Port>, TransportError> {
        let state = self.state.lock();
        if state.denied {
            return Err(TransportError::Connect("access denied".to_string()));
        }
        Ok(state.outputs.clone())
    }

    fn connect_input(
        &self,
        port: &Port,
        sender: Sender<Vec<u8>>,
    ) -> Result<Box<dyn super::InputConnection>, TransportError> {
        let mut state = self.state.lock();
        state.generation += 1;
        state.sender = Some(sender);
        state.connected_input = Some(port.id().to_string());
        Ok(Box::new(InputConnection {
            state: self.state.clone(),
            generation: state.generation,
        }))
    }

    fn connect_output(
        &self,
        port: &Port,
    ) -> Result<Box<dyn super::OutputConnection>, TransportError> {
        self.state.lock().connected_output = Some(port.id().to_string());
        Ok(Box::new(OutputConnection {
            state: self.state.clone(),
        }))
    }
}
