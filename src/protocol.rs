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

//! The parameter protocol.
//!
//! A [`Session`] owns the selected ports and the settings dump handshake. It
//! turns inbound frames into [`Listener`] notifications and turns setter calls
//! into outbound frames.

use std::{future::Future, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, span, warn, Level};

use crate::{
    config::Config,
    midi::{InputConnection, OutputConnection, Port, Transport},
    sysex::{self, DeviceInfo, ParamId, SysExMessage},
    voice::{self, ChannelVoice, ControlChange, NoteEvent},
    wavetable::{self, TransferError},
};

/// Reported when the platform refuses MIDI access.
pub const ACCESS_DENIED: &str = "MIDI access denied or SysEx blocked";

/// A parameter message received from the device. The data bytes are raw; see
/// [`crate::settings::Setting`] for their interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamUpdate {
    pub id: ParamId,
    pub a: u8,
    pub b: u8,
}

/// Receives everything the session has to report. Every method defaults to
/// doing nothing.
pub trait Listener: Send + Sync {
    /// The device identified itself.
    fn device_info(&self, _info: &DeviceInfo) {}

    /// The device sent a status line.
    fn device_status(&self, _message: &str) {}

    /// The device reported a named log field.
    fn log_field(&self, _name: &str, _value: &str) {}

    /// The device reported a parameter value.
    fn parameter(&self, _update: &ParamUpdate) {}

    fn note(&self, _event: &NoteEvent) {}

    fn control_change(&self, _event: &ControlChange) {}

    /// A status line about the session itself.
    fn status(&self, _message: &str) {}

    /// The candidate input ports changed.
    fn ports_changed(&self, _ports: &[Port], _preferred: Option<&str>) {}

    /// A frame went out to the device.
    fn frame_sent(&self, _frame: &[u8]) {}
}

/// A handle to the bound output. Cloning shares the underlying connection.
#[derive(Clone)]
pub struct Output {
    port: Port,
    connection: Arc<Mutex<Box<dyn OutputConnection>>>,
    listener: Arc<dyn Listener>,
}

impl Output {
    fn new(
        port: Port,
        connection: Box<dyn OutputConnection>,
        listener: Arc<dyn Listener>,
    ) -> Output {
        Output {
            port,
            connection: Arc::new(Mutex::new(connection)),
            listener,
        }
    }

    /// The port this output writes to.
    pub fn port(&self) -> &Port {
        &self.port
    }

    /// Sends a frame. Failures are logged, never raised.
    pub fn send(&self, frame: &[u8]) {
        debug!(
            port = self.port.name(),
            frame = sysex::hex_string(frame),
            "Sending MIDI."
        );
        if let Err(e) = self.connection.lock().send(frame) {
            error!(err = e.to_string(), port = self.port.name(), "Error sending MIDI.");
            return;
        }
        self.listener.frame_sent(frame);
    }
}

/// The connection state for one device.
pub struct Session {
    transport: Arc<dyn Transport>,
    listener: Arc<dyn Listener>,
    events: Sender<Vec<u8>>,
    vendor_prefix: String,
    device_name: String,
    input: Option<(Port, Box<dyn InputConnection>)>,
    output: Option<Output>,
    last_selected: Option<String>,
    awaiting_settings_dump: bool,
    topology: Option<Vec<String>>,
}

impl Session {
    /// Creates a new session. Inbound messages from the selected input are
    /// forwarded to `events`; feed them back through [`Session::handle_message`].
    pub fn new(
        transport: Arc<dyn Transport>,
        listener: Arc<dyn Listener>,
        config: &Config,
        events: Sender<Vec<u8>>,
    ) -> Session {
        Session {
            transport,
            listener,
            events,
            vendor_prefix: config.vendor_prefix().to_string(),
            device_name: config.device_name().to_string(),
            input: None,
            output: None,
            last_selected: None,
            awaiting_settings_dump: false,
            topology: None,
        }
    }

    /// Lists the input ports that belong to the vendor.
    pub fn candidates(&self) -> Result<Vec<Port>, crate::midi::TransportError> {
        Ok(self
            .transport
            .inputs()?
            .into_iter()
            .filter(|port| port.name().starts_with(&self.vendor_prefix))
            .collect())
    }

    /// Picks the port named exactly like the device, else the first candidate.
    pub fn preferred<'a>(&self, candidates: &'a [Port]) -> Option<&'a Port> {
        candidates
            .iter()
            .find(|port| port.name() == self.device_name)
            .or_else(|| candidates.first())
    }

    /// Re-enumerates the ports, reports them and selects the preferred one.
    pub fn refresh(&mut self) {
        let span = span!(Level::INFO, "refresh ports");
        let _enter = span.enter();

        let candidates = match self.candidates() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(err = e.to_string(), "Unable to enumerate MIDI ports.");
                self.listener.status(ACCESS_DENIED);
                return;
            }
        };
        let preferred = self
            .preferred(&candidates)
            .map(|port| port.id().to_string());

        info!(
            count = candidates.len(),
            preferred = preferred.as_deref().unwrap_or("none"),
            "Found candidate devices."
        );

        if candidates.is_empty() {
            self.input = None;
            self.output = None;
            self.last_selected = None;
            self.awaiting_settings_dump = false;
        }

        self.listener.ports_changed(&candidates, preferred.as_deref());

        if let Some(preferred) = preferred {
            self.select_input(&preferred);
        }

        if candidates.is_empty() {
            self.listener
                .status(&format!("No {} devices found", self.vendor_prefix));
        }
    }

    /// Re-runs discovery if the set of ports changed since the last call.
    /// Returns true if it did.
    pub fn poll_topology(&mut self) -> bool {
        let ports = self.transport.inputs().and_then(|inputs| {
            let outputs = self.transport.outputs()?;
            Ok(inputs
                .iter()
                .chain(outputs.iter())
                .map(|port| format!("{}|{}", port.id(), port.name()))
                .collect::<Vec<String>>())
        });

        // Errors are reported by refresh.
        let ports = ports.ok();
        if self.topology.is_some() && self.topology == ports {
            return false;
        }
        self.topology = ports;
        self.refresh();
        true
    }

    /// Binds the given input and its matching output. A port that differs from
    /// the last one selected gets a device info request and arms the handshake.
    pub fn select_input(&mut self, id: &str) {
        let span = span!(Level::INFO, "select input");
        let _enter = span.enter();

        // Dropping the old connections tears them down.
        self.input = None;
        self.output = None;

        match self.bind(id) {
            Ok(true) => {}
            Ok(false) => warn!(id, "No such MIDI input."),
            Err(e) => {
                error!(err = e.to_string(), id, "Unable to bind MIDI ports.");
                self.listener.status(ACCESS_DENIED);
            }
        }

        if self.last_selected.as_deref() != Some(id) {
            self.awaiting_settings_dump = true;
            self.request_device_info();
            self.last_selected = Some(id.to_string());
        }
    }

    fn bind(&mut self, id: &str) -> Result<bool, crate::midi::TransportError> {
        let port = match self.transport.inputs()?.into_iter().find(|p| p.id() == id) {
            Some(port) => port,
            None => return Ok(false),
        };

        let connection = self.transport.connect_input(&port, self.events.clone())?;
        let output_port = self.matching_output(&port)?;
        self.input = Some((port, connection));

        match output_port {
            Some(output_port) => {
                let connection = self.transport.connect_output(&output_port)?;
                self.output = Some(Output::new(
                    output_port,
                    connection,
                    self.listener.clone(),
                ));
            }
            None => warn!("No matching MIDI output, sends will be dropped."),
        }

        Ok(true)
    }

    fn matching_output(&self, input: &Port) -> Result<Option<Port>, crate::midi::TransportError> {
        let outputs = self.transport.outputs()?;
        if let Some(output) = outputs.iter().find(|output| output.name() == input.name()) {
            return Ok(Some(output.clone()));
        }

        let mut candidates = outputs
            .into_iter()
            .filter(|output| output.name().starts_with(&self.vendor_prefix));
        match (candidates.next(), candidates.next()) {
            (Some(output), None) => Ok(Some(output)),
            _ => Ok(None),
        }
    }

    /// The currently bound input.
    pub fn input(&self) -> Option<&Port> {
        self.input.as_ref().map(|(port, _)| port)
    }

    /// The currently bound output.
    pub fn output(&self) -> Option<Output> {
        self.output.clone()
    }

    /// True between selecting a new port and the first parameter message.
    pub fn awaiting_settings_dump(&self) -> bool {
        self.awaiting_settings_dump
    }

    /// Decodes one inbound message and notifies the listener.
    pub fn handle_message(&mut self, bytes: &[u8]) {
        if let Some(message) = SysExMessage::decode(bytes) {
            self.dispatch(message);
            return;
        }

        match voice::parse(bytes) {
            Some(ChannelVoice::Note(event)) => self.listener.note(&event),
            Some(ChannelVoice::ControlChange(event)) => self.listener.control_change(&event),
            None => {}
        }
    }

    fn dispatch(&mut self, message: SysExMessage) {
        match message {
            SysExMessage::DeviceInfo(info) => {
                info!(info = info.to_string(), "Device identified.");
                self.listener.device_info(&info);
            }
            SysExMessage::Status(message) => self.listener.device_status(&message),
            SysExMessage::Log { name, value } => self.listener.log_field(&name, &value),
            SysExMessage::Param { id, a, b } => {
                if self.awaiting_settings_dump {
                    debug!("Settings dump started.");
                    self.awaiting_settings_dump = false;
                }
                self.listener.parameter(&ParamUpdate { id, a, b });
            }
        }
    }

    fn send(&self, frame: &[u8]) {
        match &self.output {
            Some(output) => output.send(frame),
            None => debug!(
                frame = sysex::hex_string(frame),
                "No MIDI output bound, dropping."
            ),
        }
    }

    fn send_param(&self, id: ParamId, value: i32) {
        self.send(&sysex::param_frame(id, value));
    }

    /// Asks the device to identify itself.
    pub fn request_device_info(&self) {
        self.send(&sysex::device_info_request());
    }

    pub fn set_velocity(&self, velocity: i32) {
        self.send_param(ParamId::Velocity, velocity.clamp(0, 127));
    }

    pub fn set_midi_channel(&self, channel: i32) {
        self.send_param(ParamId::Channel, channel.clamp(1, 16));
    }

    pub fn set_midi_thru(&self, enabled: bool) {
        self.send_param(ParamId::Thru, enabled as i32);
    }

    pub fn set_delay_feedback(&self, feedback: i32) {
        self.send_param(ParamId::DelayFeedback, feedback.clamp(0, 127));
    }

    pub fn set_delay_mix(&self, mix: i32) {
        self.send_param(ParamId::DelayMix, mix.clamp(0, 127));
    }

    pub fn set_filter_resonance(&self, resonance: i32) {
        self.send_param(ParamId::FilterResonance, resonance.clamp(0, 255));
    }

    pub fn set_device_mode(&self, mode: i32) {
        self.send_param(ParamId::DeviceMode, mode.clamp(0, 2));
    }

    /// Maps one of the device's 13 CC slots.
    pub fn set_cc_mapping(&self, index: i32, value: i32) {
        self.send(&sysex::param_pair_frame(
            ParamId::CcMapping,
            index.clamp(0, 12),
            value.clamp(0, 127),
        ));
    }

    /// Tells the device to persist its current settings.
    pub fn store_settings(&self) {
        self.send_param(ParamId::SaveSettings, 1);
    }

    /// Sends a plain control change. The channel defaults to 1.
    pub fn send_cc(&self, controller: i32, value: i32, channel: Option<i32>) {
        self.send(&voice::control_change(
            controller,
            value,
            channel.unwrap_or(1),
        ));
    }

    /// Streams a wavetable to the device. The transfer holds its own handle to
    /// the output, so it can run while inbound messages keep being handled.
    pub fn transfer_wavetable(
        &self,
        table_id: i32,
        samples: Vec<i8>,
    ) -> impl Future<Output = Result<(), TransferError>> + Send + 'static {
        let output = self.output.clone();
        async move { wavetable::transfer(output.as_ref(), table_id, &samples).await }
    }
}
