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

//! The application root. Owns the session, feeds it inbound MIDI and watches
//! for devices coming and going.

use std::{path::Path, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    sync::mpsc::{self, Receiver},
    time::{Instant, MissedTickBehavior},
};
use tracing::{error, info, warn};

use crate::{
    config::{Config, ConfigError},
    midi::{Port, Transport},
    monitor::MonitorLog,
    preset::{Preset, PresetError, PresetUpdate},
    protocol::{Listener, ParamUpdate, Session},
    settings::DeviceSettings,
    sysex::DeviceInfo,
    voice::{ControlChange, NoteEvent},
    wavetable::{ConvertError, Wavetable},
};

/// Shown before the first enumeration.
pub const LOOKING_FOR_DEVICES: &str = "Looking for devices…";

/// How many inbound messages can queue before the transport blocks.
const EVENT_BUFFER: usize = 256;

#[derive(Default)]
struct State {
    monitor: MonitorLog,
    settings: DeviceSettings,
    settings_received: bool,
    device_info: Option<DeviceInfo>,
    ports: Vec<Port>,
    preferred: Option<String>,
}

/// Everything the surface knows about the device. Optionally prints every
/// monitor line as it changes.
pub struct Surface {
    state: Mutex<State>,
    echo: bool,
}

impl Surface {
    pub fn new(echo: bool) -> Surface {
        Surface {
            state: Mutex::new(State::default()),
            echo,
        }
    }

    /// The monitor lines, newest first.
    pub fn lines(&self) -> Vec<String> {
        self.state.lock().monitor.lines()
    }

    /// The settings as last reported by the device.
    pub fn settings(&self) -> DeviceSettings {
        self.state.lock().settings.clone()
    }

    /// True once any parameter has been reported.
    pub fn settings_received(&self) -> bool {
        self.state.lock().settings_received
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.state.lock().device_info
    }

    /// The candidate ports and the preferred port id from the last discovery.
    pub fn ports(&self) -> (Vec<Port>, Option<String>) {
        let state = self.state.lock();
        (state.ports.clone(), state.preferred.clone())
    }

    /// Reports local work, such as a wavetable conversion.
    pub fn local_status(&self, message: &str) {
        let line = self.state.lock().monitor.local_status(message);
        self.show(line);
    }

    fn show(&self, line: Option<String>) {
        if let (true, Some(line)) = (self.echo, line) {
            println!("{}", line);
        }
    }
}

impl Listener for Surface {
    fn device_info(&self, info: &DeviceInfo) {
        self.state.lock().device_info = Some(*info);
    }

    fn device_status(&self, message: &str) {
        let line = self.state.lock().monitor.device_status(message);
        self.show(line);
    }

    fn log_field(&self, name: &str, value: &str) {
        let line = self.state.lock().monitor.log_field(name, value);
        self.show(line);
    }

    fn parameter(&self, update: &ParamUpdate) {
        let mut state = self.state.lock();
        state.settings_received = true;
        state.settings.apply(update);
    }

    fn note(&self, event: &NoteEvent) {
        let line = self.state.lock().monitor.note(event);
        self.show(line);
    }

    fn control_change(&self, event: &ControlChange) {
        let line = self.state.lock().monitor.control_change(event);
        self.show(line);
    }

    fn status(&self, message: &str) {
        let line = self.state.lock().monitor.status(message);
        self.show(line);
    }

    fn ports_changed(&self, ports: &[Port], preferred: Option<&str>) {
        let mut state = self.state.lock();
        state.ports = ports.to_vec();
        state.preferred = preferred.map(str::to_string);
        if ports.is_empty() {
            state.device_info = None;
            state.settings_received = false;
        }
    }

    fn frame_sent(&self, frame: &[u8]) {
        let line = self.state.lock().monitor.outbound(frame);
        self.show(line);
    }
}

/// Ties the transport, the session and the surface together.
pub struct App {
    session: Session,
    surface: Arc<Surface>,
    events: Receiver<Vec<u8>>,
    poll_interval: Duration,
}

impl App {
    pub fn new(transport: Arc<dyn Transport>, config: &Config, echo: bool) -> Result<App, ConfigError> {
        let surface = Arc::new(Surface::new(echo));
        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        let session = Session::new(transport, surface.clone(), config, events_tx);

        Ok(App {
            session,
            surface,
            events,
            poll_interval: config.port_poll_interval()?,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Runs the first discovery.
    pub fn start(&mut self) {
        self.surface.status(LOOKING_FOR_DEVICES);
        self.session.poll_topology();
    }

    /// Handles inbound messages and topology changes forever.
    pub async fn run(&mut self) {
        self.run_until(None, |_| false).await;
    }

    /// Handles inbound messages and topology changes for the given duration.
    pub async fn run_for(&mut self, duration: Duration) {
        self.run_until(Some(Instant::now() + duration), |_| false)
            .await;
    }

    /// Handles inbound messages and topology changes until `done` returns
    /// true or the deadline passes. Returns whether `done` was satisfied.
    pub async fn run_until<F>(&mut self, deadline: Option<Instant>, mut done: F) -> bool
    where
        F: FnMut(&Surface) -> bool,
    {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if done(&self.surface) {
                return true;
            }

            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                message = self.events.recv() => match message {
                    Some(message) => self.session.handle_message(&message),
                    None => {
                        info!("MIDI event channel closed.");
                        return false;
                    }
                },
                _ = ticker.tick() => {
                    self.session.poll_topology();
                }
                _ = expired => return done(&self.surface),
            }
        }
    }

    /// Decodes and converts an audio file, reporting the outcome.
    pub fn load_wavetable(&self, path: &Path) -> Result<Wavetable, ConvertError> {
        match Wavetable::from_file(path) {
            Ok(wavetable) => {
                self.surface.local_status("Wavetable converted");
                Ok(wavetable)
            }
            Err(e) => {
                error!(err = e.to_string(), path = ?path, "Failed to load wavetable.");
                self.surface.local_status("Failed to load wavetable");
                Err(e)
            }
        }
    }

    /// Sends a wavetable to the given slot. Inbound messages keep being
    /// handled while the transfer runs. Returns whether every frame went out.
    pub async fn send_wavetable(&mut self, table_id: i32, wavetable: &Wavetable) -> bool {
        self.surface.local_status("Sending wavetable");
        let transfer = self
            .session
            .transfer_wavetable(table_id, wavetable.samples().to_vec());
        tokio::pin!(transfer);

        let result = loop {
            tokio::select! {
                result = &mut transfer => break result,
                Some(message) = self.events.recv() => self.session.handle_message(&message),
            }
        };

        match result {
            Ok(()) => {
                self.surface.local_status("Wavetable sent");
                true
            }
            Err(e) => {
                warn!(err = e.to_string(), "Wavetable transfer failed.");
                self.surface.local_status("Wavetable send failed");
                false
            }
        }
    }

    /// Saves the settings last reported by the device.
    pub fn save_preset(&self, path: &Path) -> Result<(), PresetError> {
        Preset::from_settings(&self.surface.settings()).save(path)?;
        self.surface.local_status("Preset saved to file");
        Ok(())
    }

    /// Loads a preset and sends every setting in it to the device.
    pub fn load_preset(&self, path: &Path) -> Result<(), PresetError> {
        match PresetUpdate::load(path) {
            Ok(update) => {
                update.apply(&self.session);
                self.surface.local_status("Preset loaded from file");
                Ok(())
            }
            Err(e) => {
                warn!(err = e.to_string(), path = ?path, "Unable to load preset.");
                self.surface.local_status("Invalid preset file");
                Err(e)
            }
        }
    }
}
