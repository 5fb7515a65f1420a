// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI input connections.
//!
//! Raw messages are delivered to a caller supplied callback on the midir
//! driver thread. The callback is invoked synchronously so device delivery
//! order is preserved all the way into the event log.

use std::sync::Arc;

use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, info, warn};

use super::DeviceError;

const CLIENT_NAME: &str = "ccreplay input";

/// Callback receiving raw MIDI bytes from the driver thread.
pub type RawCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Which device(s) a console listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelection {
    /// Every source currently present
    All,
    /// A single source by zero-based port index
    Port(usize),
}

impl SourceSelection {
    /// Interpret a user facing device index: 0 means all devices, `n`
    /// selects port `n - 1`.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => SourceSelection::All,
            n => SourceSelection::Port(n - 1),
        }
    }
}

/// Live connection to one or more MIDI sources.
///
/// Dropping the connection closes every underlying port.
pub struct SourceConnection {
    connections: Vec<MidiInputConnection<()>>,
    selection: SourceSelection,
}

impl SourceConnection {
    /// Connect to the selected source(s), forwarding every message to
    /// `callback`.
    pub fn open(selection: SourceSelection, callback: RawCallback) -> Result<Self, DeviceError> {
        let lister = new_input()?;
        let ports = lister.ports();

        let targets: Vec<usize> = match selection {
            SourceSelection::All => (0..ports.len()).collect(),
            SourceSelection::Port(index) if index < ports.len() => vec![index],
            SourceSelection::Port(index) => {
                return Err(DeviceError::InvalidSource {
                    index,
                    available: ports.len(),
                })
            }
        };

        let mut connections = Vec::with_capacity(targets.len());
        for index in targets {
            // midir consumes the client on connect, so each port gets its own
            let mut midi_in = new_input()?;
            midi_in.ignore(Ignore::All);
            let port = &ports[index];
            let port_name = midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown {}", index));

            let cb = Arc::clone(&callback);
            match midi_in.connect(port, &port_name, move |_stamp, message, _| cb(message), ()) {
                Ok(connection) => {
                    info!(port = %port_name, "connected MIDI source");
                    connections.push(connection);
                }
                Err(e) => {
                    // Keep going with the remaining ports
                    warn!(port = %port_name, error = %e, "failed to connect MIDI source");
                }
            }
        }

        if connections.is_empty() {
            debug!(?selection, "no MIDI sources connected");
        }

        Ok(Self {
            connections,
            selection,
        })
    }

    /// Number of ports actually connected
    pub fn port_count(&self) -> usize {
        self.connections.len()
    }

    /// The selection this connection was opened with
    pub fn selection(&self) -> SourceSelection {
        self.selection
    }

    /// Close every port.
    pub fn close(self) {
        for connection in self.connections {
            let _ = connection.close();
        }
    }
}

fn new_input() -> Result<MidiInput, DeviceError> {
    MidiInput::new(CLIENT_NAME).map_err(|e| DeviceError::Backend(e.to_string()))
}

/// List all available MIDI sources as (index, name) pairs.
///
/// Indices are zero based; user facing selection adds one (see
/// [`SourceSelection::from_index`]).
pub fn list_sources() -> Vec<(usize, String)> {
    let midi_in = match new_input() {
        Ok(midi_in) => midi_in,
        Err(e) => {
            warn!(error = %e, "cannot enumerate MIDI sources");
            return Vec::new();
        }
    };

    midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            let name = midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown {}", i));
            (i, name)
        })
        .collect()
}

/// Print all available MIDI sources to stdout
pub fn print_sources() {
    let sources = list_sources();
    if sources.is_empty() {
        println!("No MIDI sources found.");
    } else {
        println!("Available MIDI sources (inputs):");
        println!("  0: <all devices>");
        for (i, name) in sources {
            println!("  {}: {}", i + 1, name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_from_index() {
        assert_eq!(SourceSelection::from_index(0), SourceSelection::All);
        assert_eq!(SourceSelection::from_index(1), SourceSelection::Port(0));
        assert_eq!(SourceSelection::from_index(5), SourceSelection::Port(4));
    }

    #[test]
    fn test_list_sources() {
        // Just verify it doesn't panic
        let sources = list_sources();
        println!("Found {} sources", sources.len());
    }

    #[test]
    fn test_open_invalid_port_is_error() {
        let callback: RawCallback = Arc::new(|_| {});
        // Either the backend is unavailable or the port does not exist
        assert!(SourceConnection::open(SourceSelection::Port(10_000), callback).is_err());
    }
}
