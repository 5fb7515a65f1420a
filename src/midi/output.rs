// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! midir backed MIDI output.

use midir::{MidiOutput as MidirClient, MidiOutputConnection};
use tracing::{info, warn};

use super::{DeviceError, MidiOutput};

const CLIENT_NAME: &str = "ccreplay output";

/// midir output connected to one destination port.
pub struct MidirOutput {
    connection: MidiOutputConnection,
    name: String,
}

impl MidirOutput {
    /// Connect to the destination at `destination_index` (zero based).
    pub fn new(destination_index: usize) -> Result<Self, DeviceError> {
        let client = new_client()?;
        let ports = client.ports();
        let port = ports
            .get(destination_index)
            .ok_or(DeviceError::InvalidDestination {
                index: destination_index,
                available: ports.len(),
            })?;

        let name = client
            .port_name(port)
            .unwrap_or_else(|_| format!("Unknown {}", destination_index));
        let connection = client
            .connect(port, &name)
            .map_err(|e| DeviceError::Backend(e.to_string()))?;

        info!(port = %name, "connected MIDI destination");
        Ok(Self { connection, name })
    }

    /// Connect to the first destination whose name contains `name`
    /// (case insensitive).
    pub fn new_by_name(name: &str) -> Result<Self, DeviceError> {
        let destinations = list_destinations();
        let needle = name.to_lowercase();
        let index = destinations
            .iter()
            .find(|(_, n)| n.to_lowercase().contains(&needle))
            .map(|(i, _)| *i)
            .ok_or_else(|| DeviceError::Backend(format!("no MIDI destination matching '{}'", name)))?;

        Self::new(index)
    }
}

impl MidiOutput for MidirOutput {
    fn send(&mut self, message: &[u8]) -> Result<(), DeviceError> {
        self.connection
            .send(message)
            .map_err(|e| DeviceError::Backend(e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn new_client() -> Result<MidirClient, DeviceError> {
    MidirClient::new(CLIENT_NAME).map_err(|e| DeviceError::Backend(e.to_string()))
}

/// List all available MIDI destinations as (index, name) pairs.
pub fn list_destinations() -> Vec<(usize, String)> {
    let client = match new_client() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "cannot enumerate MIDI destinations");
            return Vec::new();
        }
    };

    client
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            let name = client
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown {}", i));
            (i, name)
        })
        .collect()
}

/// Print all available MIDI destinations to stdout.
pub fn print_destinations() {
    let destinations = list_destinations();
    if destinations.is_empty() {
        println!("No MIDI destinations found.");
    } else {
        println!("Available MIDI destinations:");
        for (i, name) in destinations {
            println!("  {}: {}", i, name);
        }
    }
}
