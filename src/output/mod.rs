// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Output routing to external consoles.
//!
//! Every replayed controller value passes through [`OutputRouter`], which
//! decides whether it is transmitted (per-controller enable mask plus a
//! global send switch) and whether it updates the console's "last message"
//! slot that faders and visualizations observe.

pub mod range;

pub use range::ValueRange;

use std::collections::HashMap;
use std::sync::mpsc::Sender;

use tracing::{debug, warn};

use crate::capture::ControllerFilter;
use crate::midi::{ControlChange, MidiOutput};
use crate::session::{EventLog, CONSOLE_COUNT};
use crate::timeline::ControllerSink;

/// Playback flags of one controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerPlayback {
    /// Transmit to the external console
    pub enabled: bool,
    /// Update the last-message slot, whether transmitted or not
    pub all: bool,
}

impl Default for ControllerPlayback {
    fn default() -> Self {
        Self {
            enabled: true,
            all: true,
        }
    }
}

/// Runtime playback flags keyed by (controller number, console).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackEnableMask {
    entries: HashMap<(u8, u8), ControllerPlayback>,
}

impl PlaybackEnableMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every controller that appears in `log`, enabled.
    pub fn from_log(log: &EventLog) -> Self {
        let mut mask = Self::new();
        for event in log.events() {
            mask.entries
                .entry((event.number, event.console))
                .or_default();
        }
        mask
    }

    pub fn get(&self, console: u8, number: u8) -> Option<ControllerPlayback> {
        self.entries.get(&(number, console)).copied()
    }

    pub fn insert(&mut self, console: u8, number: u8, playback: ControllerPlayback) {
        self.entries.insert((number, console), playback);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Controllers registered for a console, ascending
    pub fn controllers(&self, console: u8) -> Vec<u8> {
        let mut numbers: Vec<u8> = self
            .entries
            .keys()
            .filter(|(_, c)| *c == console)
            .map(|(n, _)| *n)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    /// Set `enabled` on every registered controller matching `select`.
    /// Returns true if any of them went from disabled to enabled.
    fn set_enabled_where(&mut self, enabled: bool, select: impl Fn(u8, u8) -> bool) -> bool {
        let mut reenabled = false;
        for ((number, console), playback) in self.entries.iter_mut() {
            if !select(*console, *number) {
                continue;
            }
            if enabled && !playback.enabled {
                reenabled = true;
            }
            playback.enabled = enabled;
        }
        reenabled
    }
}

/// Latest value routed for a console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastMessage {
    pub number: u8,
    pub value: u8,
}

/// Notification pushed to UI observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotUpdate {
    pub console: u8,
    pub message: LastMessage,
}

/// Per-console output configuration
#[derive(Default)]
struct ConsoleOutput {
    device: Option<Box<dyn MidiOutput>>,
    /// 1-16, 0 sends on channel 1
    channel: u8,
    range: ValueRange,
    last_message: Option<LastMessage>,
}

/// Routes replayed values to devices and UI slots.
pub struct OutputRouter {
    consoles: [ConsoleOutput; CONSOLE_COUNT],
    mask: PlaybackEnableMask,
    send_enabled: bool,
    track_unmanaged: bool,
    observer: Option<Sender<SlotUpdate>>,
    sent: u64,
    failures: u64,
}

impl OutputRouter {
    pub fn new(mask: PlaybackEnableMask) -> Self {
        Self {
            consoles: Default::default(),
            mask,
            send_enabled: true,
            track_unmanaged: false,
            observer: None,
            sent: 0,
            failures: 0,
        }
    }

    /// Push slot updates to `sender`
    pub fn with_observer(mut self, sender: Sender<SlotUpdate>) -> Self {
        self.observer = Some(sender);
        self
    }

    /// Attach (or detach) a console's output device
    pub fn set_device(&mut self, console: u8, device: Option<Box<dyn MidiOutput>>) {
        if let Some(output) = self.consoles.get_mut(console as usize) {
            output.device = device;
        } else {
            warn!(console, "set_device: no such console");
        }
    }

    pub fn set_channel(&mut self, console: u8, channel: u8) {
        if let Some(output) = self.consoles.get_mut(console as usize) {
            output.channel = channel.min(16);
        }
    }

    pub fn set_range(&mut self, console: u8, range: ValueRange) {
        if let Some(output) = self.consoles.get_mut(console as usize) {
            output.range = range;
        }
    }

    pub fn set_send_enabled(&mut self, enabled: bool) {
        self.send_enabled = enabled;
    }

    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    /// Whether controllers missing from the enable mask still update the
    /// last-message slot
    pub fn set_track_unmanaged(&mut self, track: bool) {
        self.track_unmanaged = track;
    }

    pub fn mask(&self) -> &PlaybackEnableMask {
        &self.mask
    }

    pub fn last_message(&self, console: u8) -> Option<LastMessage> {
        self.consoles.get(console as usize)?.last_message
    }

    /// Messages transmitted and transmissions failed so far
    pub fn counters(&self) -> (u64, u64) {
        (self.sent, self.failures)
    }

    /// Set one controller's `enabled` flag. Returns true if it was
    /// re-enabled, in which case the caller should resync by seeking.
    pub fn set_controller_enabled(&mut self, console: u8, number: u8, enabled: bool) -> bool {
        self.mask
            .set_enabled_where(enabled, |c, n| c == console && n == number)
    }

    /// Set `all` on one controller
    pub fn set_controller_all(&mut self, console: u8, number: u8, all: bool) {
        if let Some(playback) = self.mask.entries.get_mut(&(number, console)) {
            playback.all = all;
        }
    }

    /// Enable or disable a group of controllers on a console.
    pub fn set_group_enabled(&mut self, console: u8, group: &ControllerFilter, enabled: bool) -> bool {
        self.mask
            .set_enabled_where(enabled, |c, n| c == console && group.contains(n))
    }

    /// Enable or disable every controller of a console.
    pub fn set_console_enabled(&mut self, console: u8, enabled: bool) -> bool {
        self.mask.set_enabled_where(enabled, |c, _| c == console)
    }

    /// Whether any registered controller of the console is enabled
    pub fn console_enabled(&self, console: u8) -> bool {
        self.mask
            .entries
            .iter()
            .any(|((_, c), p)| *c == console && p.enabled)
    }

    /// Route one controller value.
    pub fn send_message(&mut self, console: u8, number: u8, value: u8) {
        let Some(output) = self.consoles.get_mut(console as usize) else {
            return;
        };

        let update_slot = match self.mask.get(console, number) {
            None => self.track_unmanaged,
            Some(playback) => {
                if playback.enabled && self.send_enabled {
                    if let Some(device) = output.device.as_mut() {
                        let cc = ControlChange {
                            channel: output.channel,
                            number,
                            value: output.range.correct(value),
                        };
                        match device.send(&cc.to_bytes()) {
                            Ok(()) => self.sent += 1,
                            Err(e) => {
                                self.failures += 1;
                                warn!(console, number, device = device.name(), error = %e, "send failed");
                            }
                        }
                    }
                }
                playback.all
            }
        };

        if update_slot {
            let message = LastMessage { number, value };
            output.last_message = Some(message);
            if let Some(observer) = &self.observer {
                let _ = observer.send(SlotUpdate { console, message });
            }
            debug!(console, number, value, "slot updated");
        }
    }
}

impl ControllerSink for OutputRouter {
    fn send_message(&mut self, console: u8, number: u8, value: u8) {
        OutputRouter::send_message(self, console, number, value);
    }
}
