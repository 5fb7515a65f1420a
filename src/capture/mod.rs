// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Controller event capture.
//!
//! Raw messages from the MIDI driver are filtered per console by channel and
//! controller mask (or accepted by learn mode), timestamped with elapsed
//! session time, and appended to the event log while recording.
//!
//! [`EventCapture::on_message`] runs on the driver thread. It appends
//! synchronously so device delivery order is preserved; anything the UI
//! needs to react to is announced through [`CaptureNotice`]s for the main
//! context to pick up.

pub mod filter;

pub use filter::{ControllerFilter, FilterParseError};

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::midi::input::RawCallback;
use crate::midi::{ControlChange, SourceConnection, SourceSelection};
use crate::session::{ControllerEvent, EventLog, CONSOLE_COUNT, CONTROLLER_SLOTS};

/// How long the per-console activity indicator stays lit
pub const ACTIVITY_HOLD: Duration = Duration::from_millis(250);

/// Notifications for the main context
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureNotice {
    /// A console's controller mask was edited by learn mode
    MaskChanged { console: u8, filter: String },
    /// A console's activity indicator just lit up
    Activity { console: u8 },
}

/// Transient activity indicator.
///
/// Lights on a message and goes dark [`ACTIVITY_HOLD`] after it was lit.
/// Messages arriving while lit do not extend it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivitySignal {
    raised_at: Option<Instant>,
}

impl ActivitySignal {
    /// Light the indicator. Returns true on the rising edge.
    pub fn trigger(&mut self, now: Instant) -> bool {
        if self.is_active(now) {
            return false;
        }
        self.raised_at = Some(now);
        true
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.raised_at
            .map(|t| now.saturating_duration_since(t) < ACTIVITY_HOLD)
            .unwrap_or(false)
    }
}

/// Last value seen for a controller while not necessarily recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KnownValue {
    channel: u8,
    value: u8,
}

/// Per-console capture state
#[derive(Debug, Clone)]
struct ConsoleCapture {
    /// 1-16, 0 = any channel
    channel_filter: u8,
    filter: ControllerFilter,
    learn: bool,
    learn_all: bool,
    last_known: [Option<KnownValue>; CONTROLLER_SLOTS],
    activity: ActivitySignal,
}

impl Default for ConsoleCapture {
    fn default() -> Self {
        Self {
            channel_filter: 0,
            filter: ControllerFilter::empty(),
            learn: false,
            learn_all: false,
            last_known: [None; CONTROLLER_SLOTS],
            activity: ActivitySignal::default(),
        }
    }
}

#[derive(Debug)]
struct Recording {
    log: EventLog,
}

/// Filters and timestamps incoming controller messages.
#[derive(Debug)]
pub struct EventCapture {
    consoles: [ConsoleCapture; CONSOLE_COUNT],
    session_start: Instant,
    recording: Option<Recording>,
    notices: Option<Sender<CaptureNotice>>,
}

impl EventCapture {
    /// Create a capture with empty masks. Session time starts now.
    pub fn new() -> Self {
        Self {
            consoles: Default::default(),
            session_start: Instant::now(),
            recording: None,
            notices: None,
        }
    }

    /// Announce mask edits and activity on `sender`
    pub fn with_notices(mut self, sender: Sender<CaptureNotice>) -> Self {
        self.notices = Some(sender);
        self
    }

    /// Replace a console's filter state.
    pub fn configure(&mut self, console: u8, channel_filter: u8, filter: ControllerFilter) {
        let Some(state) = self.consoles.get_mut(console as usize) else {
            warn!(console, "configure: no such console");
            return;
        };
        state.channel_filter = channel_filter.min(16);
        state.filter = filter;
        debug!(console, channel_filter, filter = %state.filter, "capture configured");
    }

    /// Replace a console's mask from a range string. On a parse error the
    /// mask is left untouched.
    pub fn set_filter_string(&mut self, console: u8, text: &str) -> Result<(), FilterParseError> {
        let filter = ControllerFilter::parse(text)?;
        if let Some(state) = self.consoles.get_mut(console as usize) {
            state.filter = filter;
        }
        Ok(())
    }

    pub fn filter(&self, console: u8) -> Option<&ControllerFilter> {
        self.consoles.get(console as usize).map(|c| &c.filter)
    }

    pub fn channel_filter(&self, console: u8) -> Option<u8> {
        self.consoles.get(console as usize).map(|c| c.channel_filter)
    }

    /// Enter or leave learn mode: the next matching message adds its
    /// controller to the mask and ends learn mode.
    pub fn learn(&mut self, console: u8, on: bool) {
        if let Some(state) = self.consoles.get_mut(console as usize) {
            state.learn = on;
        }
    }

    /// Enter or leave learn-all mode. Entering clears the mask; every
    /// controller seen afterwards is added back.
    pub fn learn_all(&mut self, console: u8, on: bool) {
        let Some(state) = self.consoles.get_mut(console as usize) else {
            return;
        };
        if on && !state.learn_all {
            state.filter.clear();
            let filter = state.filter.to_range_string();
            self.notify(CaptureNotice::MaskChanged { console, filter });
        }
        if let Some(state) = self.consoles.get_mut(console as usize) {
            state.learn_all = on;
        }
    }

    pub fn is_learning(&self, console: u8) -> bool {
        self.consoles
            .get(console as usize)
            .map(|c| c.learn || c.learn_all)
            .unwrap_or(false)
    }

    /// Whether the console's activity indicator is lit at `now`
    pub fn is_active(&self, console: u8, now: Instant) -> bool {
        self.consoles
            .get(console as usize)
            .map(|c| c.activity.is_active(now))
            .unwrap_or(false)
    }

    /// Last value seen for a controller, recording or not
    pub fn last_known_value(&self, console: u8, number: u8) -> Option<u8> {
        self.consoles
            .get(console as usize)?
            .last_known
            .get(number as usize)
            .copied()
            .flatten()
            .map(|k| k.value)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Seconds since the session clock started
    pub fn elapsed(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.session_start).as_secs_f32()
    }

    /// Start a new recording at `at`.
    ///
    /// The session clock restarts and the current physical position of
    /// every masked-in controller is written as a t = 0 event, so the
    /// recording opens in the state the consoles are actually in.
    pub fn start_recording(&mut self, at: Instant) {
        self.session_start = at;
        let mut log = EventLog::new();

        for (console, state) in self.consoles.iter().enumerate() {
            for (number, known) in state.last_known.iter().enumerate() {
                let Some(known) = known else { continue };
                if !state.filter.contains(number as u8) {
                    continue;
                }
                log.append(ControllerEvent::new(
                    0.0,
                    console as u8,
                    known.channel,
                    number as u8,
                    known.value,
                ));
            }
        }

        info!(seeded = log.len(), "recording started");
        self.recording = Some(Recording { log });
    }

    /// Finish the recording, returning the log and its duration in seconds.
    pub fn stop_recording(&mut self, at: Instant) -> Option<(EventLog, f32)> {
        let recording = self.recording.take()?;
        let duration = self.elapsed(at).max(recording.log.last_timestamp());
        info!(events = recording.log.len(), duration, "recording stopped");
        Some((recording.log, duration))
    }

    /// The log being recorded, if any
    pub fn recording_log(&self) -> Option<&EventLog> {
        self.recording.as_ref().map(|r| &r.log)
    }

    /// Handle one raw message from `console`'s source.
    ///
    /// Returns the event built from it, or `None` if it was malformed or
    /// filtered out.
    pub fn on_message(&mut self, console: u8, raw: &[u8], received_at: Instant) -> Option<ControllerEvent> {
        let cc = ControlChange::parse(raw)?;
        let timestamp = self.elapsed(received_at);
        let state = self.consoles.get_mut(console as usize)?;

        if state.channel_filter != 0 && state.channel_filter != cc.channel {
            return None;
        }

        let mut mask_changed = false;
        if !state.filter.contains(cc.number) {
            if state.learn {
                state.learn = false;
                state.filter.set(cc.number, true);
                mask_changed = true;
                info!(console, number = cc.number, "learned controller");
            } else if state.learn_all {
                state.filter.set(cc.number, true);
                mask_changed = true;
            } else {
                return None;
            }
        } else if state.learn {
            // Already masked in; learning it again is a no-op that still ends learn mode
            state.learn = false;
        }

        let event = ControllerEvent::new(timestamp, console, cc.channel, cc.number, cc.value);
        state.last_known[cc.number as usize] = Some(KnownValue {
            channel: cc.channel,
            value: cc.value,
        });
        let rising = state.activity.trigger(received_at);
        let filter = mask_changed.then(|| state.filter.to_range_string());

        if let Some(recording) = self.recording.as_mut() {
            recording.log.append(event);
        }

        if let Some(filter) = filter {
            self.notify(CaptureNotice::MaskChanged { console, filter });
        }
        if rising {
            self.notify(CaptureNotice::Activity { console });
        }

        Some(event)
    }

    fn notify(&self, notice: CaptureNotice) {
        if let Some(sender) = &self.notices {
            // The receiver going away only means nobody is watching
            let _ = sender.send(notice);
        }
    }
}

impl Default for EventCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Driver callback feeding `console`'s messages into `capture`.
///
/// The arrival time is taken before the lock so contention never delays
/// a timestamp. A poisoned lock is recovered and capture continues.
pub fn source_callback(capture: Arc<Mutex<EventCapture>>, console: u8) -> RawCallback {
    Arc::new(move |raw: &[u8]| {
        let received_at = Instant::now();
        let mut capture = capture.lock().unwrap_or_else(|poisoned| {
            warn!(console, "capture state poisoned, recovering");
            poisoned.into_inner()
        });
        capture.on_message(console, raw, received_at);
    })
}

/// Owns the capture state and the device connections feeding it.
pub struct CaptureHub {
    capture: Arc<Mutex<EventCapture>>,
    connections: [Option<SourceConnection>; CONSOLE_COUNT],
}

impl CaptureHub {
    pub fn new(capture: EventCapture) -> Self {
        Self {
            capture: Arc::new(Mutex::new(capture)),
            connections: Default::default(),
        }
    }

    /// Shared handle to the capture state
    pub fn capture(&self) -> Arc<Mutex<EventCapture>> {
        Arc::clone(&self.capture)
    }

    /// Run `f` against the capture state. Returns `None` if the lock was
    /// poisoned by a panicking driver callback.
    ///
    /// The driver thread blocks while `f` runs; keep `f` free of I/O.
    pub fn with<R>(&self, f: impl FnOnce(&mut EventCapture) -> R) -> Option<R> {
        match self.capture.lock() {
            Ok(mut capture) => Some(f(&mut capture)),
            Err(_) => {
                warn!("capture state poisoned");
                None
            }
        }
    }

    /// Listen to a device on behalf of `console`. Index 0 means all
    /// devices. Invalid indices are logged and ignored.
    pub fn connect_source(&mut self, console: u8, index: usize) {
        if console as usize >= CONSOLE_COUNT {
            warn!(console, "connect_source: no such console");
            return;
        }
        self.disconnect_source(console);

        let callback = source_callback(Arc::clone(&self.capture), console);
        match SourceConnection::open(SourceSelection::from_index(index), callback) {
            Ok(connection) => {
                info!(console, index, ports = connection.port_count(), "source connected");
                self.connections[console as usize] = Some(connection);
            }
            Err(e) => warn!(console, index, error = %e, "cannot connect source"),
        }
    }

    /// Stop listening for `console`
    pub fn disconnect_source(&mut self, console: u8) {
        if let Some(connection) = self
            .connections
            .get_mut(console as usize)
            .and_then(Option::take)
        {
            connection.close();
            debug!(console, "source disconnected");
        }
    }

    pub fn is_connected(&self, console: u8) -> bool {
        self.connections
            .get(console as usize)
            .map(Option::is_some)
            .unwrap_or(false)
    }
}
