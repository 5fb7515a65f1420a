// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Session data and the context that wires it together.
//!
//! [`SessionContext`] owns the settings and the current event log and hands
//! out configured capture, routing, and replay components. Nothing here is
//! global: every component receives the context (or what it built) by
//! reference.

pub mod event;

pub use event::{
    console_name, ControllerEvent, EventLog, CONSOLE_COUNT, CONTROLLER_SLOTS, MAX_CONTROLLER,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::capture::{CaptureHub, ControllerFilter, EventCapture, FilterParseError};
use crate::config::{SessionFile, Settings};
use crate::midi::{MidiOutput, MidirOutput};
use crate::output::{OutputRouter, PlaybackEnableMask};
use crate::timeline::Scrubber;

/// Settings plus the session being worked on.
#[derive(Debug, Clone)]
pub struct SessionContext {
    settings: Settings,
    settings_path: Option<PathBuf>,
    log: Arc<EventLog>,
    duration: f32,
}

impl SessionContext {
    /// A context with an empty session
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            settings_path: None,
            log: Arc::new(EventLog::new()),
            duration: 0.0,
        }
    }

    /// Persist settings edits to `path`
    pub fn with_settings_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load settings from disk, persisting later edits back to the same file
    pub fn open<P: AsRef<Path>>(settings_path: P) -> Result<Self> {
        let settings = Settings::load(&settings_path)?;
        Ok(Self::new(settings).with_settings_path(settings_path))
    }

    /// Replace the session with one read from disk
    pub fn load_session<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = SessionFile::load(&path)?;
        let log = file.to_log();
        info!(events = log.len(), duration = file.duration, "session loaded");
        self.replace_log(log, file.duration);
        Ok(())
    }

    /// Write the session to disk
    pub fn save_session<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.session_file().save(path)
    }

    pub fn session_file(&self) -> SessionFile {
        let filters = self.settings.consoles.iter().map(|c| c.filter.clone()).collect();
        SessionFile::new(&self.log, self.duration, filters)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace settings wholesale (hot reload)
    pub fn replace_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Install a new event log. Any scrubber built before is stale.
    pub fn replace_log(&mut self, log: EventLog, duration: f32) {
        self.duration = duration.max(log.last_timestamp());
        self.log = Arc::new(log);
    }

    /// Set a console's capture filter from a range string.
    ///
    /// Updates the capture mask, stores the canonical string in the
    /// settings and persists them, returning the canonical string. The
    /// capture lock is held only for the mask swap, never for the save.
    /// On a parse error nothing changes.
    pub fn set_filter(
        &mut self,
        console: u8,
        text: &str,
        hub: &CaptureHub,
    ) -> Result<String, FilterParseError> {
        let filter = ControllerFilter::parse(text).map_err(|e| {
            warn!(console, text, error = %e, "filter not changed");
            e
        })?;
        let applied = hub.with(|capture| {
            let channel = capture.channel_filter(console).unwrap_or(0);
            capture.configure(console, channel, filter.clone());
        });
        if applied.is_none() {
            warn!(console, "capture mask not updated");
        }
        self.store_filter(console, &filter);
        Ok(filter.to_range_string())
    }

    /// Record a mask edited elsewhere (learn mode) in the settings
    pub fn filter_changed(&mut self, console: u8, text: &str) {
        match ControllerFilter::parse(text) {
            Ok(filter) => self.store_filter(console, &filter),
            Err(e) => warn!(console, error = %e, "ignoring invalid filter notice"),
        }
    }

    fn store_filter(&mut self, console: u8, filter: &ControllerFilter) {
        let Some(settings) = self.settings.console_mut(console) else {
            warn!(console, "no settings for console");
            return;
        };
        settings.filter = filter.to_range_string();
        self.persist();
    }

    fn persist(&self) {
        if let Some(path) = &self.settings_path {
            if let Err(e) = self.settings.save(path) {
                warn!(path = ?path, error = %e, "failed to save settings");
            }
        }
    }

    /// A capture configured from the settings
    pub fn build_capture(&self) -> EventCapture {
        let mut capture = EventCapture::new();
        for (console, settings) in self.settings.consoles.iter().enumerate() {
            // Settings were validated on load; an invalid edit disables capture
            let filter = settings.controller_filter().unwrap_or_else(|e| {
                warn!(error = %e, "capture disabled for console");
                ControllerFilter::empty()
            });
            capture.configure(console as u8, settings.input_channel, filter);
        }
        capture
    }

    /// A router for the current log, without devices attached
    pub fn build_router(&self) -> OutputRouter {
        let mut router = OutputRouter::new(PlaybackEnableMask::from_log(&self.log));
        router.set_send_enabled(self.settings.send_enabled);
        router.set_track_unmanaged(self.settings.track_unmanaged);
        for (console, settings) in self.settings.consoles.iter().enumerate() {
            router.set_channel(console as u8, settings.channel);
            router.set_range(console as u8, settings.range);
        }
        router
    }

    /// Open the configured output devices on `router`. Failures are logged
    /// and leave that console without output.
    pub fn open_outputs(&self, router: &mut OutputRouter) {
        for (console, settings) in self.settings.consoles.iter().enumerate() {
            let opened = match (settings.output, &settings.output_name) {
                (Some(index), _) => MidirOutput::new(index),
                (None, Some(name)) => MidirOutput::new_by_name(name),
                (None, None) => continue,
            };
            match opened {
                Ok(output) => {
                    let device: Box<dyn MidiOutput> = Box::new(output);
                    router.set_device(console as u8, Some(device));
                }
                Err(e) => warn!(console = %settings.name, error = %e, "cannot open output"),
            }
        }
    }

    /// Build the time index and scrubber for the current log
    pub fn build_scrubber(&self) -> Scrubber {
        Scrubber::load(Arc::clone(&self.log), self.duration)
    }
}
