// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback transport.
//!
//! [`PlaybackEngine`] owns the scrubber, the output router and the
//! position clock. Time changes and mask edits arrive as
//! [`TransportEvent`]s; the UI drives the engine with
//! [`TransportCommand`]s and watches [`EngineStatus`] snapshots.
//!
//! [`spawn`] runs the engine on the tokio runtime: the time index is built
//! on a blocking worker while the status reports loading, then a 1 ms
//! ticker publishes the clock position while playing.

pub mod clock;

pub use clock::{ClockState, TransportClock};

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::capture::ControllerFilter;
use crate::output::{LastMessage, OutputRouter};
use crate::session::{EventLog, CONSOLE_COUNT};
use crate::timeline::Scrubber;

/// Transport tick period
pub const TICK: Duration = Duration::from_millis(1);

/// Size of the command queue
const COMMAND_QUEUE: usize = 64;

/// An edit to the playback enable mask
#[derive(Debug, Clone, PartialEq)]
pub enum MaskChange {
    Controller { console: u8, number: u8, enabled: bool },
    Group { console: u8, group: ControllerFilter, enabled: bool },
    Console { console: u8, enabled: bool },
    Send { enabled: bool },
}

/// Events consumed by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The clock moved, by a tick or by the user
    TimePositionChanged(f32),
    /// An explicit jump; always resyncs
    Seeked(f32),
    MaskChanged(MaskChange),
}

/// User requests
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    TogglePlay,
    Stop,
    Seek(f32),
    /// Seek relative to the current position
    Nudge(f32),
    Mask(MaskChange),
    ToggleConsole(u8),
    ToggleSend,
    Shutdown,
}

/// Snapshot of the engine for display
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub loading: bool,
    pub position: f32,
    pub duration: f32,
    pub playing: bool,
    pub send_enabled: bool,
    pub event_index: i64,
    pub event_count: usize,
    pub last_messages: [Option<LastMessage>; CONSOLE_COUNT],
    pub console_enabled: [bool; CONSOLE_COUNT],
    pub sent: u64,
    pub failures: u64,
}

impl EngineStatus {
    /// Status shown while the time index is being built
    pub fn loading(duration: f32) -> Self {
        Self {
            loading: true,
            position: 0.0,
            duration,
            playing: false,
            send_enabled: false,
            event_index: -1,
            event_count: 0,
            last_messages: [None; CONSOLE_COUNT],
            console_enabled: [false; CONSOLE_COUNT],
            sent: 0,
            failures: 0,
        }
    }
}

/// Scrubber, router and clock wired together
pub struct PlaybackEngine {
    scrubber: Scrubber,
    router: OutputRouter,
    clock: TransportClock,
}

impl PlaybackEngine {
    pub fn new(scrubber: Scrubber, router: OutputRouter) -> Self {
        let clock = TransportClock::new(scrubber.duration());
        Self {
            scrubber,
            router,
            clock,
        }
    }

    pub fn scrubber(&self) -> &Scrubber {
        &self.scrubber
    }

    pub fn router(&self) -> &OutputRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut OutputRouter {
        &mut self.router
    }

    pub fn clock(&self) -> &TransportClock {
        &self.clock
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_running()
    }

    pub fn position(&self, now: Instant) -> f32 {
        self.clock.position(now)
    }

    /// Apply one transport event.
    pub fn handle(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::TimePositionChanged(time) => {
                self.scrubber.on_time_changed(time, &mut self.router);
            }
            TransportEvent::Seeked(time) => {
                self.scrubber.seek(time, &mut self.router);
            }
            TransportEvent::MaskChanged(change) => {
                if self.apply_mask(&change) {
                    // Bring the re-enabled controllers back in line
                    let time = self.clock.position(now);
                    debug!(time, "resync after re-enable");
                    self.scrubber.seek(time, &mut self.router);
                }
            }
        }
    }

    fn apply_mask(&mut self, change: &MaskChange) -> bool {
        match change {
            MaskChange::Controller {
                console,
                number,
                enabled,
            } => self
                .router
                .set_controller_enabled(*console, *number, *enabled),
            MaskChange::Group {
                console,
                group,
                enabled,
            } => self.router.set_group_enabled(*console, group, *enabled),
            MaskChange::Console { console, enabled } => {
                self.router.set_console_enabled(*console, *enabled)
            }
            MaskChange::Send { enabled } => {
                let resumed = *enabled && !self.router.send_enabled();
                self.router.set_send_enabled(*enabled);
                resumed
            }
        }
    }

    /// Apply one user command.
    pub fn command(&mut self, command: TransportCommand, now: Instant) {
        match command {
            TransportCommand::Play => {
                self.clock.play(now);
                let time = self.clock.position(now);
                info!(time, "play");
                self.scrubber.play(time, &mut self.router);
            }
            TransportCommand::Pause => {
                self.clock.pause(now);
                self.scrubber.stop();
                info!(time = self.clock.position(now), "pause");
            }
            TransportCommand::TogglePlay => {
                let next = if self.is_playing() {
                    TransportCommand::Pause
                } else {
                    TransportCommand::Play
                };
                self.command(next, now);
            }
            TransportCommand::Stop => {
                self.clock.stop();
                self.scrubber.stop();
                info!("stop");
            }
            TransportCommand::Seek(time) => {
                self.clock.seek(time, now);
                let time = self.clock.position(now);
                self.handle(TransportEvent::Seeked(time), now);
            }
            TransportCommand::Nudge(delta) => {
                let time = self.clock.position(now) + delta;
                self.command(TransportCommand::Seek(time), now);
            }
            TransportCommand::Mask(change) => {
                self.handle(TransportEvent::MaskChanged(change), now);
            }
            TransportCommand::ToggleConsole(console) => {
                let enabled = !self.router.console_enabled(console);
                self.handle(
                    TransportEvent::MaskChanged(MaskChange::Console { console, enabled }),
                    now,
                );
            }
            TransportCommand::ToggleSend => {
                let enabled = !self.router.send_enabled();
                self.handle(
                    TransportEvent::MaskChanged(MaskChange::Send { enabled }),
                    now,
                );
            }
            TransportCommand::Shutdown => {}
        }
    }

    /// Publish the clock position. Stops at the end of the session.
    pub fn tick(&mut self, now: Instant) {
        if !self.clock.is_running() {
            return;
        }
        let time = self.clock.position(now);
        self.handle(TransportEvent::TimePositionChanged(time), now);
        if self.clock.is_finished(now) {
            info!(time, "end of session");
            self.clock.pause(now);
            self.scrubber.stop();
        }
    }

    pub fn status(&self, now: Instant) -> EngineStatus {
        let (sent, failures) = self.router.counters();
        EngineStatus {
            loading: false,
            position: self.clock.position(now),
            duration: self.clock.duration(),
            playing: self.is_playing(),
            send_enabled: self.router.send_enabled(),
            event_index: self.scrubber.current_event_index(),
            event_count: self.scrubber.log().len(),
            last_messages: std::array::from_fn(|c| self.router.last_message(c as u8)),
            console_enabled: std::array::from_fn(|c| self.router.console_enabled(c as u8)),
            sent,
            failures,
        }
    }
}

/// Drive `engine` until shutdown or until every command sender is gone.
pub async fn run(
    mut engine: PlaybackEngine,
    mut commands: mpsc::Receiver<TransportCommand>,
    status: watch::Sender<EngineStatus>,
) -> PlaybackEngine {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let _ = status.send(engine.status(Instant::now()));

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                None | Some(TransportCommand::Shutdown) => {
                    info!("transport shutting down");
                    break;
                }
                Some(command) => {
                    debug!(?command, "transport command");
                    engine.command(command, Instant::now());
                }
            },
            _ = ticker.tick(), if engine.is_playing() => {
                engine.tick(Instant::now());
            }
        }
        let _ = status.send(engine.status(Instant::now()));
    }
    engine
}

/// Handle to a spawned transport task
pub struct TransportHandle {
    commands: mpsc::Sender<TransportCommand>,
    status: watch::Receiver<EngineStatus>,
    task: JoinHandle<Option<PlaybackEngine>>,
}

impl TransportHandle {
    /// Queue a command without blocking. Dropped with a warning if the
    /// queue is full.
    pub fn send(&self, command: TransportCommand) {
        if let Err(e) = self.commands.try_send(command) {
            warn!(error = %e, "transport command dropped");
        }
    }

    /// Latest engine status
    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Stop the task and wait for it.
    pub async fn shutdown(self) -> Result<Option<PlaybackEngine>> {
        let _ = self.commands.send(TransportCommand::Shutdown).await;
        Ok(self.task.await?)
    }
}

/// Build the time index on a blocking worker, then run the engine.
///
/// Must be called within a tokio runtime.
pub fn spawn(log: Arc<EventLog>, duration: f32, router: OutputRouter) -> TransportHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
    let (status_tx, status_rx) = watch::channel(EngineStatus::loading(duration));

    let task = tokio::spawn(async move {
        let events = log.len();
        let built = tokio::task::spawn_blocking(move || Scrubber::load(log, duration)).await;
        match built {
            Ok(scrubber) => {
                info!(events, duration, "time index ready");
                let engine = PlaybackEngine::new(scrubber, router);
                Some(run(engine, command_rx, status_tx).await)
            }
            Err(e) => {
                error!(error = %e, "time index build failed");
                None
            }
        }
    });

    TransportHandle {
        commands: command_tx,
        status: status_rx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::mock::MockMidiOutput;
    use crate::output::PlaybackEnableMask;
    use crate::session::ControllerEvent;

    fn engine() -> (PlaybackEngine, MockMidiOutput) {
        let log = Arc::new(EventLog::from_events(vec![
            ControllerEvent::new(0.0, 0, 1, 1, 0),
            ControllerEvent::new(1.0, 0, 1, 1, 64),
            ControllerEvent::new(2.5, 0, 1, 1, 127),
            ControllerEvent::new(0.5, 1, 1, 7, 90),
        ]));
        let mock = MockMidiOutput::new();
        let mut router = OutputRouter::new(PlaybackEnableMask::from_log(&log));
        router.set_device(0, Some(Box::new(mock.clone())));
        router.set_channel(0, 1);
        let scrubber = Scrubber::load(log, 3.0);
        (PlaybackEngine::new(scrubber, router), mock)
    }

    #[test]
    fn test_seek_command_resyncs() {
        let (mut engine, mock) = engine();
        let now = Instant::now();
        engine.command(TransportCommand::Seek(1.5), now);

        assert_eq!(mock.get_messages(), vec![vec![0xB0, 0, 64]]);
        assert_eq!(
            engine.router().last_message(0),
            Some(LastMessage { number: 1, value: 64 })
        );
        assert_eq!(engine.router().last_message(1), Some(LastMessage { number: 7, value: 90 }));
        assert_eq!(engine.scrubber().current_event_index(), 2);
    }

    #[test]
    fn test_ticks_advance_incrementally() {
        let (mut engine, mock) = engine();
        let t0 = Instant::now();
        engine.command(TransportCommand::Play, t0);
        mock.clear();

        engine.tick(t0 + Duration::from_millis(600));
        engine.tick(t0 + Duration::from_millis(1200));
        // Only the 1.0s event is new on console A
        assert_eq!(mock.get_messages(), vec![vec![0xB0, 0, 64]]);

        engine.tick(t0 + Duration::from_millis(2600));
        assert_eq!(mock.get_messages().last(), Some(&vec![0xB0, 0, 127]));
    }

    #[test]
    fn test_playback_stops_at_end() {
        let (mut engine, _mock) = engine();
        let t0 = Instant::now();
        engine.command(TransportCommand::Play, t0);
        engine.tick(t0 + Duration::from_secs(5));

        assert!(!engine.is_playing());
        assert!(!engine.scrubber().is_playing());
        assert_eq!(engine.position(t0 + Duration::from_secs(6)), 3.0);
    }

    #[test]
    fn test_reenable_triggers_resync() {
        let (mut engine, mock) = engine();
        let now = Instant::now();
        engine.command(TransportCommand::Seek(2.0), now);
        engine.command(TransportCommand::ToggleConsole(0), now);
        assert!(!engine.router().console_enabled(0));
        mock.clear();

        // Disabled: nothing transmitted on seek
        engine.command(TransportCommand::Seek(2.7), now);
        assert!(mock.get_messages().is_empty());

        engine.command(TransportCommand::ToggleConsole(0), now);
        assert_eq!(mock.get_messages(), vec![vec![0xB0, 0, 127]]);
    }

    #[test]
    fn test_send_toggle_resyncs_when_resumed() {
        let (mut engine, mock) = engine();
        let now = Instant::now();
        engine.command(TransportCommand::ToggleSend, now);
        assert!(!engine.router().send_enabled());
        engine.command(TransportCommand::Seek(1.0), now);
        assert!(mock.get_messages().is_empty());

        engine.command(TransportCommand::ToggleSend, now);
        assert_eq!(mock.get_messages(), vec![vec![0xB0, 0, 64]]);
    }

    #[test]
    fn test_stop_resets_event_index() {
        let (mut engine, _mock) = engine();
        let now = Instant::now();
        engine.command(TransportCommand::Play, now);
        engine.command(TransportCommand::Seek(2.0), now);
        assert!(engine.scrubber().current_event_index() >= 0);

        engine.command(TransportCommand::Stop, now);
        assert_eq!(engine.scrubber().current_event_index(), -1);
        assert_eq!(engine.position(now), 0.0);
    }

    #[test]
    fn test_status_snapshot() {
        let (mut engine, _mock) = engine();
        let now = Instant::now();
        engine.command(TransportCommand::Nudge(1.2), now);
        let status = engine.status(now);

        assert!(!status.loading);
        assert!((status.position - 1.2).abs() < 1e-6);
        assert_eq!(status.duration, 3.0);
        assert_eq!(status.event_count, 4);
        assert_eq!(status.console_enabled, [true, true, false]);
        assert_eq!(status.last_messages[0], Some(LastMessage { number: 1, value: 64 }));
    }

    #[tokio::test]
    async fn test_spawned_transport_reports_ready() {
        let log = Arc::new(EventLog::from_events(vec![ControllerEvent::new(0.2, 0, 1, 3, 30)]));
        let router = OutputRouter::new(PlaybackEnableMask::from_log(&log));
        let handle = spawn(log, 1.0, router);
        let mut status = handle.subscribe();

        let ready = status.wait_for(|s| !s.loading).await.is_ok();
        assert!(ready);

        handle.send(TransportCommand::Seek(0.5));
        let seeked = status
            .wait_for(|s| s.last_messages[0].is_some())
            .await
            .map(|s| s.last_messages[0]);
        assert_eq!(seeked.ok().flatten(), Some(LastMessage { number: 3, value: 30 }));

        let engine = handle.shutdown().await;
        assert!(matches!(engine, Ok(Some(_))));
    }
}
