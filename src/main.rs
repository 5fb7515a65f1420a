// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use ccreplay::capture::{CaptureHub, CaptureNotice};
use ccreplay::config::watcher::{ConfigEvent, ConfigWatcher};
use ccreplay::config::SessionFile;
use ccreplay::midi::{print_destinations, print_sources};
use ccreplay::session::{console_name, SessionContext, CONSOLE_COUNT};
use ccreplay::stats;
use ccreplay::transport::{self, TransportCommand};
use ccreplay::ui::{stats_rows, App, UiState};

/// File the terminal monitor logs to, since stdout belongs to the UI
const MONITOR_LOG: &str = "ccreplay.log";

fn print_usage() {
    println!("ccreplay - MIDI controller timeline recorder and scrubber");
    println!();
    println!("Usage: ccreplay [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --list-sources                   List MIDI sources (inputs)");
    println!("  --list-midi                      List MIDI destinations (outputs)");
    println!("  --record <settings> <session>    Record controller moves into a session file");
    println!("  --play <settings> <session>      Scrub and replay a session in the monitor");
    println!("  --stats <session>                Print per-controller statistics");
    println!("  --help                           Show this help message");
}

/// Install the tracing subscriber. `RUST_LOG` overrides the default level.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ccreplay=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            registry
                .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                .init();
        }
        None => registry.with(fmt::layer().with_target(false)).init(),
    }
    Ok(())
}

/// A line typed while recording
#[derive(Debug, Clone, PartialEq)]
enum RecordInput {
    Stop,
    Learn(u8),
    LearnAll(u8),
    EndLearn(u8),
    Filter(u8, String),
    Unknown(String),
}

/// Console by letter (A-C) or number (1-3)
fn parse_console(text: &str) -> Option<u8> {
    let console = match text.to_ascii_uppercase().as_str() {
        "A" | "1" => 0,
        "B" | "2" => 1,
        "C" | "3" => 2,
        _ => return None,
    };
    Some(console)
}

fn parse_record_input(line: &str) -> RecordInput {
    let line = line.trim();
    if line.is_empty() || line == "q" {
        return RecordInput::Stop;
    }
    let mut parts = line.splitn(3, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let Some(console) = parts.next().and_then(parse_console) else {
        return RecordInput::Unknown(line.to_string());
    };
    match verb {
        "l" => RecordInput::Learn(console),
        "L" => RecordInput::LearnAll(console),
        "x" => RecordInput::EndLearn(console),
        "f" => RecordInput::Filter(console, parts.next().unwrap_or_default().to_string()),
        _ => RecordInput::Unknown(line.to_string()),
    }
}

/// Forward stdin lines to a channel
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Configured input of each console
fn configured_inputs(context: &SessionContext) -> [Option<usize>; CONSOLE_COUNT] {
    std::array::from_fn(|console| {
        context
            .settings()
            .console(console as u8)
            .and_then(|settings| settings.input)
    })
}

/// Connect or disconnect every console whose input differs from `current`
fn connect_sources(
    hub: &mut CaptureHub,
    current: &[Option<usize>; CONSOLE_COUNT],
    wanted: &[Option<usize>; CONSOLE_COUNT],
) {
    for console in 0..CONSOLE_COUNT {
        if current[console] == wanted[console] && hub.is_connected(console as u8) == wanted[console].is_some() {
            continue;
        }
        match wanted[console] {
            Some(index) => hub.connect_source(console as u8, index),
            None => hub.disconnect_source(console as u8),
        }
    }
}

fn record(settings_path: &str, session_path: &str) -> Result<()> {
    let mut context = SessionContext::open(settings_path)?;
    let (notice_tx, notice_rx) = mpsc::channel();
    let mut hub = CaptureHub::new(context.build_capture().with_notices(notice_tx));
    let mut inputs = configured_inputs(&context);
    connect_sources(&mut hub, &[None; CONSOLE_COUNT], &inputs);

    let watcher = match ConfigWatcher::new(settings_path, None) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "settings will not be reloaded");
            None
        }
    };

    hub.with(|capture| capture.start_recording(Instant::now()))
        .ok_or_else(|| anyhow!("capture state poisoned"))?;
    println!("Recording. Commands: l <con> learn, L <con> learn all, x <con> end learn,");
    println!("f <con> <ranges> set filter, Enter to stop.");

    let lines = spawn_stdin_reader();
    loop {
        for notice in notice_rx.try_iter() {
            match notice {
                CaptureNotice::MaskChanged { console, filter } => {
                    println!("Console {} filter: {}", console_name(console), filter);
                    context.filter_changed(console, &filter);
                }
                CaptureNotice::Activity { .. } => {}
            }
        }

        if let Some(watcher) = &watcher {
            for event in watcher.recv_all() {
                match event {
                    // Our own filter writes come back unchanged
                    ConfigEvent::Reloaded(settings) if *settings == *context.settings() => {}
                    ConfigEvent::Reloaded(settings) => {
                        context.replace_settings(*settings);
                        let fresh = context.build_capture();
                        hub.with(|capture| {
                            for console in 0..CONSOLE_COUNT as u8 {
                                if let (Some(channel), Some(filter)) =
                                    (fresh.channel_filter(console), fresh.filter(console))
                                {
                                    capture.configure(console, channel, filter.clone());
                                }
                            }
                        });
                        let wanted = configured_inputs(&context);
                        connect_sources(&mut hub, &inputs, &wanted);
                        inputs = wanted;
                        info!("settings reloaded");
                    }
                    ConfigEvent::Error(e) => warn!(error = %e, "settings reload failed"),
                    ConfigEvent::Removed(path) => warn!(path = ?path, "settings file removed"),
                }
            }
        }

        let input = match lines.try_recv() {
            Ok(line) => parse_record_input(&line),
            Err(TryRecvError::Empty) => {
                thread::sleep(Duration::from_millis(20));
                continue;
            }
            Err(TryRecvError::Disconnected) => RecordInput::Stop,
        };

        match input {
            RecordInput::Stop => break,
            RecordInput::Learn(console) => {
                hub.with(|capture| capture.learn(console, true));
            }
            RecordInput::LearnAll(console) => {
                hub.with(|capture| capture.learn_all(console, true));
            }
            RecordInput::EndLearn(console) => {
                hub.with(|capture| {
                    capture.learn(console, false);
                    capture.learn_all(console, false);
                });
            }
            RecordInput::Filter(console, text) => {
                match context.set_filter(console, &text, &hub) {
                    Ok(stored) => println!("Console {} filter: {}", console_name(console), stored),
                    Err(e) => println!("Invalid filter: {}", e),
                }
            }
            RecordInput::Unknown(line) => println!("Unknown command: {}", line),
        }
    }

    let (log, duration) = hub
        .with(|capture| capture.stop_recording(Instant::now()))
        .flatten()
        .ok_or_else(|| anyhow!("recording was not running"))?;
    for console in 0..CONSOLE_COUNT as u8 {
        hub.disconnect_source(console);
    }

    println!("Recorded {} events over {:.2}s", log.len(), duration);
    context.replace_log(log, duration);
    context.save_session(session_path)?;
    println!("Saved {}", session_path);
    Ok(())
}

fn play(settings_path: &str, session_path: &str) -> Result<()> {
    let mut context = SessionContext::open(settings_path)?;
    context.load_session(session_path)?;

    let mut router = context.build_router();
    context.open_outputs(&mut router);
    let session_stats = stats::compute(context.log(), context.duration());

    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();
    let handle = transport::spawn(Arc::clone(context.log()), context.duration(), router);

    let mut state = UiState::new(handle.status());
    state.stats = Some(session_stats);
    for (console, settings) in context.settings().consoles.iter().enumerate().take(CONSOLE_COUNT) {
        state.console_names[console] = settings.name.clone();
    }

    let mut app = App::new()?;
    while app.is_running() {
        state.update(handle.status(), Instant::now());
        state.clear_expired_status();
        app.draw(&state)?;

        if let Some((code, modifiers)) = app.poll_key()? {
            let action = app.handle_key(&mut state, code, modifiers);
            match action.command() {
                Some(TransportCommand::Shutdown) | None => {}
                Some(command) => handle.send(command),
            }
        }
    }
    drop(app);

    runtime.block_on(handle.shutdown())?;
    Ok(())
}

fn print_stats(session_path: &str) -> Result<()> {
    let session = SessionFile::load(session_path)?;
    let log = session.to_log();
    let session_stats = stats::compute(&log, session.duration);

    println!("{} events over {:.2}s", log.len(), session.duration);
    println!(
        "{:<4}{:>4}{:>7}{:>5}{:>5}{:>8}{:>8}{:>10}{:>7}",
        "Con", "CC", "Count", "Min", "Max", "Mean", "RMS", "Active s", "Ev/s"
    );
    for row in stats_rows(&session_stats) {
        println!(
            "{:<4}{:>4}{:>7}{:>5}{:>5}{:>8}{:>8}{:>10}{:>7}",
            row[0], row[1], row[2], row[3], row[4], row[5], row[6], row[7], row[8]
        );
    }
    Ok(())
}

fn required_args<'a>(args: &'a [String], option: &str) -> (&'a str, &'a str) {
    if args.len() < 4 {
        eprintln!("Error: {} requires <settings> <session>", option);
        std::process::exit(1);
    }
    (args[2].as_str(), args[3].as_str())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("ccreplay - MIDI controller timeline recorder and scrubber");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--list-sources" => print_sources(),
        "--list-midi" => print_destinations(),
        "--record" => {
            let (settings, session) = required_args(&args, "--record");
            init_logging(None)?;
            record(settings, session)?;
        }
        "--play" => {
            let (settings, session) = required_args(&args, "--play");
            init_logging(Some(Path::new(MONITOR_LOG)))?;
            play(settings, session)?;
        }
        "--stats" => {
            if args.len() < 3 {
                eprintln!("Error: --stats requires a session file");
                std::process::exit(1);
            }
            init_logging(None)?;
            print_stats(&args[2])?;
        }
        "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console() {
        assert_eq!(parse_console("a"), Some(0));
        assert_eq!(parse_console("B"), Some(1));
        assert_eq!(parse_console("3"), Some(2));
        assert_eq!(parse_console("D"), None);
    }

    #[test]
    fn test_parse_record_input() {
        assert_eq!(parse_record_input(""), RecordInput::Stop);
        assert_eq!(parse_record_input("q"), RecordInput::Stop);
        assert_eq!(parse_record_input("l A"), RecordInput::Learn(0));
        assert_eq!(parse_record_input("L c"), RecordInput::LearnAll(2));
        assert_eq!(parse_record_input("x 2"), RecordInput::EndLearn(1));
        assert_eq!(
            parse_record_input("f B 1-8 12"),
            RecordInput::Filter(1, "1-8 12".to_string())
        );
        assert!(matches!(parse_record_input("f Z 1"), RecordInput::Unknown(_)));
        assert!(matches!(parse_record_input("zz A"), RecordInput::Unknown(_)));
    }
}
