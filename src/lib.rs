// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Controller timeline capture and replay.
//!
//! Control-change messages from up to three consoles are recorded into a
//! time-ordered [`session::EventLog`]. A [`timeline::TimeIndex`] of periodic
//! snapshots lets the [`timeline::Scrubber`] jump anywhere in the session and
//! resend the exact controller state through the [`output::OutputRouter`].

pub mod capture;
pub mod config;
pub mod midi;
pub mod output;
pub mod session;
pub mod stats;
pub mod timeline;
pub mod transport;
pub mod ui;
