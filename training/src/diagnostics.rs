//! Diagnostics sink shared by the trainer and the hyper surfer.
//!
//! Messages are tagged with a [`Channel`] and a [`log::Level`]. Training code emits
//! per-run summaries at `Info` ("general") and per-step detail at `Debug` ("extra").

use log::Level;
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Progress of training runs.
    Learn,
    /// Progress of hyper parameter searches.
    Hyper,
    /// Messages from the program driving the library.
    Client,
    Error,
}

impl Channel {
    /// `log` target used for this channel.
    pub fn target(&self) -> &'static str {
        match self {
            Channel::Learn => "learn",
            Channel::Hyper => "hyper",
            Channel::Client => "client",
            Channel::Error => "error",
        }
    }
}

pub trait Diagnostics: Send + Sync {
    fn emit(&self, channel: Channel, level: Level, args: fmt::Arguments<'_>);

    fn general(&self, channel: Channel, args: fmt::Arguments<'_>) {
        self.emit(channel, Level::Info, args);
    }

    fn extra(&self, channel: Channel, args: fmt::Arguments<'_>) {
        self.emit(channel, Level::Debug, args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.emit(Channel::Error, Level::Error, args);
    }

    /// Called by the trainer after every completed epoch.
    fn epoch_finished(&self, _epoch: usize, _max_epochs: Option<usize>) {}
}

/// Forwards to the `log` facade, one target per channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn emit(&self, channel: Channel, level: Level, args: fmt::Arguments<'_>) {
        log::log!(target: channel.target(), level, "{args}");
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn emit(&self, _channel: Channel, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    messages: Mutex<Vec<(Channel, Level, String)>>,
    epochs: Mutex<usize>,
}

impl MemoryDiagnostics {
    pub fn messages(&self) -> Vec<(Channel, Level, String)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages_on(&self, channel: Channel) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(c, _, _)| *c == channel)
            .map(|(_, _, message)| message)
            .collect()
    }

    /// Number of `epoch_finished` notifications received.
    pub fn epochs(&self) -> usize {
        *self.epochs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn emit(&self, channel: Channel, level: Level, args: fmt::Arguments<'_>) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel, level, args.to_string()));
    }

    fn epoch_finished(&self, _epoch: usize, _max_epochs: Option<usize>) {
        *self.epochs.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}
