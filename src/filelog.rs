// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Human-readable, size-capped log file
//!
//! Each entry is appended with its own open/write/close cycle so no handle
//! is kept between calls. The most recent message is recorded in a
//! [`MessageSink`] that callers can share between loggers and read back for
//! status displays.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::LogConfig;
use crate::{PipestoreError, Result};

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Exception,
}

impl LogLevel {
    /// Level column as written to the file, padded to a fixed width
    pub fn tag(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO     ",
            LogLevel::Warning => "WARNING  ",
            LogLevel::Error => "ERROR    ",
            LogLevel::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Exception => "exception",
        };
        f.write_str(name)
    }
}

/// A recorded message and its level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub message: String,
    pub level: LogLevel,
}

/// Shared slot holding the last message logged by any attached [`Filelog`]
#[derive(Debug, Clone, Default)]
pub struct MessageSink {
    inner: Arc<Mutex<Option<LastMessage>>>,
}

impl MessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message: &str, level: LogLevel) {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(LastMessage {
            message: message.to_string(),
            level,
        });
    }

    pub fn last(&self) -> Option<LastMessage> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Append-only log file writer
#[derive(Debug, Clone)]
pub struct Filelog {
    path: PathBuf,
    log_name: String,
    is_date: bool,
    is_time: bool,
    sink: MessageSink,
}

impl Filelog {
    /// Open `<dir>/<filename>.log` with default options and a private sink
    pub fn new(filename: &str, dir: Option<&Path>) -> Result<Self> {
        let config = LogConfig {
            filename: filename.to_string(),
            dir: dir.map(Path::to_path_buf),
            ..LogConfig::default()
        };
        Self::with_config(&config, MessageSink::new())
    }

    /// Open the log described by `config`, reporting into `sink`.
    ///
    /// A missing file starts with the banner. A file already larger than
    /// `size_cap` bytes is cleared.
    pub fn with_config(config: &LogConfig, sink: MessageSink) -> Result<Self> {
        let filename = if config.filename.is_empty() {
            "defaultLog"
        } else {
            config.filename.as_str()
        };
        let dir = match &config.dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir().ok_or_else(|| {
                PipestoreError::Config("Cannot determine home directory for log file".to_string())
            })?,
        };
        fs::create_dir_all(&dir)?;

        let log = Self {
            path: dir.join(format!("{}.log", filename)),
            log_name: config.log_name.clone().unwrap_or_else(|| filename.to_string()),
            is_date: config.date,
            is_time: config.time,
            sink,
        };

        if !log.path.is_file() {
            log.welcome()?;
        }
        if log.get_size()? > config.size_cap {
            log.clear()?;
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    pub fn sink(&self) -> &MessageSink {
        &self.sink
    }

    pub fn get_last_message(&self) -> Option<LastMessage> {
        self.sink.last()
    }

    pub fn info(&self, msg: impl fmt::Display) -> Result<String> {
        self.entry(msg.to_string(), LogLevel::Info)
    }

    pub fn warning(&self, msg: impl fmt::Display) -> Result<String> {
        self.entry(msg.to_string(), LogLevel::Warning)
    }

    /// Log an error. With `proceed == false` the entry is written and then
    /// returned as [`PipestoreError::Aborted`].
    pub fn error(&self, msg: impl fmt::Display, proceed: bool) -> Result<String> {
        let msg = self.entry(msg.to_string(), LogLevel::Error)?;
        if proceed {
            Ok(msg)
        } else {
            Err(PipestoreError::Aborted(msg))
        }
    }

    /// Log an exception entry. The sink records it as [`LogLevel::Exception`],
    /// not [`LogLevel::Error`], so status displays matching on errors should
    /// accept both.
    pub fn exception(&self, msg: impl fmt::Display) -> Result<String> {
        self.entry(msg.to_string(), LogLevel::Exception)
    }

    pub fn title(&self, msg: &str) -> Result<String> {
        let rule = "=".repeat(msg.chars().count());
        self.append(&["", rule.as_str(), msg, rule.as_str()])?;
        Ok(msg.to_string())
    }

    pub fn header(&self, msg: &str) -> Result<String> {
        let rule = "=".repeat(msg.chars().count());
        self.append(&["", msg, rule.as_str()])?;
        Ok(msg.to_string())
    }

    pub fn seperator(&self) -> Result<()> {
        let rule = "-".repeat(30);
        self.append(&["", rule.as_str()])
    }

    /// Delete the file and start over with the banner
    pub fn clear(&self) -> Result<()> {
        if self.path.is_file() {
            fs::remove_file(&self.path)?;
        }
        self.welcome()
    }

    /// Size of the log file in bytes
    pub fn get_size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn welcome(&self) -> Result<()> {
        let rule = "=".repeat(self.log_name.chars().count());
        self.append(&[rule.as_str(), self.log_name.as_str(), rule.as_str(), ""])
    }

    fn entry(&self, msg: String, level: LogLevel) -> Result<String> {
        let line = format!("{}{}: {}", self.stamp(), level.tag(), msg);
        self.append(&[line.as_str()])?;
        self.sink.record(&msg, level);
        Ok(msg)
    }

    fn stamp(&self) -> String {
        if !self.is_date && !self.is_time {
            return String::new();
        }
        let now = Local::now();
        let mut parts = Vec::with_capacity(2);
        if self.is_date {
            parts.push(now.format("%d/%m/%y").to_string());
        }
        if self.is_time {
            parts.push(now.format("%H:%M").to_string());
        }
        format!("{} - ", parts.join(" - "))
    }

    fn append(&self, lines: &[&str]) -> Result<()> {
        let mut buf = String::new();
        for line in lines {
            buf.push_str(line);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buf.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
