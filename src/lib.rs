// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! pipestore: persistence core for DCC pipeline tools
//!
//! JSON settings files with change tracking, fallback lookup and locked,
//! atomic writes, plus a size-capped human-readable log file.

pub mod config;
pub mod error;
pub mod filelog;
pub mod io;
pub mod settings;

pub use config::{LogConfig, StoreConfig};
pub use error::{PipestoreError, Result};
pub use filelog::{Filelog, LastMessage, LogLevel, MessageSink};
pub use io::{FileLock, Io};
pub use settings::Settings;
