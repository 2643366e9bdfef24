// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::{fmt, path::PathBuf};

use clap::{Parser, ValueEnum};
use ripple::{engine::FifoMode, observer::LogLevel};
use tracing::level_filters::LevelFilter;

/// Overflow behaviour of the burst FIFO.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Fifo {
    DropNew,
    DropOld,
}

impl From<Fifo> for FifoMode {
    fn from(fifo: Fifo) -> FifoMode {
        match fifo {
            Fifo::DropNew => FifoMode::DropNew,
            Fifo::DropOld => FifoMode::DropOld,
        }
    }
}

impl fmt::Display for Fifo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", FifoMode::from(*self))
    }
}

/// Level of the driver messages forwarded to observers.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DriverLog {
    Off,
    Error,
    Warning,
    Info,
    Debug,
}

impl From<DriverLog> for LogLevel {
    fn from(level: DriverLog) -> LogLevel {
        match level {
            DriverLog::Off => LogLevel::Off,
            DriverLog::Error => LogLevel::Error,
            DriverLog::Warning => LogLevel::Warning,
            DriverLog::Info => LogLevel::Info,
            DriverLog::Debug => LogLevel::Debug,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Sensor profile describing ranges, slots and antennas.
    #[arg(long, env, default_value = "profiles/fmcw-60ghz.json")]
    pub profile: PathBuf,

    /// Slot configuration to apply before activation. Without it only the
    /// burst period is set and profile defaults apply.
    #[arg(long, env)]
    pub slot_config: Option<PathBuf>,

    /// Burst period in microseconds used without a slot configuration.
    #[arg(long, env, default_value = "40000")]
    pub burst_period_us: u32,

    /// Radar id passed to create.
    #[arg(long, env, default_value = "0")]
    pub radar_id: i32,

    /// Config slot to configure and activate.
    #[arg(long, env, default_value = "0")]
    pub slot: u8,

    /// Number of bursts to read, 0 reads until an error occurs.
    #[arg(long, env, default_value = "10")]
    pub bursts: usize,

    /// Burst read timeout in milliseconds.
    #[arg(long, env, default_value = "1000")]
    pub timeout_ms: u64,

    /// Burst FIFO overflow behaviour.
    #[arg(long, env, default_value = "drop-old")]
    pub fifo_mode: Fifo,

    /// Write every burst, header followed by samples, to this file.
    #[arg(long, env)]
    pub output: Option<PathBuf>,

    /// ISO 3166-1 alpha-2 code of the country of operation.
    #[arg(long, env)]
    pub country: Option<String>,

    /// Print the sensor description as JSON and exit.
    #[arg(long, env)]
    pub info: bool,

    /// Print the register file before exiting.
    #[arg(long, env)]
    pub registers: bool,

    /// Driver log level forwarded to observers
    #[arg(long, env, default_value = "info")]
    pub driver_log: DriverLog,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// Enable Tracy profiler broadcast
    #[arg(long, env)]
    pub tracy: bool,
}
