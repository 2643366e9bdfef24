// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::{fmt, io};

use crate::{
    param::{Axis, ParamId},
    state::{PowerOp, RadarState},
};

/// Status codes reported back by every radar API operation.
///
/// The numeric values are part of the binary contract shared with C
/// drivers and must never be renumbered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Status {
    /// Default value used at initialization.
    Undefined = 0,
    /// Operation completed successfully.
    Ok = 1,
    /// Operation failed and no more information can be provided.
    Error = 2,
    /// Input parameters are invalid or out of supported range.
    BadInput = 3,
    /// Operation timed out.
    Timeout = 4,
    /// Operation cannot be performed at the current state.
    BadState = 5,
    /// Operation failed due to limited resources.
    ResourceLimit = 6,
    /// Operation is not supported.
    Unsupported = 7,
    /// An internal error that should never happen.
    InternalError = 8,
}

impl Status {
    /// Decodes a raw status code, returning `None` for unknown values.
    pub fn from_u16(code: u16) -> Option<Status> {
        match code {
            0 => Some(Status::Undefined),
            1 => Some(Status::Ok),
            2 => Some(Status::Error),
            3 => Some(Status::BadInput),
            4 => Some(Status::Timeout),
            5 => Some(Status::BadState),
            6 => Some(Status::ResourceLimit),
            7 => Some(Status::Unsupported),
            8 => Some(Status::InternalError),
            _ => None,
        }
    }

    /// Status code of an operation result.
    pub fn of<T>(result: &Result<T>) -> Status {
        match result {
            Ok(_) => Status::Ok,
            Err(err) => err.status(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Undefined => write!(f, "undefined"),
            Status::Ok => write!(f, "ok"),
            Status::Error => write!(f, "error"),
            Status::BadInput => write!(f, "bad input"),
            Status::Timeout => write!(f, "timeout"),
            Status::BadState => write!(f, "bad state"),
            Status::ResourceLimit => write!(f, "resource limit"),
            Status::Unsupported => write!(f, "unsupported"),
            Status::InternalError => write!(f, "internal error"),
        }
    }
}

/// Radar API error types.
#[derive(Debug)]
pub enum Error {
    /// I/O error, typically while loading a profile
    Io(io::Error),
    /// Malformed profile or slot configuration document
    Json(serde_json::Error),
    /// Profile rejected by validation
    InvalidProfile(String),
    /// Configuration slot does not exist
    InvalidSlot(u8),
    /// Parameter has no entry in the range table
    UnknownParam(Axis, ParamId),
    /// Parameter name could not be parsed
    UnknownParamName(String),
    /// Value outside of the declared range
    OutOfRange {
        param: ParamId,
        value: u32,
        min: u32,
        max: u32,
    },
    /// Antenna mask selects no antenna or a missing antenna
    InvalidAntennaMask(u32),
    /// Antenna mask must select exactly one antenna
    AmbiguousAntennaMask(u32),
    /// Requested power transition is not legal from the current state
    InvalidTransition(PowerOp, RadarState),
    /// Operation needs a state the radar is not in
    WrongState(&'static str, RadarState),
    /// Slot is active and cannot be modified
    SlotActive(u8),
    /// Slot lacks a required main parameter
    SlotIncomplete(u8, ParamId),
    /// Slot failed the activation compatibility check
    Incompatible(u8, String),
    /// Activating would exceed the maximum number of active slots
    TooManyActiveSlots(u8),
    /// Slot is the only one feeding the running stream
    SlotStreaming(u8),
    /// Parameter was never configured and has no default
    ParamNotSet(ParamId),
    /// No slot is active
    NoActiveSlot,
    /// Streaming is running
    Streaming,
    /// Streaming has not been started or was stopped
    NotStreaming,
    /// Every active slot executed its burst limit
    BurstLimitReached,
    /// No burst completed within the timeout
    Timeout,
    /// Register has never been written
    UnknownRegister(u32),
    /// Observer id is not registered
    UnknownObserver(u64),
    /// Radar id already has a live instance
    DuplicateRadar(i32),
    /// Module still owns live sensors
    SensorsAlive(usize),
    /// Malformed ISO 3166-1 alpha-2 code
    InvalidCountryCode(String),
    /// Country does not permit operation of this sensor
    CountryNotPermitted(String),
    /// Feature not provided by the sensor profile
    Unsupported(&'static str),
    /// FIFO mode value not usable
    InvalidFifoMode,
    /// Log level value not usable
    InvalidLogLevel,
    /// Wire buffer too short to hold a burst header
    UnexpectedEndOfSlice(usize),
    /// Wire header carries an unknown radar type
    InvalidRadarType(u8),
    /// Wire header carries an unknown sample data type
    InvalidSampleType(u32),
    /// Acquisition thread could not be spawned
    Spawn(io::Error),
    /// Internal lock was poisoned by a panicking thread
    Poisoned(&'static str),
}

impl Error {
    /// Maps the error onto its wire status code.
    pub fn status(&self) -> Status {
        match self {
            Error::Io(_) => Status::Error,
            Error::Json(_)
            | Error::InvalidProfile(_)
            | Error::InvalidSlot(_)
            | Error::UnknownParam(..)
            | Error::UnknownParamName(_)
            | Error::OutOfRange { .. }
            | Error::InvalidAntennaMask(_)
            | Error::AmbiguousAntennaMask(_)
            | Error::UnknownRegister(_)
            | Error::UnknownObserver(_)
            | Error::InvalidCountryCode(_)
            | Error::InvalidFifoMode
            | Error::InvalidLogLevel
            | Error::UnexpectedEndOfSlice(_)
            | Error::InvalidRadarType(_)
            | Error::InvalidSampleType(_) => Status::BadInput,
            Error::InvalidTransition(..)
            | Error::WrongState(..)
            | Error::SlotActive(_)
            | Error::SlotIncomplete(..)
            | Error::Incompatible(..)
            | Error::TooManyActiveSlots(_)
            | Error::SlotStreaming(_)
            | Error::ParamNotSet(_)
            | Error::NoActiveSlot
            | Error::Streaming
            | Error::NotStreaming
            | Error::BurstLimitReached
            | Error::DuplicateRadar(_)
            | Error::SensorsAlive(_) => Status::BadState,
            Error::Timeout => Status::Timeout,
            Error::Spawn(_) => Status::ResourceLimit,
            Error::CountryNotPermitted(_) | Error::Unsupported(_) => Status::Unsupported,
            Error::Poisoned(_) => Status::InternalError,
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::Json(err) => write!(f, "json error: {}", err),
            Error::InvalidProfile(err) => write!(f, "invalid profile: {}", err),
            Error::InvalidSlot(slot) => write!(f, "invalid config slot: {}", slot),
            Error::UnknownParam(axis, param) => {
                write!(f, "unknown {} parameter: {}", axis, param)
            }
            Error::UnknownParamName(name) => write!(f, "unknown parameter name: {}", name),
            Error::OutOfRange {
                param,
                value,
                min,
                max,
            } => write!(
                f,
                "value {} for {} outside of range [{}, {}]",
                value, param, min, max
            ),
            Error::InvalidAntennaMask(mask) => write!(f, "invalid antenna mask: 0x{:X}", mask),
            Error::AmbiguousAntennaMask(mask) => {
                write!(f, "antenna mask must select one antenna: 0x{:X}", mask)
            }
            Error::InvalidTransition(op, state) => {
                write!(f, "cannot {} while {}", op, state)
            }
            Error::WrongState(op, state) => write!(f, "cannot {} while {}", op, state),
            Error::SlotActive(slot) => write!(f, "config slot {} is active", slot),
            Error::SlotIncomplete(slot, param) => {
                write!(f, "config slot {} is missing {}", slot, param)
            }
            Error::Incompatible(slot, reason) => {
                write!(f, "config slot {} is incompatible: {}", slot, reason)
            }
            Error::TooManyActiveSlots(max) => {
                write!(f, "no more than {} config slots can be active", max)
            }
            Error::SlotStreaming(slot) => {
                write!(f, "config slot {} is the only slot feeding the stream", slot)
            }
            Error::ParamNotSet(param) => write!(f, "parameter {} is not set", param),
            Error::NoActiveSlot => write!(f, "no active config slot"),
            Error::Streaming => write!(f, "data streaming is running"),
            Error::NotStreaming => write!(f, "data streaming is not running"),
            Error::BurstLimitReached => write!(f, "burst limit reached"),
            Error::Timeout => write!(f, "timed out waiting for burst"),
            Error::UnknownRegister(addr) => write!(f, "unknown register: 0x{:08X}", addr),
            Error::UnknownObserver(id) => write!(f, "unknown observer: {}", id),
            Error::DuplicateRadar(id) => write!(f, "radar {} already created", id),
            Error::SensorsAlive(count) => write!(f, "{} radar sensors still alive", count),
            Error::InvalidCountryCode(code) => write!(f, "invalid country code: {:?}", code),
            Error::CountryNotPermitted(code) => {
                write!(f, "operation not permitted in country {}", code)
            }
            Error::Unsupported(what) => write!(f, "unsupported: {}", what),
            Error::InvalidFifoMode => write!(f, "invalid fifo mode"),
            Error::InvalidLogLevel => write!(f, "invalid log level"),
            Error::UnexpectedEndOfSlice(len) => write!(f, "unexpected end of slice: {}", len),
            Error::InvalidRadarType(value) => write!(f, "invalid radar type: {}", value),
            Error::InvalidSampleType(value) => write!(f, "invalid sample data type: {}", value),
            Error::Spawn(err) => write!(f, "unable to spawn acquisition thread: {}", err),
            Error::Poisoned(what) => write!(f, "{} lock poisoned", what),
        }
    }
}

/// Result alias used by every radar API operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;
