// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Power mode states of a radar sensor. Discriminants match the radar API
/// wire values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum RadarState {
    /// Radar is emitting and collecting data.
    Active = 1,
    /// Powered but neither emitting nor sleeping.
    Idle = 2,
    /// Configuration persists with reduced power consumption.
    Sleep = 3,
    /// Turned off, slot activations are reset.
    Off = 4,
}

impl RadarState {
    /// Parameters may only be written while Off or Idle.
    pub fn is_configurable(&self) -> bool {
        matches!(self, RadarState::Off | RadarState::Idle)
    }
}

impl fmt::Display for RadarState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RadarState::Active => write!(f, "active"),
            RadarState::Idle => write!(f, "idle"),
            RadarState::Sleep => write!(f, "sleep"),
            RadarState::Off => write!(f, "off"),
        }
    }
}

/// Power management requests.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PowerOp {
    TurnOn,
    TurnOff,
    GoSleep,
    WakeUp,
}

impl fmt::Display for PowerOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PowerOp::TurnOn => write!(f, "turn on"),
            PowerOp::TurnOff => write!(f, "turn off"),
            PowerOp::GoSleep => write!(f, "go to sleep"),
            PowerOp::WakeUp => write!(f, "wake up"),
        }
    }
}

/// Facts about the rest of the session the transition guards depend on.
#[derive(Copy, Clone, Debug, Default)]
pub struct Guard {
    pub active_slots: usize,
    pub streaming: bool,
}

/// Tracks the sensor power state.
///
/// ```text
///          TurnOn          TurnOn (>= 1 active slot)
///   Off ----------> Idle -----------------------> Active <---> Sleep
///    ^               |                              |    GoSleep/WakeUp
///    +---------------+------------------------------+
///          TurnOff (streaming stopped)
/// ```
///
/// Active also falls back to Idle when a burst limited acquisition ends.
///
/// A rejected request leaves the state untouched.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: RadarState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// A freshly created sensor is powered and idle.
    pub fn new() -> StateMachine {
        StateMachine {
            state: RadarState::Idle,
        }
    }

    pub fn state(&self) -> RadarState {
        self.state
    }

    /// Resolves the target state of `op` without applying it.
    pub fn next(&self, op: PowerOp, guard: Guard) -> Result<RadarState> {
        match (self.state, op) {
            (RadarState::Off, PowerOp::TurnOn) => Ok(RadarState::Idle),
            (RadarState::Idle, PowerOp::TurnOn) => match guard.active_slots {
                0 => Err(Error::NoActiveSlot),
                _ => Ok(RadarState::Active),
            },
            (RadarState::Active | RadarState::Idle, PowerOp::TurnOff) => match guard.streaming {
                true => Err(Error::Streaming),
                false => Ok(RadarState::Off),
            },
            (RadarState::Active, PowerOp::GoSleep) => match guard.streaming {
                true => Err(Error::Streaming),
                false => Ok(RadarState::Sleep),
            },
            (RadarState::Sleep, PowerOp::WakeUp) => Ok(RadarState::Active),
            (state, op) => Err(Error::InvalidTransition(op, state)),
        }
    }

    /// Active -> Idle once the radar executed its configured number of
    /// bursts.
    pub fn complete(&mut self) -> Result<RadarState> {
        match self.state {
            RadarState::Active => {
                self.state = RadarState::Idle;
                Ok(RadarState::Idle)
            }
            state => Err(Error::WrongState("complete acquisition", state)),
        }
    }

    /// Applies `op`, returning the new state.
    pub fn apply(&mut self, op: PowerOp, guard: Guard) -> Result<RadarState> {
        let next = self.next(op, guard)?;
        self.state = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;

    const READY: Guard = Guard {
        active_slots: 1,
        streaming: false,
    };

    #[test]
    fn test_wire_values() {
        assert_eq!(RadarState::Active as u16, 1);
        assert_eq!(RadarState::Idle as u16, 2);
        assert_eq!(RadarState::Sleep as u16, 3);
        assert_eq!(RadarState::Off as u16, 4);
    }

    #[test]
    fn test_full_cycle() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.state(), RadarState::Idle);
        assert_eq!(sm.apply(PowerOp::TurnOff, READY).unwrap(), RadarState::Off);
        assert_eq!(sm.apply(PowerOp::TurnOn, READY).unwrap(), RadarState::Idle);
        assert_eq!(sm.apply(PowerOp::TurnOn, READY).unwrap(), RadarState::Active);
        assert_eq!(sm.apply(PowerOp::GoSleep, READY).unwrap(), RadarState::Sleep);
        assert_eq!(sm.apply(PowerOp::WakeUp, READY).unwrap(), RadarState::Active);
        assert_eq!(sm.apply(PowerOp::TurnOff, READY).unwrap(), RadarState::Off);
    }

    #[test]
    fn test_guards() {
        let mut sm = StateMachine::new();
        let err = sm.apply(PowerOp::TurnOn, Guard::default()).unwrap_err();
        assert!(matches!(err, Error::NoActiveSlot));
        assert_eq!(sm.state(), RadarState::Idle);

        sm.apply(PowerOp::TurnOn, READY).unwrap();
        let streaming = Guard {
            active_slots: 1,
            streaming: true,
        };
        assert!(matches!(
            sm.apply(PowerOp::TurnOff, streaming),
            Err(Error::Streaming)
        ));
        assert!(matches!(
            sm.apply(PowerOp::GoSleep, streaming),
            Err(Error::Streaming)
        ));
        assert_eq!(sm.state(), RadarState::Active);
    }

    #[test]
    fn test_invalid_ops_keep_state() {
        let invalid = [
            (RadarState::Off, PowerOp::TurnOff),
            (RadarState::Off, PowerOp::GoSleep),
            (RadarState::Off, PowerOp::WakeUp),
            (RadarState::Idle, PowerOp::GoSleep),
            (RadarState::Idle, PowerOp::WakeUp),
            (RadarState::Active, PowerOp::TurnOn),
            (RadarState::Active, PowerOp::WakeUp),
            (RadarState::Sleep, PowerOp::TurnOn),
            (RadarState::Sleep, PowerOp::TurnOff),
            (RadarState::Sleep, PowerOp::GoSleep),
        ];

        for (state, op) in invalid {
            let mut sm = StateMachine { state };
            let err = sm.apply(op, READY).unwrap_err();
            assert_eq!(err.status(), Status::BadState, "{} from {}", op, state);
            assert_eq!(sm.state(), state);
        }
    }

    #[test]
    fn test_complete() {
        let mut sm = StateMachine::new();
        assert!(matches!(sm.complete(), Err(Error::WrongState(_, RadarState::Idle))));

        sm.apply(PowerOp::TurnOn, READY).unwrap();
        assert_eq!(sm.complete().unwrap(), RadarState::Idle);
        assert_eq!(sm.apply(PowerOp::TurnOn, READY).unwrap(), RadarState::Active);
    }
}
