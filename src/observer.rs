// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Observer dispatch delivers burst-ready, driver log and register-write
//! notifications to every registered observer in registration order.
//!
//! Callbacks run synchronously on the thread raising the event, which for
//! burst notifications is the acquisition thread. A panicking callback is
//! contained and the remaining observers still receive the event. Callbacks
//! must not call back into parameter or slot configuration.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc, RwLock,
    },
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Callbacks taking longer than this are reported.
pub const SLOW_CALLBACK: Duration = Duration::from_millis(100);

/// Driver log levels. Discriminants match the radar API wire values.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LogLevel {
    Undefined = 0,
    /// Disables logging to observers
    Off = 1,
    Error = 2,
    Warning = 3,
    #[default]
    Info = 4,
    Debug = 5,
}

impl LogLevel {
    fn from_u8(value: u8) -> LogLevel {
        match value {
            1 => LogLevel::Off,
            2 => LogLevel::Error,
            3 => LogLevel::Warning,
            4 => LogLevel::Info,
            5 => LogLevel::Debug,
            _ => LogLevel::Undefined,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogLevel::Undefined => write!(f, "undefined"),
            LogLevel::Off => write!(f, "off"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
        }
    }
}

/// A driver log message with its source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub file: &'static str,
    pub module: &'static str,
    pub line: u32,
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] {}:{} {}: {}",
            self.level, self.file, self.line, self.module, self.message
        )
    }
}

type BurstReadyFn = Box<dyn Fn() + Send + Sync>;
type LogMessageFn = Box<dyn Fn(&LogRecord) + Send + Sync>;
type RegisterSetFn = Box<dyn Fn(u32, u32) + Send + Sync>;

/// A set of optional notification handlers.
///
/// ```
/// use ripple::observer::Observer;
///
/// let observer = Observer::new()
///     .on_burst_ready(|| println!("burst ready"))
///     .on_register_set(|addr, value| println!("0x{:08X} = {}", addr, value));
/// ```
#[derive(Default)]
pub struct Observer {
    burst_ready: Option<BurstReadyFn>,
    log_message: Option<LogMessageFn>,
    register_set: Option<RegisterSetFn>,
}

impl Observer {
    pub fn new() -> Observer {
        Observer::default()
    }

    /// A burst completed and can be read. Carries no payload.
    pub fn on_burst_ready<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Observer {
        self.burst_ready = Some(Box::new(f));
        self
    }

    pub fn on_log_message<F: Fn(&LogRecord) + Send + Sync + 'static>(mut self, f: F) -> Observer {
        self.log_message = Some(Box::new(f));
        self
    }

    /// A register was written, receives the address and value.
    pub fn on_register_set<F: Fn(u32, u32) + Send + Sync + 'static>(mut self, f: F) -> Observer {
        self.register_set = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Observer")
            .field("burst_ready", &self.burst_ready.is_some())
            .field("log_message", &self.log_message.is_some())
            .field("register_set", &self.register_set.is_some())
            .finish()
    }
}

/// Handle returned on registration, used to remove the observer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    next_id: AtomicU64,
    level: AtomicU8,
    observers: RwLock<Vec<(ObserverId, Arc<Observer>)>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new()
    }
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        Dispatcher {
            next_id: AtomicU64::new(1),
            level: AtomicU8::new(LogLevel::default() as u8),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn add(&self, observer: Observer) -> Result<ObserverId> {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .map_err(|_| Error::Poisoned("observers"))?
            .push((id, Arc::new(observer)));
        Ok(id)
    }

    pub fn remove(&self, id: ObserverId) -> Result<()> {
        let mut observers = self
            .observers
            .write()
            .map_err(|_| Error::Poisoned("observers"))?;
        match observers.iter().position(|(other, _)| *other == id) {
            Some(index) => {
                observers.remove(index);
                Ok(())
            }
            None => Err(Error::UnknownObserver(id.0)),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    pub fn set_log_level(&self, level: LogLevel) -> Result<()> {
        if level == LogLevel::Undefined {
            return Err(Error::InvalidLogLevel);
        }
        self.level.store(level as u8, Ordering::Relaxed);
        Ok(())
    }

    /// Whether a message at `level` reaches observers.
    pub fn log_enabled(&self, level: LogLevel) -> bool {
        level >= LogLevel::Error && level <= self.log_level()
    }

    pub fn burst_ready(&self) {
        self.dispatch("burst ready", |observer| {
            if let Some(f) = &observer.burst_ready {
                f();
            }
        });
    }

    pub fn register_set(&self, addr: u32, value: u32) {
        self.dispatch("register set", |observer| {
            if let Some(f) = &observer.register_set {
                f(addr, value);
            }
        });
    }

    /// Emits the record as a tracing event and forwards it to observers
    /// when the runtime log level allows.
    pub fn log(&self, record: LogRecord) {
        match record.level {
            LogLevel::Error => error!(target: "ripple::driver", "{}", record.message),
            LogLevel::Warning => warn!(target: "ripple::driver", "{}", record.message),
            LogLevel::Info => info!(target: "ripple::driver", "{}", record.message),
            _ => debug!(target: "ripple::driver", "{}", record.message),
        }

        if self.log_enabled(record.level) {
            self.dispatch("log message", |observer| {
                if let Some(f) = &observer.log_message {
                    f(&record);
                }
            });
        }
    }

    // A poisoned list is still structurally valid, dispatch never fails.
    fn snapshot(&self) -> Vec<(ObserverId, Arc<Observer>)> {
        match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn dispatch<F: Fn(&Observer)>(&self, event: &'static str, f: F) {
        for (id, observer) in self.snapshot() {
            let start = Instant::now();
            if panic::catch_unwind(AssertUnwindSafe(|| f(&observer))).is_err() {
                error!("observer {} panicked handling {}", id, event);
            }

            let elapsed = start.elapsed();
            if elapsed > SLOW_CALLBACK {
                warn!(
                    "observer {} took {:?} handling {}, exceeding {:?}",
                    id, elapsed, event, SLOW_CALLBACK
                );
            }
        }
    }
}

/// Logs a formatted driver message through a [`Dispatcher`], capturing the
/// source location.
///
/// ```
/// use ripple::{observer::{Dispatcher, LogLevel}, radar_log};
///
/// let dispatcher = Dispatcher::new();
/// radar_log!(dispatcher, LogLevel::Info, "slot {} activated", 0);
/// ```
#[macro_export]
macro_rules! radar_log {
    ($dispatcher:expr, $level:expr, $($arg:tt)+) => {
        $dispatcher.log($crate::observer::LogRecord {
            level: $level,
            file: file!(),
            module: module_path!(),
            line: line!(),
            message: format!($($arg)+),
        })
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_registration_order() {
        let dispatcher = Dispatcher::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let mut ids = Vec::new();
        for n in 0..3 {
            let calls = calls.clone();
            let observer = Observer::new().on_burst_ready(move || calls.lock().unwrap().push(n));
            ids.push(dispatcher.add(observer).unwrap());
        }

        dispatcher.burst_ready();
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);

        dispatcher.remove(ids[1]).unwrap();
        dispatcher.burst_ready();
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2, 0, 2]);

        assert!(matches!(
            dispatcher.remove(ids[1]),
            Err(Error::UnknownObserver(_))
        ));
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn test_panic_isolated() {
        let dispatcher = Dispatcher::new();
        let writes = Arc::new(Mutex::new(Vec::new()));

        dispatcher
            .add(Observer::new().on_register_set(|_, _| panic!("observer failure")))
            .unwrap();
        let sink = writes.clone();
        dispatcher
            .add(Observer::new().on_register_set(move |addr, value| {
                sink.lock().unwrap().push((addr, value))
            }))
            .unwrap();

        dispatcher.register_set(0x1001, 7);
        dispatcher.register_set(0x1002, 8);
        assert_eq!(*writes.lock().unwrap(), vec![(0x1001, 7), (0x1002, 8)]);
    }

    #[test]
    fn test_log_level_filter() {
        let dispatcher = Dispatcher::new();
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        dispatcher
            .add(Observer::new().on_log_message(move |record| {
                sink.lock().unwrap().push(record.clone())
            }))
            .unwrap();

        radar_log!(dispatcher, LogLevel::Debug, "hidden {}", 1);
        radar_log!(dispatcher, LogLevel::Info, "shown {}", 2);
        dispatcher.set_log_level(LogLevel::Off).unwrap();
        radar_log!(dispatcher, LogLevel::Error, "hidden {}", 3);
        dispatcher.set_log_level(LogLevel::Debug).unwrap();
        radar_log!(dispatcher, LogLevel::Debug, "shown {}", 4);

        let records = records.lock().unwrap();
        let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["shown 2", "shown 4"]);
        assert_eq!(records[0].level, LogLevel::Info);
        assert!(records[0].file.ends_with("observer.rs"));
        assert!(records[0].line > 0);

        assert!(matches!(
            dispatcher.set_log_level(LogLevel::Undefined),
            Err(Error::InvalidLogLevel)
        ));
        assert_eq!(dispatcher.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_observer_without_handler() {
        let dispatcher = Dispatcher::new();
        dispatcher.add(Observer::new()).unwrap();
        dispatcher.burst_ready();
        dispatcher.register_set(0, 0);
        radar_log!(dispatcher, LogLevel::Error, "nobody listens");
    }
}
