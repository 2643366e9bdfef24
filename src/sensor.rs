// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! The radar session: [`RadarModule`] hands out [`RadarSensor`] instances,
//! each owning its configuration slots, power state, burst engine and
//! observers.
//!
//! Configuration and power requests serialize on the session lock. Burst
//! reads only touch the engine so a blocked [`RadarSensor::read_burst`]
//! never holds up parameter reads or `stop_streaming` on other threads.

use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};
use tracing::{debug, warn};

use crate::{
    burst::{Burst, BurstFormat, RadarType},
    engine::{Acquisition, BurstEngine, BurstSource, FifoMode, SimulatedSource, StreamStats},
    error::{Error, Result},
    observer::{Dispatcher, LogLevel, Observer, ObserverId},
    param::{Axis, ParamId, ParamRange},
    profile::{is_country_code, SensorProfile, SlotConfig, Version},
    radar_log,
    registry::{ParamRegistry, Target},
    slot::SlotManager,
    state::{Guard, PowerOp, RadarState, StateMachine},
};

/// Version of the radar API implemented by this crate.
pub fn api_version() -> Version {
    Version {
        major: 1,
        minor: 1,
        patch: 1,
        build: 0,
    }
}

/// Simulated register address of a main parameter within a slot's window.
pub fn register_addr(slot: u8, param: ParamId) -> u32 {
    0x1000 * (slot as u32 + 1) + 0x100 * param.group as u32 + param.id
}

/// Static description of a sensor and its current power state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SensorInfo {
    pub id: i32,
    pub name: String,
    pub vendor: String,
    pub device_id: u32,
    pub radar_type: RadarType,
    pub driver_version: Version,
    pub api_version: Version,
    pub state: RadarState,
    pub num_config_slots: u8,
    pub max_active_slots: u8,
    pub num_tx_antennas: u8,
    pub num_rx_antennas: u8,
}

impl fmt::Display for SensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) id {} device 0x{:08X} driver {} api {} state {}",
            self.vendor,
            self.name,
            self.radar_type,
            self.id,
            self.device_id,
            self.driver_version,
            self.api_version,
            self.state
        )
    }
}

/// Owns the set of live radar ids.
#[derive(Debug, Default)]
pub struct RadarModule {
    live: Arc<Mutex<HashSet<i32>>>,
}

impl RadarModule {
    pub fn init() -> RadarModule {
        RadarModule::default()
    }

    /// Creates a sensor backed by the simulated burst source.
    pub fn create(&self, id: i32, profile: SensorProfile) -> Result<RadarSensor> {
        self.create_with_source(id, profile, SimulatedSource::new())
    }

    pub fn create_with_source<S: BurstSource + 'static>(
        &self,
        id: i32,
        profile: SensorProfile,
        source: S,
    ) -> Result<RadarSensor> {
        profile.validate()?;

        let mut live = self.live.lock().map_err(|_| Error::Poisoned("module"))?;
        if !live.insert(id) {
            return Err(Error::DuplicateRadar(id));
        }
        drop(live);

        let dispatcher = Arc::new(Dispatcher::new());
        let engine = BurstEngine::new(
            profile.fifo_capacity,
            Arc::new(Mutex::new(source)),
            dispatcher.clone(),
        );
        let slots = SlotManager::new(profile.num_config_slots, profile.max_active_slots);

        Ok(RadarSensor {
            id,
            registry: ParamRegistry::new(Arc::new(profile)),
            session: RwLock::new(Session {
                state: StateMachine::new(),
                slots,
                fifo_mode: FifoMode::default(),
                registers: BTreeMap::new(),
            }),
            engine,
            dispatcher,
            live: self.live.clone(),
        })
    }

    /// Stops streaming and releases the sensor and its id.
    pub fn destroy(&self, sensor: RadarSensor) -> Result<()> {
        sensor.engine.stop()?;
        drop(sensor);
        Ok(())
    }

    /// Number of sensors not yet destroyed.
    pub fn live(&self) -> usize {
        match self.live.lock() {
            Ok(live) => live.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn deinit(&self) -> Result<()> {
        match self.live() {
            0 => Ok(()),
            n => Err(Error::SensorsAlive(n)),
        }
    }
}

#[derive(Debug)]
struct Session {
    state: StateMachine,
    slots: SlotManager,
    fifo_mode: FifoMode,
    registers: BTreeMap<u32, u32>,
}

/// One radar sensor session. Every operation takes `&self`, the sensor can
/// be shared across threads behind an `Arc`.
#[derive(Debug)]
pub struct RadarSensor {
    id: i32,
    registry: ParamRegistry,
    session: RwLock<Session>,
    engine: BurstEngine,
    dispatcher: Arc<Dispatcher>,
    live: Arc<Mutex<HashSet<i32>>>,
}

impl Drop for RadarSensor {
    fn drop(&mut self) {
        if let Err(err) = self.engine.stop() {
            warn!("radar {}: stopping stream on drop: {}", self.id, err);
        }
        match self.live.lock() {
            Ok(mut live) => live.remove(&self.id),
            Err(poisoned) => poisoned.into_inner().remove(&self.id),
        };
    }
}

impl RadarSensor {
    fn read(&self) -> Result<RwLockReadGuard<'_, Session>> {
        self.session.read().map_err(|_| Error::Poisoned("session"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Session>> {
        self.session.write().map_err(|_| Error::Poisoned("session"))
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn profile(&self) -> &SensorProfile {
        self.registry.profile()
    }

    // Power management

    pub fn get_state(&self) -> Result<RadarState> {
        self.settle()?;
        Ok(self.read()?.state.state())
    }

    pub fn turn_on(&self) -> Result<RadarState> {
        self.power(PowerOp::TurnOn)
    }

    /// Turns the radar off. Every slot is deactivated, stored parameter
    /// values are kept.
    pub fn turn_off(&self) -> Result<RadarState> {
        self.power(PowerOp::TurnOff)
    }

    pub fn go_sleep(&self) -> Result<RadarState> {
        self.power(PowerOp::GoSleep)
    }

    pub fn wake_up(&self) -> Result<RadarState> {
        self.power(PowerOp::WakeUp)
    }

    fn power(&self, op: PowerOp) -> Result<RadarState> {
        self.settle()?;
        let mut session = self.write()?;
        let guard = Guard {
            active_slots: session.slots.active_count(),
            streaming: self.engine.is_streaming(),
        };
        let from = session.state.state();
        let to = session.state.apply(op, guard)?;
        if op == PowerOp::TurnOff {
            session.slots.deactivate_all();
        }
        drop(session);

        radar_log!(
            self.dispatcher,
            LogLevel::Info,
            "radar {}: {} -> {}",
            self.id,
            from,
            to
        );
        Ok(to)
    }

    // Configuration slots

    pub fn num_config_slots(&self) -> u8 {
        self.profile().num_config_slots
    }

    pub fn max_active_config_slots(&self) -> u8 {
        self.profile().max_active_slots
    }

    /// Activates a slot after the compatibility check. Every stored main
    /// parameter is written into the slot's register window. Activating an
    /// active slot does nothing.
    pub fn activate_config(&self, slot: u8) -> Result<()> {
        let (format, writes) = {
            let mut session = self.write()?;
            let Some(format) = session.slots.activate(slot, &self.registry)? else {
                return Ok(());
            };
            if self.engine.is_streaming() {
                let limit = self.registry.burst_limit(session.slots.slot(slot)?);
                self.engine.admit(Acquisition::new(format, limit))?;
            }

            let writes: Vec<(u32, u32)> = session
                .slots
                .slot(slot)?
                .main_params()
                .map(|(param, value)| (register_addr(slot, param), value))
                .collect();
            session.registers.extend(writes.iter().copied());
            (format, writes)
        };

        for (addr, value) in writes {
            self.dispatcher.register_set(addr, value);
        }
        radar_log!(
            self.dispatcher,
            LogLevel::Info,
            "radar {}: config slot {} activated, {} bytes per burst",
            self.id,
            slot,
            format.burst_len()
        );
        Ok(())
    }

    /// Deactivates a slot. The last slot feeding a running stream cannot be
    /// deactivated.
    pub fn deactivate_config(&self, slot: u8) -> Result<()> {
        let mut session = self.write()?;
        let streaming = self.engine.is_streaming();
        if !session.slots.deactivate(slot, streaming)? {
            return Ok(());
        }
        if streaming {
            self.engine.retire(slot)?;
        }
        drop(session);

        radar_log!(
            self.dispatcher,
            LogLevel::Info,
            "radar {}: config slot {} deactivated",
            self.id,
            slot
        );
        Ok(())
    }

    pub fn is_active_config(&self, slot: u8) -> Result<bool> {
        self.read()?.slots.is_active(slot)
    }

    /// Active slot ids in ascending order.
    pub fn active_configs(&self) -> Result<Vec<u8>> {
        Ok(self.read()?.slots.active_configs())
    }

    // Parameters

    fn get_param(&self, slot: u8, target: Target, param: ParamId) -> Result<u32> {
        let session = self.read()?;
        self.registry.get(session.slots.slot(slot)?, target, param)
    }

    fn set_param(&self, slot: u8, target: Target, param: ParamId, value: u32) -> Result<()> {
        let mut session = self.write()?;
        let state = session.state.state();
        self.registry
            .set(state, session.slots.slot_mut(slot)?, target, param, value)?;
        drop(session);

        radar_log!(
            self.dispatcher,
            LogLevel::Debug,
            "radar {}: slot {} {:?} {} = {}",
            self.id,
            slot,
            target,
            param,
            value
        );
        Ok(())
    }

    pub fn get_main_param(&self, slot: u8, param: ParamId) -> Result<u32> {
        self.get_param(slot, Target::Main, param)
    }

    pub fn set_main_param(&self, slot: u8, param: ParamId, value: u32) -> Result<()> {
        self.set_param(slot, Target::Main, param, value)
    }

    pub fn main_param_range(&self, param: ParamId) -> Result<ParamRange> {
        self.registry.range(Axis::Main, param)
    }

    /// Reads a TX parameter, `mask` must select exactly one antenna.
    pub fn get_tx_param(&self, slot: u8, mask: u32, param: ParamId) -> Result<u32> {
        self.get_param(slot, Target::Tx(mask), param)
    }

    /// Writes a TX parameter to every antenna selected by `mask`.
    pub fn set_tx_param(&self, slot: u8, mask: u32, param: ParamId, value: u32) -> Result<()> {
        self.set_param(slot, Target::Tx(mask), param, value)
    }

    pub fn tx_param_range(&self, param: ParamId) -> Result<ParamRange> {
        self.registry.range(Axis::Tx, param)
    }

    /// Reads an RX parameter, `mask` must select exactly one antenna.
    pub fn get_rx_param(&self, slot: u8, mask: u32, param: ParamId) -> Result<u32> {
        self.get_param(slot, Target::Rx(mask), param)
    }

    /// Writes an RX parameter to every antenna selected by `mask`.
    pub fn set_rx_param(&self, slot: u8, mask: u32, param: ParamId, value: u32) -> Result<()> {
        self.set_param(slot, Target::Rx(mask), param, value)
    }

    pub fn rx_param_range(&self, param: ParamId) -> Result<ParamRange> {
        self.registry.range(Axis::Rx, param)
    }

    pub fn get_vendor_param(&self, slot: u8, id: u32) -> Result<u32> {
        self.get_param(slot, Target::Main, ParamId::vendor(id))
    }

    pub fn set_vendor_param(&self, slot: u8, id: u32, value: u32) -> Result<()> {
        self.set_param(slot, Target::Main, ParamId::vendor(id), value)
    }

    pub fn vendor_param_range(&self, id: u32) -> Result<ParamRange> {
        self.registry.range(Axis::Main, ParamId::vendor(id))
    }

    pub fn get_vendor_tx_param(&self, slot: u8, mask: u32, id: u32) -> Result<u32> {
        self.get_param(slot, Target::Tx(mask), ParamId::vendor(id))
    }

    pub fn set_vendor_tx_param(&self, slot: u8, mask: u32, id: u32, value: u32) -> Result<()> {
        self.set_param(slot, Target::Tx(mask), ParamId::vendor(id), value)
    }

    pub fn vendor_tx_param_range(&self, id: u32) -> Result<ParamRange> {
        self.registry.range(Axis::Tx, ParamId::vendor(id))
    }

    pub fn get_vendor_rx_param(&self, slot: u8, mask: u32, id: u32) -> Result<u32> {
        self.get_param(slot, Target::Rx(mask), ParamId::vendor(id))
    }

    pub fn set_vendor_rx_param(&self, slot: u8, mask: u32, id: u32, value: u32) -> Result<()> {
        self.set_param(slot, Target::Rx(mask), ParamId::vendor(id), value)
    }

    pub fn vendor_rx_param_range(&self, id: u32) -> Result<ParamRange> {
        self.registry.range(Axis::Rx, ParamId::vendor(id))
    }

    /// Applies every setting of `config` in order, stopping at the first
    /// failure. Settings applied before the failure stay stored.
    pub fn apply_slot_config(&self, slot: u8, config: &SlotConfig) -> Result<()> {
        for setting in &config.main {
            let param = ParamId::parse(Axis::Main, &setting.param)?;
            self.set_main_param(slot, param, setting.value)?;
        }
        for setting in &config.tx {
            let param = ParamId::parse(Axis::Tx, &setting.param)?;
            self.set_tx_param(slot, setting.mask, param, setting.value)?;
        }
        for setting in &config.rx {
            let param = ParamId::parse(Axis::Rx, &setting.param)?;
            self.set_rx_param(slot, setting.mask, param, setting.value)?;
        }
        Ok(())
    }

    // Streaming

    /// Overflow behaviour of the burst FIFO, used by the next
    /// `start_streaming`.
    pub fn set_fifo_mode(&self, mode: FifoMode) -> Result<()> {
        if mode == FifoMode::Undefined {
            return Err(Error::InvalidFifoMode);
        }
        self.write()?.fifo_mode = mode;
        Ok(())
    }

    pub fn fifo_mode(&self) -> Result<FifoMode> {
        Ok(self.read()?.fifo_mode)
    }

    /// Starts acquisition of every active slot. The burst period is the
    /// first active slot's `BURST_PERIOD_US`.
    pub fn start_streaming(&self) -> Result<()> {
        let session = self.write()?;
        let state = session.state.state();
        if state != RadarState::Active {
            return Err(Error::WrongState("start streaming", state));
        }

        let active = session.slots.active_configs();
        let Some(first) = active.first().copied() else {
            return Err(Error::NoActiveSlot);
        };
        let plan = active
            .iter()
            .map(|id| {
                let slot = session.slots.slot(*id)?;
                let limit = self.registry.burst_limit(slot);
                Ok(Acquisition::new(self.registry.burst_format(slot)?, limit))
            })
            .collect::<Result<Vec<Acquisition>>>()?;
        let period_us = self
            .registry
            .resolve_main(session.slots.slot(first)?, ParamId::BURST_PERIOD_US)
            .ok_or(Error::ParamNotSet(ParamId::BURST_PERIOD_US))?;
        if period_us == 0 {
            return Err(Error::Incompatible(first, "burst period of 0".to_string()));
        }

        self.engine.start(
            plan,
            Duration::from_micros(period_us as u64),
            session.fifo_mode,
        )?;
        drop(session);

        radar_log!(
            self.dispatcher,
            LogLevel::Info,
            "radar {}: streaming config slots {:?} every {} us",
            self.id,
            active,
            period_us
        );
        Ok(())
    }

    /// Stops acquisition. Always legal, a blocked `read_burst` returns
    /// with a state error.
    pub fn stop_streaming(&self) -> Result<()> {
        let streaming = self.engine.is_streaming();
        self.engine.stop()?;
        if streaming {
            radar_log!(
                self.dispatcher,
                LogLevel::Info,
                "radar {}: streaming stopped",
                self.id
            );
        }
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.engine.is_streaming()
    }

    pub fn is_burst_ready(&self) -> bool {
        self.engine.is_ready()
    }

    /// Blocks up to `timeout` for the next burst. Once every active UWB
    /// slot executed its `UWB_NUMBER_OF_BURSTS` and the FIFO is drained the
    /// read fails and the radar returns to Idle.
    pub fn read_burst(&self, timeout: Duration) -> Result<Burst> {
        let result = self.engine.read(timeout);
        if let Err(Error::BurstLimitReached) = result {
            self.settle()?;
        }
        result
    }

    /// Reads the next burst into `buf`, returning its format and the bytes
    /// written. A burst larger than `buf` is truncated, a buffer of
    /// [`crate::burst::MAX_BUF_BYTES`] always fits.
    pub fn read_burst_into(
        &self,
        timeout: Duration,
        buf: &mut [u8],
    ) -> Result<(BurstFormat, usize)> {
        let burst = self.read_burst(timeout)?;
        let len = burst.data.len().min(buf.len());
        if len < burst.data.len() {
            warn!(
                "radar {}: burst {} truncated to {} of {} bytes",
                self.id,
                burst.format.sequence_number,
                len,
                burst.data.len()
            );
        }
        buf[..len].copy_from_slice(&burst.data[..len]);
        Ok((burst.format, len))
    }

    /// Ends a burst limited acquisition: streaming stops and Active falls
    /// back to Idle.
    fn settle(&self) -> Result<()> {
        if !self.engine.is_exhausted() {
            return Ok(());
        }
        self.engine.stop()?;

        let mut session = self.write()?;
        if session.state.state() != RadarState::Active {
            return Ok(());
        }
        let to = session.state.complete()?;
        drop(session);

        radar_log!(
            self.dispatcher,
            LogLevel::Info,
            "radar {}: burst limit reached, active -> {}",
            self.id,
            to
        );
        Ok(())
    }

    pub fn stream_stats(&self) -> StreamStats {
        self.engine.stats()
    }

    // Observers

    pub fn add_observer(&self, observer: Observer) -> Result<ObserverId> {
        self.dispatcher.add(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> Result<()> {
        self.dispatcher.remove(id)
    }

    pub fn set_log_level(&self, level: LogLevel) -> Result<()> {
        self.dispatcher.set_log_level(level)
    }

    pub fn log_level(&self) -> LogLevel {
        self.dispatcher.log_level()
    }

    // Sensor information

    /// Checks an ISO 3166-1 alpha-2 code against the countries the sensor
    /// may operate in. A profile without countries permits all.
    pub fn check_country_code(&self, code: &str) -> Result<()> {
        if !is_country_code(code) {
            return Err(Error::InvalidCountryCode(code.to_string()));
        }

        let countries = &self.profile().countries;
        match countries.is_empty() || countries.iter().any(|c| c.eq_ignore_ascii_case(code)) {
            true => Ok(()),
            false => Err(Error::CountryNotPermitted(code.to_ascii_uppercase())),
        }
    }

    pub fn sensor_info(&self) -> Result<SensorInfo> {
        let profile = self.profile();
        Ok(SensorInfo {
            id: self.id,
            name: profile.name.clone(),
            vendor: profile.vendor.clone(),
            device_id: profile.device_id,
            radar_type: profile.radar_type,
            driver_version: profile.driver_version,
            api_version: api_version(),
            state: self.get_state()?,
            num_config_slots: profile.num_config_slots,
            max_active_slots: profile.max_active_slots,
            num_tx_antennas: profile.num_tx_antennas,
            num_rx_antennas: profile.num_rx_antennas,
        })
    }

    /// Reports the sensor description to observers at info level.
    pub fn log_sensor_details(&self) -> Result<()> {
        let info = self.sensor_info()?;
        radar_log!(self.dispatcher, LogLevel::Info, "{}", info);
        radar_log!(
            self.dispatcher,
            LogLevel::Info,
            "{} config slots, {} active at most, {} tx and {} rx antennas",
            info.num_config_slots,
            info.max_active_slots,
            info.num_tx_antennas,
            info.num_rx_antennas
        );
        Ok(())
    }

    fn position(&self, axis: Axis, mask: u32) -> Result<[i32; 3]> {
        let antenna = self.registry.single_antenna(axis, mask)?;
        let positions = match axis {
            Axis::Tx => &self.profile().tx_positions,
            _ => &self.profile().rx_positions,
        };
        positions
            .get(antenna as usize)
            .copied()
            .ok_or(Error::Unsupported("antenna positions"))
    }

    /// Position of one TX antenna in micrometers.
    pub fn tx_position(&self, mask: u32) -> Result<[i32; 3]> {
        self.position(Axis::Tx, mask)
    }

    /// Position of one RX antenna in micrometers.
    pub fn rx_position(&self, mask: u32) -> Result<[i32; 3]> {
        self.position(Axis::Rx, mask)
    }

    // Registers

    pub fn get_register(&self, addr: u32) -> Result<u32> {
        self.read()?
            .registers
            .get(&addr)
            .copied()
            .ok_or(Error::UnknownRegister(addr))
    }

    pub fn set_register(&self, addr: u32, value: u32) -> Result<()> {
        self.write()?.registers.insert(addr, value);
        debug!("radar {}: register 0x{:08X} = {}", self.id, addr, value);
        self.dispatcher.register_set(addr, value);
        Ok(())
    }

    /// Every written register in ascending address order.
    pub fn all_registers(&self) -> Result<Vec<(u32, u32)>> {
        Ok(self
            .read()?
            .registers
            .iter()
            .map(|(addr, value)| (*addr, *value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Status,
        observer::LogRecord,
        profile::tests::{fmcw_profile, uwb_profile, FMCW_SLOT},
    };
    use std::{thread, time::Instant};

    fn create(module: &RadarModule, id: i32) -> RadarSensor {
        module.create(id, fmcw_profile()).unwrap()
    }

    fn configure(sensor: &RadarSensor, slot: u8, period_us: u32) {
        sensor
            .set_main_param(slot, ParamId::BURST_PERIOD_US, period_us)
            .unwrap();
    }

    fn log_sink(sensor: &RadarSensor) -> Arc<Mutex<Vec<LogRecord>>> {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        sensor
            .add_observer(Observer::new().on_log_message(move |record| {
                sink.lock().unwrap().push(record.clone())
            }))
            .unwrap();
        records
    }

    #[test]
    fn test_end_to_end() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        assert_eq!(sensor.get_state().unwrap(), RadarState::Idle);

        configure(&sensor, 0, 40000);
        sensor.activate_config(0).unwrap();
        assert_eq!(sensor.turn_on().unwrap(), RadarState::Active);
        sensor.start_streaming().unwrap();

        let first = sensor.read_burst(Duration::from_secs(1)).unwrap();
        assert_eq!(first.format.sequence_number, 1);
        assert_eq!(first.format.config_id, 0);
        assert_eq!(first.format.radar_type(), RadarType::Fmcw);
        assert_eq!(first.data.len(), first.format.burst_len());

        let second = sensor.read_burst(Duration::from_secs(1)).unwrap();
        assert_eq!(second.format.sequence_number, 2);
        assert!(second.timestamp_us >= first.timestamp_us);

        sensor.stop_streaming().unwrap();
        assert_eq!(sensor.turn_off().unwrap(), RadarState::Off);
        module.destroy(sensor).unwrap();
        module.deinit().unwrap();
    }

    #[test]
    fn test_uwb_burst_limit() {
        let module = RadarModule::init();
        let sensor = module.create(0, uwb_profile()).unwrap();
        configure(&sensor, 0, 1000);
        sensor
            .set_main_param(0, ParamId::UWB_NUMBER_OF_BURSTS, 3)
            .unwrap();
        sensor.activate_config(0).unwrap();
        sensor.turn_on().unwrap();
        sensor.start_streaming().unwrap();

        for expected in 1..=3 {
            let burst = sensor.read_burst(Duration::from_secs(1)).unwrap();
            assert_eq!(burst.format.sequence_number, expected);
            assert_eq!(burst.format.radar_type(), RadarType::Uwb);
        }
        let err = sensor.read_burst(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, Error::BurstLimitReached));
        assert_eq!(err.status(), Status::BadState);
        assert!(!sensor.is_streaming());
        assert_eq!(sensor.get_state().unwrap(), RadarState::Idle);
        assert!(matches!(
            sensor.read_burst(Duration::from_millis(10)),
            Err(Error::NotStreaming)
        ));

        // The next session starts with a fresh budget.
        sensor.turn_on().unwrap();
        sensor.start_streaming().unwrap();
        let burst = sensor.read_burst(Duration::from_secs(1)).unwrap();
        assert_eq!(burst.format.sequence_number, 1);
        sensor.stop_streaming().unwrap();
        module.destroy(sensor).unwrap();
    }

    #[test]
    fn test_set_on_active_slot() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        configure(&sensor, 1, 40000);
        sensor.activate_config(1).unwrap();

        let err = sensor
            .set_main_param(1, ParamId::BURST_PERIOD_US, 50000)
            .unwrap_err();
        assert_eq!(err.status(), Status::BadState);
        assert_eq!(
            sensor.get_main_param(1, ParamId::BURST_PERIOD_US).unwrap(),
            40000
        );

        sensor.deactivate_config(1).unwrap();
        sensor
            .set_main_param(1, ParamId::BURST_PERIOD_US, 50000)
            .unwrap();
        assert_eq!(
            sensor.get_main_param(1, ParamId::BURST_PERIOD_US).unwrap(),
            50000
        );
    }

    #[test]
    fn test_tx_mask_two_antennas() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);

        sensor
            .set_tx_param(0, 0b11, ParamId::FMCW_TX_POWER_IDX, 42)
            .unwrap();
        assert_eq!(
            sensor
                .get_tx_param(0, 0b01, ParamId::FMCW_TX_POWER_IDX)
                .unwrap(),
            42
        );
        assert_eq!(
            sensor
                .get_tx_param(0, 0b10, ParamId::FMCW_TX_POWER_IDX)
                .unwrap(),
            42
        );
        assert_eq!(
            sensor
                .get_tx_param(0, 0b11, ParamId::FMCW_TX_POWER_IDX)
                .unwrap_err()
                .status(),
            Status::BadInput
        );
    }

    #[test]
    fn test_out_of_range_unchanged() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        let range = sensor.rx_param_range(ParamId::FMCW_RX_HP_GAIN_IDX).unwrap();

        sensor
            .set_rx_param(2, 0b111, ParamId::FMCW_RX_HP_GAIN_IDX, range.min)
            .unwrap();
        for value in [range.max + 1, u32::MAX] {
            let err = sensor
                .set_rx_param(2, 0b111, ParamId::FMCW_RX_HP_GAIN_IDX, value)
                .unwrap_err();
            assert_eq!(err.status(), Status::BadInput);
        }
        for mask in [0b001, 0b010, 0b100] {
            assert_eq!(
                sensor
                    .get_rx_param(2, mask, ParamId::FMCW_RX_HP_GAIN_IDX)
                    .unwrap(),
                range.min
            );
        }
    }

    #[test]
    fn test_start_without_active_slot() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);

        assert_eq!(
            Status::of(&sensor.start_streaming()),
            Status::BadState
        );
        assert!(!sensor.is_burst_ready());
        assert_eq!(Status::of(&sensor.turn_on()), Status::BadState);
        assert_eq!(sensor.get_state().unwrap(), RadarState::Idle);

        let start = Instant::now();
        assert_eq!(
            Status::of(&sensor.read_burst(Duration::from_secs(5))),
            Status::BadState
        );
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(sensor.stop_streaming().is_ok());
    }

    #[test]
    fn test_activate_idempotent() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        configure(&sensor, 2, 40000);

        sensor.activate_config(2).unwrap();
        sensor.activate_config(2).unwrap();
        assert_eq!(sensor.active_configs().unwrap(), vec![2]);
        assert!(sensor.is_active_config(2).unwrap());
        assert_eq!(
            Status::of(&sensor.activate_config(sensor.num_config_slots())),
            Status::BadInput
        );
        assert_eq!(
            Status::of(&sensor.activate_config(0)),
            Status::BadState
        );
    }

    #[test]
    fn test_stop_unblocks_read() {
        let module = RadarModule::init();
        let sensor = Arc::new(create(&module, 0));
        configure(&sensor, 0, 1_000_000);
        sensor.activate_config(0).unwrap();
        sensor.turn_on().unwrap();
        sensor.start_streaming().unwrap();
        sensor.read_burst(Duration::from_secs(1)).unwrap();

        let reader = {
            let sensor = sensor.clone();
            thread::spawn(move || {
                let start = Instant::now();
                (sensor.read_burst(Duration::from_secs(30)), start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(50));
        // Parameter reads are not blocked by the pending read.
        assert_eq!(
            sensor.get_main_param(0, ParamId::BURST_PERIOD_US).unwrap(),
            1_000_000
        );
        sensor.stop_streaming().unwrap();

        let (result, elapsed) = reader.join().unwrap();
        assert_eq!(Status::of(&result), Status::BadState);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_streaming_guards() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        configure(&sensor, 0, 40000);
        configure(&sensor, 1, 40000);
        sensor.activate_config(0).unwrap();
        sensor.activate_config(1).unwrap();
        sensor.turn_on().unwrap();
        sensor.start_streaming().unwrap();
        assert!(sensor.is_streaming());
        assert_eq!(Status::of(&sensor.start_streaming()), Status::BadState);

        assert_eq!(Status::of(&sensor.turn_off()), Status::BadState);
        assert_eq!(Status::of(&sensor.go_sleep()), Status::BadState);
        assert_eq!(sensor.get_state().unwrap(), RadarState::Active);

        sensor.deactivate_config(0).unwrap();
        assert_eq!(
            Status::of(&sensor.deactivate_config(1)),
            Status::BadState
        );
        assert_eq!(sensor.active_configs().unwrap(), vec![1]);

        // Bursts queued before deactivation may still carry slot 0.
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut config_id = 0;
        while config_id != 1 && Instant::now() < deadline {
            config_id = sensor
                .read_burst(Duration::from_secs(1))
                .unwrap()
                .format
                .config_id;
        }
        assert_eq!(config_id, 1);

        sensor.stop_streaming().unwrap();
        sensor.go_sleep().unwrap();
        assert_eq!(sensor.wake_up().unwrap(), RadarState::Active);
        assert_eq!(sensor.turn_off().unwrap(), RadarState::Off);
        assert!(sensor.active_configs().unwrap().is_empty());
        assert_eq!(
            sensor.get_main_param(1, ParamId::BURST_PERIOD_US).unwrap(),
            40000
        );
        assert_eq!(sensor.turn_on().unwrap(), RadarState::Idle);
    }

    #[test]
    fn test_sleep_blocks_configuration() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        configure(&sensor, 0, 40000);
        sensor.activate_config(0).unwrap();
        sensor.turn_on().unwrap();
        sensor.go_sleep().unwrap();

        assert_eq!(
            Status::of(&sensor.set_main_param(1, ParamId::BURST_PERIOD_US, 2000)),
            Status::BadState
        );
        assert_eq!(Status::of(&sensor.start_streaming()), Status::BadState);
        assert_eq!(sensor.active_configs().unwrap(), vec![0]);
    }

    #[test]
    fn test_register_writes_on_activation() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        let writes = Arc::new(Mutex::new(Vec::new()));
        let sink = writes.clone();
        sensor
            .add_observer(Observer::new().on_register_set(move |addr, value| {
                sink.lock().unwrap().push((addr, value))
            }))
            .unwrap();

        configure(&sensor, 1, 40000);
        sensor.set_vendor_param(1, 1, 9).unwrap();
        sensor.activate_config(1).unwrap();

        let period = register_addr(1, ParamId::BURST_PERIOD_US);
        let vendor = register_addr(1, ParamId::vendor(1));
        assert_eq!(period, 0x2102);
        assert_eq!(*writes.lock().unwrap(), vec![(period, 40000), (vendor, 9)]);
        assert_eq!(sensor.get_register(period).unwrap(), 40000);

        sensor.set_register(0x10, 3).unwrap();
        assert_eq!(writes.lock().unwrap().last(), Some(&(0x10, 3)));
        assert_eq!(
            sensor.all_registers().unwrap(),
            vec![(0x10, 3), (period, 40000), (vendor, 9)]
        );
        assert_eq!(
            Status::of(&sensor.get_register(0x11)),
            Status::BadInput
        );

        // Reactivation writes nothing.
        let count = writes.lock().unwrap().len();
        sensor.activate_config(1).unwrap();
        assert_eq!(writes.lock().unwrap().len(), count);
    }

    #[test]
    fn test_no_logs_from_lifecycle() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        sensor.set_log_level(LogLevel::Debug).unwrap();
        let records = log_sink(&sensor);

        let id = sensor.add_observer(Observer::new()).unwrap();
        sensor.remove_observer(id).unwrap();
        assert_eq!(
            Status::of(&sensor.remove_observer(id)),
            Status::BadInput
        );
        assert!(records.lock().unwrap().is_empty());

        configure(&sensor, 0, 40000);
        sensor.activate_config(0).unwrap();
        sensor.turn_on().unwrap();
        sensor.start_streaming().unwrap();
        let count = records.lock().unwrap().len();
        assert!(count > 0);

        module.destroy(sensor).unwrap();
        assert_eq!(records.lock().unwrap().len(), count);
    }

    #[test]
    fn test_log_level() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        assert_eq!(sensor.log_level(), LogLevel::Info);
        let records = log_sink(&sensor);

        configure(&sensor, 0, 40000);
        assert!(records.lock().unwrap().is_empty());

        sensor.log_sensor_details().unwrap();
        assert_eq!(records.lock().unwrap().len(), 2);
        assert!(records.lock().unwrap()[0].message.contains("fmcw"));

        sensor.set_log_level(LogLevel::Error).unwrap();
        sensor.log_sensor_details().unwrap();
        assert_eq!(records.lock().unwrap().len(), 2);
        assert_eq!(
            Status::of(&sensor.set_log_level(LogLevel::Undefined)),
            Status::BadInput
        );
    }

    #[test]
    fn test_panicking_observer() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        sensor
            .add_observer(Observer::new().on_burst_ready(|| panic!("observer failure")))
            .unwrap();
        let (tx, rx) = kanal::bounded(64);
        sensor
            .add_observer(Observer::new().on_burst_ready(move || {
                let _ = tx.try_send(());
            }))
            .unwrap();

        configure(&sensor, 0, 1000);
        sensor.activate_config(0).unwrap();
        sensor.turn_on().unwrap();
        sensor.start_streaming().unwrap();

        for expected in 1..=3 {
            assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
            let burst = sensor.read_burst(Duration::from_secs(1)).unwrap();
            assert_eq!(burst.format.sequence_number, expected);
        }
        sensor.stop_streaming().unwrap();
    }

    #[test]
    fn test_read_burst_into() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        configure(&sensor, 0, 1000);
        sensor.activate_config(0).unwrap();
        sensor.turn_on().unwrap();
        sensor.set_fifo_mode(FifoMode::DropNew).unwrap();
        sensor.start_streaming().unwrap();

        let mut buf = vec![0u8; crate::burst::MAX_BUF_BYTES];
        let (format, len) = sensor
            .read_burst_into(Duration::from_secs(1), &mut buf)
            .unwrap();
        assert_eq!(format.sequence_number, 1);
        assert_eq!(len, format.burst_len());

        let mut small = [0u8; 16];
        let (format, len) = sensor
            .read_burst_into(Duration::from_secs(1), &mut small)
            .unwrap();
        assert_eq!(format.sequence_number, 2);
        assert_eq!(len, 16);
        sensor.stop_streaming().unwrap();

        assert_eq!(
            Status::of(&sensor.set_fifo_mode(FifoMode::Undefined)),
            Status::BadInput
        );
        assert_eq!(sensor.fifo_mode().unwrap(), FifoMode::DropNew);
    }

    #[test]
    fn test_module_lifecycle() {
        let module = RadarModule::init();
        let sensor = create(&module, 7);
        assert_eq!(
            Status::of(&module.create(7, fmcw_profile())),
            Status::BadState
        );
        let other = create(&module, 8);
        assert_eq!(module.live(), 2);
        assert_eq!(Status::of(&module.deinit()), Status::BadState);

        module.destroy(sensor).unwrap();
        drop(other);
        assert_eq!(module.live(), 0);
        module.deinit().unwrap();

        let sensor = create(&module, 7);
        assert_eq!(sensor.id(), 7);

        let mut profile = fmcw_profile();
        profile.num_config_slots = 0;
        assert_eq!(Status::of(&module.create(9, profile)), Status::BadInput);
    }

    #[test]
    fn test_country_code() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        sensor.check_country_code("DE").unwrap();
        sensor.check_country_code("us").unwrap();
        assert_eq!(
            Status::of(&sensor.check_country_code("BR")),
            Status::Unsupported
        );
        for code in ["", "D", "DEU", "1A"] {
            assert_eq!(
                Status::of(&sensor.check_country_code(code)),
                Status::BadInput
            );
        }
    }

    #[test]
    fn test_info_and_positions() {
        let module = RadarModule::init();
        let sensor = create(&module, 3);
        let info = sensor.sensor_info().unwrap();
        assert_eq!(info.id, 3);
        assert_eq!(info.radar_type, RadarType::Fmcw);
        assert_eq!(info.api_version, api_version());
        assert_eq!(info.api_version.to_string(), "1.1.1.0");
        assert_eq!(info.state, RadarState::Idle);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["radar_type"], "fmcw");
        assert_eq!(json["state"], "idle");
        assert_eq!(json["api_version"]["minor"], 1);

        let profile = fmcw_profile();
        assert_eq!(sensor.tx_position(0b10).unwrap(), profile.tx_positions[1]);
        assert_eq!(sensor.rx_position(0b100).unwrap(), profile.rx_positions[2]);
        assert_eq!(Status::of(&sensor.rx_position(0b11)), Status::BadInput);
        assert_eq!(Status::of(&sensor.tx_position(0b100)), Status::BadInput);

        let mut profile = fmcw_profile();
        profile.tx_positions.clear();
        let sensor = module.create(4, profile).unwrap();
        assert_eq!(Status::of(&sensor.tx_position(0b1)), Status::Unsupported);
    }

    #[test]
    fn test_apply_slot_config() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        let config = SlotConfig::from_json(FMCW_SLOT).unwrap();

        sensor.apply_slot_config(3, &config).unwrap();
        assert_eq!(
            sensor.get_main_param(3, ParamId::BURST_PERIOD_US).unwrap(),
            40000
        );
        assert_eq!(
            sensor
                .get_tx_param(3, 0b1, ParamId::FMCW_TX_POWER_IDX)
                .unwrap(),
            35
        );
        assert_eq!(
            sensor
                .get_rx_param(3, 0b100, ParamId::FMCW_RX_HP_CUTOFF_KHZ)
                .unwrap(),
            45
        );
        sensor.activate_config(3).unwrap();

        let mut config = config;
        config.main[0].param = "no_such_param".to_string();
        assert_eq!(
            Status::of(&sensor.apply_slot_config(0, &config)),
            Status::BadInput
        );
    }

    #[test]
    fn test_vendor_params() {
        let module = RadarModule::init();
        let sensor = create(&module, 0);
        let range = sensor.vendor_param_range(1).unwrap();
        sensor.set_vendor_param(0, 1, range.max).unwrap();
        assert_eq!(sensor.get_vendor_param(0, 1).unwrap(), range.max);

        sensor.set_vendor_tx_param(0, 0b11, 1, 4).unwrap();
        assert_eq!(sensor.get_vendor_tx_param(0, 0b10, 1).unwrap(), 4);
        sensor.set_vendor_rx_param(0, 0b1, 1, 5).unwrap();
        assert_eq!(sensor.get_vendor_rx_param(0, 0b1, 1).unwrap(), 5);
        assert!(sensor.vendor_tx_param_range(1).is_ok());
        assert!(sensor.vendor_rx_param_range(1).is_ok());

        assert_eq!(
            Status::of(&sensor.vendor_param_range(99)),
            Status::BadInput
        );
        assert_eq!(
            Status::of(&sensor.get_vendor_rx_param(0, 0b10, 1)),
            Status::BadState
        );
    }
}
