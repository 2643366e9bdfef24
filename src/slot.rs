// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::collections::BTreeMap;

use crate::{
    burst::{BurstFormat, MAX_BUF_BYTES},
    error::{Error, Result},
    param::{Axis, ParamId},
    registry::ParamRegistry,
};

/// One configuration slot: main parameters and per-antenna TX/RX
/// parameters. Vendor parameters live in the same maps under
/// `ParamGroup::Vendor`.
#[derive(Debug, Clone, Default)]
pub struct ConfigSlot {
    id: u8,
    main: BTreeMap<ParamId, u32>,
    tx: BTreeMap<(ParamId, u8), u32>,
    rx: BTreeMap<(ParamId, u8), u32>,
    active: bool,
}

impl ConfigSlot {
    pub fn new(id: u8) -> ConfigSlot {
        ConfigSlot {
            id,
            ..Default::default()
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn main(&self, id: ParamId) -> Option<u32> {
        self.main.get(&id).copied()
    }

    pub fn antenna(&self, axis: Axis, id: ParamId, antenna: u8) -> Option<u32> {
        match axis {
            Axis::Main => None,
            Axis::Tx => self.tx.get(&(id, antenna)).copied(),
            Axis::Rx => self.rx.get(&(id, antenna)).copied(),
        }
    }

    /// Main parameters explicitly stored, in ascending id order.
    pub fn main_params(&self) -> impl Iterator<Item = (ParamId, u32)> + '_ {
        self.main.iter().map(|(id, value)| (*id, *value))
    }

    /// Mask of the antennas carrying at least one parameter.
    pub fn configured_antennas(&self, axis: Axis) -> u32 {
        let map = match axis {
            Axis::Main => return 0,
            Axis::Tx => &self.tx,
            Axis::Rx => &self.rx,
        };
        map.keys()
            .fold(0, |mask, (_, antenna)| mask | 1u32 << antenna)
    }

    pub(crate) fn store_main(&mut self, id: ParamId, value: u32) {
        self.main.insert(id, value);
    }

    pub(crate) fn store_antenna(&mut self, axis: Axis, id: ParamId, antenna: u8, value: u32) {
        match axis {
            Axis::Main => (),
            Axis::Tx => {
                self.tx.insert((id, antenna), value);
            }
            Axis::Rx => {
                self.rx.insert((id, antenna), value);
            }
        }
    }
}

/// The fixed table of configuration slots of one sensor.
#[derive(Debug, Clone)]
pub struct SlotManager {
    slots: Vec<ConfigSlot>,
    max_active: u8,
}

impl SlotManager {
    pub fn new(num_slots: u8, max_active: u8) -> SlotManager {
        SlotManager {
            slots: (0..num_slots).map(ConfigSlot::new).collect(),
            max_active,
        }
    }

    pub fn num_slots(&self) -> u8 {
        self.slots.len() as u8
    }

    pub fn max_active(&self) -> u8 {
        self.max_active
    }

    pub fn slot(&self, id: u8) -> Result<&ConfigSlot> {
        self.slots.get(id as usize).ok_or(Error::InvalidSlot(id))
    }

    pub fn slot_mut(&mut self, id: u8) -> Result<&mut ConfigSlot> {
        self.slots.get_mut(id as usize).ok_or(Error::InvalidSlot(id))
    }

    pub fn is_active(&self, id: u8) -> Result<bool> {
        Ok(self.slot(id)?.is_active())
    }

    /// Active slot ids in ascending order.
    pub fn active_configs(&self) -> Vec<u8> {
        self.slots
            .iter()
            .filter(|slot| slot.is_active())
            .map(|slot| slot.id())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_active()).count()
    }

    /// Checks the slot against the profile and returns the format of the
    /// bursts it would produce.
    pub fn check_compatible(&self, id: u8, registry: &ParamRegistry) -> Result<BurstFormat> {
        let slot = self.slot(id)?;
        let profile = registry.profile();

        for param in &profile.required_main_params {
            if slot.main(*param).is_none() {
                return Err(Error::SlotIncomplete(id, *param));
            }
        }

        for axis in [Axis::Tx, Axis::Rx] {
            let mask = registry.resolve_mask(slot, axis);
            if mask == 0 || mask & !profile.antenna_mask(axis) != 0 {
                return Err(Error::Incompatible(
                    id,
                    format!("{} antenna mask 0x{:X} selects no usable antenna", axis, mask),
                ));
            }
            let configured = slot.configured_antennas(axis);
            if configured & !mask != 0 {
                return Err(Error::Incompatible(
                    id,
                    format!(
                        "{} antennas 0x{:X} carry parameters but are disabled by mask 0x{:X}",
                        axis,
                        configured & !mask,
                        mask
                    ),
                ));
            }
        }

        let lower = registry.resolve_main(slot, ParamId::FMCW_LOWER_FREQ_MHZ);
        let upper = registry.resolve_main(slot, ParamId::FMCW_UPPER_FREQ_MHZ);
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if lower >= upper {
                return Err(Error::Incompatible(
                    id,
                    format!("lower frequency {} MHz not below upper {} MHz", lower, upper),
                ));
            }
        }

        let format = registry.burst_format(slot)?;
        if format.burst_len() == 0 || format.burst_len() > MAX_BUF_BYTES {
            return Err(Error::Incompatible(
                id,
                format!(
                    "burst of {} bytes does not fit in {} bytes",
                    format.burst_len(),
                    MAX_BUF_BYTES
                ),
            ));
        }

        Ok(format)
    }

    /// Activates a slot. Returns the burst format when the slot was newly
    /// activated and `None` when it was already active.
    pub fn activate(&mut self, id: u8, registry: &ParamRegistry) -> Result<Option<BurstFormat>> {
        if self.is_active(id)? {
            return Ok(None);
        }
        if self.active_count() >= self.max_active as usize {
            return Err(Error::TooManyActiveSlots(self.max_active));
        }

        let format = self.check_compatible(id, registry)?;
        self.slot_mut(id)?.set_active(true);
        Ok(Some(format))
    }

    /// Deactivates a slot, refusing to starve a running stream. Returns
    /// whether the slot was active.
    pub fn deactivate(&mut self, id: u8, streaming: bool) -> Result<bool> {
        if !self.is_active(id)? {
            return Ok(false);
        }
        if streaming && self.active_count() == 1 {
            return Err(Error::SlotStreaming(id));
        }

        self.slot_mut(id)?.set_active(false);
        Ok(true)
    }

    /// Deactivates every slot, stored values are kept.
    pub fn deactivate_all(&mut self) {
        for slot in &mut self.slots {
            slot.set_active(false);
        }
    }
}
