//! Microstep capability of the driver chip.
//!
//! Driver families differ only in which divisors their MS pins can select.
//! Rather than one driver type per chip, the supported set is a descriptor
//! handed to [`StepperDriver`](crate::motor::StepperDriver).

use serde::Deserialize;

use super::units::Microsteps;

/// Set of microstep divisors a driver supports.
///
/// Bit `k` set means divisor `2^k` is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MicrostepCapability {
    mask: u8,
}

impl MicrostepCapability {
    /// Indexer-only driver with externally wired MS pins: 1..=128.
    pub const GENERIC: Self = Self::up_to(128);
    /// Allegro A4988: 1..=16.
    pub const A4988: Self = Self::up_to(16);
    /// TI DRV8825: 1..=32.
    pub const DRV8825: Self = Self::up_to(32);
    /// TI DRV8834: 1..=32.
    pub const DRV8834: Self = Self::up_to(32);
    /// TI DRV8880: 1..=16.
    pub const DRV8880: Self = Self::up_to(16);

    /// Every power of two up to and including `max`.
    pub const fn up_to(max: u16) -> Self {
        let mut mask = 0u8;
        let mut k = 0;
        while k < 8 {
            if (1u16 << k) <= max {
                mask |= 1 << k;
            }
            k += 1;
        }
        Self { mask }
    }

    /// Build from a raw bitmask (bit `k` = divisor `2^k`).
    pub const fn from_mask(mask: u8) -> Self {
        Self { mask }
    }

    /// Raw bitmask.
    #[inline]
    pub const fn mask(self) -> u8 {
        self.mask
    }

    /// Whether the driver can produce `microsteps`.
    #[inline]
    pub fn supports(self, microsteps: Microsteps) -> bool {
        self.mask & (1 << microsteps.exponent()) != 0
    }

    /// Largest supported divisor, or full step if the set is empty.
    pub fn max(self) -> Microsteps {
        if self.mask == 0 {
            return Microsteps::FULL;
        }
        let exponent = 7 - self.mask.leading_zeros();
        Microsteps::new(1 << exponent).unwrap_or(Microsteps::FULL)
    }

    /// Supported divisors in ascending order.
    pub fn iter(self) -> impl Iterator<Item = Microsteps> {
        (0..8u16)
            .filter(move |k| self.mask & (1u8 << *k) != 0)
            .filter_map(|k| Microsteps::new(1 << k).ok())
    }
}

impl Default for MicrostepCapability {
    fn default() -> Self {
        Self::GENERIC
    }
}

/// Driver family selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// Generic STEP/DIR driver.
    #[default]
    Generic,
    /// Allegro A4988.
    A4988,
    /// TI DRV8825.
    Drv8825,
    /// TI DRV8834.
    Drv8834,
    /// TI DRV8880.
    Drv8880,
}

impl DriverKind {
    /// Microstep capability of this family.
    pub fn capability(self) -> MicrostepCapability {
        match self {
            DriverKind::Generic => MicrostepCapability::GENERIC,
            DriverKind::A4988 => MicrostepCapability::A4988,
            DriverKind::Drv8825 => MicrostepCapability::DRV8825,
            DriverKind::Drv8834 => MicrostepCapability::DRV8834,
            DriverKind::Drv8880 => MicrostepCapability::DRV8880,
        }
    }
}
