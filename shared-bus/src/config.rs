use core::{
    fmt::Display,
    ops::{BitAnd, BitOr},
};

use embedded_hal::spi::{Mode, MODE_0};

/// Value clocked out when a transfer receives more bytes than it sends
pub const DEFAULT_FILL: u8 = 0xFF;

/// Bus settings a device needs applied to the controller before it transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Bits per frame
    pub bits: u8,
    /// Clock polarity and phase
    pub mode: Mode,
    /// Clock frequency in Hz
    pub frequency: u32,
}

impl BusConfig {
    pub const fn new(bits: u8, mode: Mode, frequency: u32) -> Self {
        BusConfig {
            bits,
            mode,
            frequency,
        }
    }
}

impl Default for BusConfig {
    /// 8 bit frames, mode 0, 1 MHz
    fn default() -> Self {
        BusConfig::new(8, MODE_0, 1_000_000)
    }
}

/// Identity of a [crate::SharedBus] on its arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub(crate) u16);

impl DeviceId {
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Event bits raised by the controller for an asynchronous transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Events(u32);

impl Events {
    pub const NONE: Events = Events(0);
    /// The transfer failed on the wire
    pub const ERROR: Events = Events(1 << 1);
    /// All bytes were transferred
    pub const COMPLETE: Events = Events(1 << 2);
    /// Received data was lost
    pub const RX_OVERFLOW: Events = Events(1 << 3);
    /// Every event a completion handler can be told about
    pub const ALL: Events = Events(0x0E);
    /// Controller finished with the transfer, not reported to handlers
    pub const INTERNAL_COMPLETE: Events = Events(1 << 30);

    pub const fn from_bits(bits: u32) -> Self {
        Events(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: Events) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(&self, other: Events) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitAnd for Events {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Events(self.0 & rhs.0)
    }
}

impl BitOr for Events {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Events(self.0 | rhs.0)
    }
}
