//! Sharing one SPI controller between devices with different bus settings.
//!
//! A [BusArbiter] owns the controller and remembers which device's settings
//! are live on it. Each device talks through its own [SharedBus] handle,
//! which implements [embedded_hal::spi::SpiDevice]. Settings are only pushed
//! to the controller when ownership changes hands, so a device doing many
//! transfers in a row pays for reconfiguration once.
//!
//! Controllers that implement [AsyncTransport] can also run interrupt driven
//! transfers through a bounded queue; see [SharedBus::transfer_async].
#![no_std]

// Must be first to share macros across crate
pub(crate) mod fmt;

mod arbiter;
mod config;
mod device;
mod error;
pub mod test;
mod transfer;
mod transport;

pub use arbiter::BusArbiter;
pub use config::{BusConfig, DeviceId, Events, DEFAULT_FILL};
pub use device::{BusDevice, SharedBus};
pub use error::BusError;
pub use transfer::{Completion, CompletionHandler, Outcome};
pub use transport::{AsyncTransport, ConfigurableBus};
