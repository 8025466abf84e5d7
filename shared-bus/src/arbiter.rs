use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};
use embedded_hal::spi::Error as _;
use heapless::Deque;

use crate::{
    error::BusError,
    transfer::{Outcome, PendingTransfer},
    transport::{AsyncTransport, ConfigurableBus},
    BusConfig, DeviceId, Events,
};

/// Everything guarded by the arbiter lock
struct State<BUS, const Q: usize, const N: usize> {
    bus: BUS,
    /// Device whose settings are live on the controller
    owner: Option<DeviceId>,
    /// Next id to hand out. Ids are never reused, past `u16::MAX` attaching fails.
    next_id: u32,
    reconfigurations: u32,
    in_flight: Option<PendingTransfer<N>>,
    queue: Deque<PendingTransfer<N>, Q>,
}

impl<BUS: ConfigurableBus, const Q: usize, const N: usize> State<BUS, Q, N> {
    /// Make `device` the owner, pushing its settings to the controller if it
    /// was not the owner already.
    fn acquire(&mut self, device: DeviceId, config: &BusConfig) {
        if self.owner != Some(device) {
            debug!(
                "Bus owner now device {}: {} bits at {} Hz",
                device.as_u16(),
                config.bits,
                config.frequency
            );
            self.bus.set_format(config.bits, config.mode);
            self.bus.set_frequency(config.frequency);
            self.owner = Some(device);
            self.reconfigurations += 1;
        }
    }
}

impl<BUS: AsyncTransport, const Q: usize, const N: usize> State<BUS, Q, N> {
    /// Start a transfer on the idle controller, handing the request back if
    /// the controller refuses it.
    fn start(
        &mut self,
        request: PendingTransfer<N>,
    ) -> Result<(), (PendingTransfer<N>, BUS::Error)> {
        self.acquire(request.device, &request.config);
        trace!(
            "Starting transfer for device {}: {} tx, {} rx",
            request.device.as_u16(),
            request.tx.len(),
            request.rx.len()
        );
        let started = self.bus.start_transfer(
            &request.tx,
            request.rx.len(),
            request.config.bits,
            request.fill,
            request.events,
        );
        match started {
            Ok(()) => {
                self.in_flight = Some(request);
                Ok(())
            }
            Err(e) => Err((request, e)),
        }
    }

    fn is_busy(&self) -> bool {
        self.in_flight.is_some() || self.bus.is_active()
    }
}

/// Arbitrates one physical bus controller between any number of
/// [crate::SharedBus] devices.
///
/// Tracks which device's settings are live on the controller and re-applies
/// settings only when a different device transfers. All transfers and
/// ownership changes are serialised by a single lock of type `M`.
///
/// `Q` bounds the asynchronous transfer queue and `N` the size of a single
/// asynchronous transfer.
pub struct BusArbiter<M: RawMutex, BUS, const Q: usize = 4, const N: usize = 64> {
    state: Mutex<M, RefCell<State<BUS, Q, N>>>,
}

impl<M: RawMutex, BUS, const Q: usize, const N: usize> BusArbiter<M, BUS, Q, N> {
    /// Take ownership of the controller. No device owns it yet.
    pub const fn new(bus: BUS) -> Self {
        BusArbiter {
            state: Mutex::new(RefCell::new(State {
                bus,
                owner: None,
                next_id: 0,
                reconfigurations: 0,
                in_flight: None,
                queue: Deque::new(),
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State<BUS, Q, N>) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    /// Device whose settings are currently live on the controller
    pub fn owner(&self) -> Option<DeviceId> {
        self.with_state(|s| s.owner)
    }

    /// Number of times settings have been pushed to the controller
    pub fn reconfigurations(&self) -> u32 {
        self.with_state(|s| s.reconfigurations)
    }

    /// Number of asynchronous transfers waiting for the controller
    pub fn queued(&self) -> usize {
        self.with_state(|s| s.queue.len())
    }

    /// Run `f` on the controller under the lock without touching ownership.
    ///
    /// Settings changed through here are not tracked.
    pub fn inspect<R>(&self, f: impl FnOnce(&mut BUS) -> R) -> R {
        self.with_state(|s| f(&mut s.bus))
    }

    fn register(&self) -> Option<DeviceId> {
        self.with_state(|s| {
            let id = u16::try_from(s.next_id).ok()?;
            s.next_id += 1;
            Some(DeviceId(id))
        })
    }
}

impl<M: RawMutex, BUS: ConfigurableBus, const Q: usize, const N: usize> BusArbiter<M, BUS, Q, N> {
    /// Register a new device, giving it the bus if nobody owns it yet
    pub(crate) fn attach(&self, config: &BusConfig) -> Result<DeviceId, BusError<BUS::Error>> {
        let Some(id) = self.register() else {
            error!("No device ids left on the shared bus");
            return Err(BusError::DevicesExhausted);
        };
        self.with_state(|s| {
            if s.owner.is_none() && s.in_flight.is_none() {
                s.acquire(id, config);
            }
        });
        Ok(id)
    }

    /// Record new settings for `device`. Applied now if it owns the idle bus,
    /// otherwise on its next transfer.
    pub(crate) fn configure(&self, device: DeviceId, config: &BusConfig) {
        self.with_state(|s| {
            if s.owner != Some(device) {
                return;
            }
            if s.in_flight.is_some() {
                trace!("Controller busy, device {} reconfigures later", device.as_u16());
                s.owner = None;
                return;
            }
            trace!("Reconfiguring owner {} in place", device.as_u16());
            s.bus.set_format(config.bits, config.mode);
            s.bus.set_frequency(config.frequency);
            s.reconfigurations += 1;
        })
    }

    /// Make `device` the owner now. Fails with [BusError::Busy] while an
    /// asynchronous transfer of another device holds the controller.
    pub(crate) fn acquire(
        &self,
        device: DeviceId,
        config: &BusConfig,
    ) -> Result<(), BusError<BUS::Error>> {
        self.with_state(|s| {
            if s.in_flight.is_some() {
                if s.owner == Some(device) {
                    return Ok(());
                }
                return Err(BusError::Busy);
            }
            s.acquire(device, config);
            Ok(())
        })
    }

    /// Run `f` on the controller as `device`, with its settings live.
    ///
    /// Fails with [BusError::Busy] without touching the controller while an
    /// asynchronous transfer is running.
    pub(crate) fn transfer<R>(
        &self,
        device: DeviceId,
        config: &BusConfig,
        f: impl FnOnce(&mut BUS) -> Result<R, BusError<BUS::Error>>,
    ) -> Result<R, BusError<BUS::Error>> {
        self.with_state(|s| {
            if s.in_flight.is_some() {
                debug!(
                    "Device {} refused, asynchronous transfer in flight",
                    device.as_u16()
                );
                return Err(BusError::Busy);
            }
            s.acquire(device, config);
            f(&mut s.bus)
        })
    }

    /// Give up ownership if `device` holds it, freeing the controller once
    /// no asynchronous transfer is running on it
    pub(crate) fn release(&self, device: DeviceId) {
        self.with_state(|s| {
            if s.owner == Some(device) {
                debug!("Device {} released the bus", device.as_u16());
                s.owner = None;
                if s.in_flight.is_none() {
                    s.bus.release();
                }
            }
        })
    }
}

impl<M: RawMutex, BUS: AsyncTransport, const Q: usize, const N: usize> BusArbiter<M, BUS, Q, N> {
    /// Start `request` now if the controller is idle, otherwise queue it
    pub(crate) fn submit(&self, request: PendingTransfer<N>) -> Result<(), BusError<BUS::Error>> {
        self.with_state(|s| {
            if s.is_busy() {
                trace!("Controller busy, queueing transfer");
                return s.queue.push_back(request).map_err(|_| {
                    warn!("Transfer queue full ({} entries)", Q);
                    BusError::QueueFull
                });
            }
            s.start(request).map_err(|(_, e)| BusError::Transport(e))
        })
    }

    /// Service the controller interrupt.
    ///
    /// Call this from the controller's interrupt handler. When the in-flight
    /// transfer has finished its handler runs, then the next queued transfer
    /// is started. A transfer that finishes without raising any of its
    /// requested events is still reported, as `Finished(Events::NONE)`.
    pub fn on_interrupt(&self) {
        let finished = self.with_state(|s| {
            let mut transfer = s.in_flight.take()?;
            let raised = s.bus.handle_interrupt(&mut transfer.rx);
            if raised.intersects(Events::ALL | Events::INTERNAL_COMPLETE) {
                Some((transfer, raised))
            } else {
                s.in_flight = Some(transfer);
                None
            }
        });
        if let Some((transfer, raised)) = finished {
            trace!(
                "Transfer for device {} finished with events {}",
                transfer.device.as_u16(),
                raised.bits()
            );
            transfer.notify(Outcome::Finished(raised & Events::ALL & transfer.events));
            self.start_next();
        }
    }

    /// Abort the in-flight transfer and move on to the next queued one
    pub fn abort_transfer(&self) {
        let aborted = self.with_state(|s| {
            s.bus.abort();
            s.in_flight.take()
        });
        if let Some(transfer) = aborted {
            warn!("Aborted transfer for device {}", transfer.device.as_u16());
            transfer.notify(Outcome::Aborted);
        }
        self.start_next();
    }

    /// Drop every queued transfer and abort the in-flight one. Nothing else
    /// is started.
    pub fn abort_all_transfers(&self) {
        let (aborted, mut drained) = self.with_state(|s| {
            let drained = core::mem::replace(&mut s.queue, Deque::new());
            s.bus.abort();
            (s.in_flight.take(), drained)
        });
        if !drained.is_empty() || aborted.is_some() {
            warn!("Aborting all transfers, {} queued", drained.len());
        }
        if let Some(transfer) = aborted {
            transfer.notify(Outcome::Aborted);
        }
        while let Some(transfer) = drained.pop_front() {
            transfer.notify(Outcome::Aborted);
        }
    }

    /// Start queued transfers until one is running or the queue is empty.
    fn start_next(&self) {
        loop {
            let refused = self.with_state(|s| {
                if s.is_busy() {
                    return None;
                }
                let request = s.queue.pop_front()?;
                s.start(request).err()
            });
            match refused {
                Some((transfer, e)) => {
                    error!(
                        "Controller refused transfer for device {}",
                        transfer.device.as_u16()
                    );
                    transfer.notify(Outcome::Failed(e.kind()));
                }
                None => break,
            }
        }
    }
}
