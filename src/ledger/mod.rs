mod billing;
mod error;
mod mutations;
mod queries;
pub mod seed;

pub use billing::{HOUR_MS, billed_hours, session_fee};
pub use error::{LedgerError, Unavailable};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::LedgerConfig;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::outbox::SyncOutbox;

/// In-memory authority for slots, vehicles and parking history.
///
/// Every mutation is expressed as one `Event`: validated against current
/// state, applied, appended to the log and published on the `NotifyHub`.
/// Transactions and revenue are derived from the log, never stored.
pub struct Ledger {
    config: LedgerConfig,
    rng: ChaCha8Rng,
    slots: Vec<Slot>,
    vehicles: Vec<Vehicle>,
    registered: HashSet<Plate>,
    /// Plate → session currently open for it.
    open_sessions: HashMap<Plate, OpenSession>,
    events: Vec<Event>,
    notify: Arc<NotifyHub>,
    outbox: Option<SyncOutbox>,
}

#[derive(Debug, Clone, Copy)]
struct OpenSession {
    session: SessionId,
    rate: Amount,
}

/// Apply an event to ledger state (no validation, the caller already checked).
fn apply(
    slots: &mut Vec<Slot>,
    vehicles: &mut Vec<Vehicle>,
    registered: &mut HashSet<Plate>,
    open_sessions: &mut HashMap<Plate, OpenSession>,
    event: &Event,
) {
    match event {
        Event::SlotsInitialized { capacity, reserved } => {
            let reserved: HashSet<u32> = reserved.iter().copied().collect();
            *slots = (1..=*capacity)
                .map(|n| Slot::new(n, reserved.contains(&n)))
                .collect();
            open_sessions.clear();
        }
        Event::VehicleRegistered { plate, at } => {
            if registered.insert(plate.clone()) {
                vehicles.push(Vehicle {
                    plate: plate.clone(),
                    registered_at: *at,
                });
            }
        }
        Event::SessionOpened {
            session,
            plate,
            slot,
            at,
            rate,
        } => {
            occupy(slots, plate, *slot, *at);
            open_sessions.insert(
                plate.clone(),
                OpenSession {
                    session: *session,
                    rate: *rate,
                },
            );
        }
        Event::SessionClosed { plate, slot, .. } => {
            release(slots, *slot);
            open_sessions.remove(plate);
        }
        Event::OccupancyRestored { plate, slot, at } => occupy(slots, plate, *slot, *at),
        Event::OccupancyReleased { slot, .. } => release(slots, *slot),
    }
}

fn occupy(slots: &mut [Slot], plate: &Plate, number: u32, at: Ms) {
    if let Some(slot) = slot_index(number).and_then(|i| slots.get_mut(i)) {
        slot.occupancy = Some(Occupancy {
            plate: plate.clone(),
            since: at,
        });
    }
}

fn release(slots: &mut [Slot], number: u32) {
    if let Some(slot) = slot_index(number).and_then(|i| slots.get_mut(i)) {
        slot.occupancy = None;
    }
}

/// Slots are numbered 1..=N and stored in order.
fn slot_index(number: u32) -> Option<usize> {
    (number as usize).checked_sub(1)
}

impl Ledger {
    /// Build a ledger and draw its slot inventory from `config`.
    pub fn new(config: LedgerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut ledger = Self {
            rng,
            slots: Vec::new(),
            vehicles: Vec::new(),
            registered: HashSet::new(),
            open_sessions: HashMap::new(),
            events: Vec::new(),
            notify: Arc::new(NotifyHub::new()),
            outbox: None,
            config,
        };
        let (capacity, probability) = (ledger.config.capacity, ledger.config.reservation_probability);
        let mut rng = ledger.rng.clone();
        ledger.initialize(capacity, probability, &mut rng);
        ledger.rng = rng;
        ledger
    }

    /// Route registrations to the directory through `outbox`.
    pub fn with_outbox(mut self, outbox: SyncOutbox) -> Self {
        self.outbox = Some(outbox);
        self
    }

    /// Publish events on a shared hub instead of the ledger's own.
    pub fn with_notify(mut self, notify: Arc<NotifyHub>) -> Self {
        self.notify = notify;
        self
    }

    /// (Re)build `capacity` free slots numbered 1..=capacity, each reserved
    /// independently with `reservation_probability`.
    ///
    /// A hard reset: existing occupancy is dropped and any open sessions stay
    /// open in the log forever. Vehicles and history are kept.
    pub fn initialize<R: Rng + ?Sized>(
        &mut self,
        capacity: u32,
        reservation_probability: f64,
        rng: &mut R,
    ) {
        let p = if reservation_probability.is_finite() {
            reservation_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let reserved: Vec<u32> = (1..=capacity).filter(|_| rng.gen_bool(p)).collect();
        self.notify.clear_slots();
        self.record(Event::SlotsInitialized { capacity, reserved });
        metrics::gauge!(crate::observability::SLOTS_OCCUPIED).set(0.0);
    }

    /// Re-draw the inventory from the configured capacity and probability
    /// using the ledger's own random source.
    pub fn reset(&mut self) {
        let (capacity, probability) = (self.config.capacity, self.config.reservation_probability);
        let mut rng = self.rng.clone();
        self.initialize(capacity, probability, &mut rng);
        self.rng = rng;
    }

    /// Apply, append, publish.
    fn record(&mut self, event: Event) {
        apply(
            &mut self.slots,
            &mut self.vehicles,
            &mut self.registered,
            &mut self.open_sessions,
            &event,
        );
        self.notify.send(&event);
        self.events.push(event);
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn notify(&self) -> &Arc<NotifyHub> {
        &self.notify
    }

    /// The full append-only log, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, number: u32) -> Option<&Slot> {
        slot_index(number).and_then(|i| self.slots.get(i))
    }

    pub fn is_registered(&self, plate: &Plate) -> bool {
        self.registered.contains(plate)
    }
}
