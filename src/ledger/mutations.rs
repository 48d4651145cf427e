use tracing::{info, warn};
use ulid::Ulid;

use crate::config::MIN_PLATE_LEN;
use crate::model::*;
use crate::observability::*;
use crate::outbox::SyncIntent;

use super::billing::{billed_hours, now_ms, session_fee};
use super::{Ledger, LedgerError, Unavailable};

fn count_error(operation: &'static str, e: &LedgerError) {
    metrics::counter!(OPERATION_ERRORS_TOTAL, "operation" => operation, "kind" => e.kind()).increment(1);
}

fn normalize(raw: &str) -> Result<Plate, LedgerError> {
    Plate::normalize(raw).ok_or(LedgerError::Validation("license plate is empty"))
}

impl Ledger {
    /// Register a plate locally, then queue a best-effort directory sync.
    /// The sync never blocks this call and its outcome is never reported here.
    pub fn register_vehicle(&mut self, raw: &str) -> Result<Vehicle, LedgerError> {
        let vehicle = self
            .try_register(raw, now_ms())
            .inspect_err(|e| count_error("register", e))?;
        if let Some(outbox) = &self.outbox {
            outbox.enqueue(SyncIntent::RegisterVehicle {
                plate: vehicle.plate.clone(),
            });
        }
        info!("vehicle {} registered", vehicle.plate);
        Ok(vehicle)
    }

    fn try_register(&mut self, raw: &str, now: Ms) -> Result<Vehicle, LedgerError> {
        let plate = normalize(raw)?;
        if plate.len() < MIN_PLATE_LEN {
            return Err(LedgerError::Validation("license plate must be at least 3 characters"));
        }
        if self.registered.contains(&plate) {
            return Err(LedgerError::Duplicate(plate));
        }
        self.insert_vehicle(plate.clone(), now);
        Ok(Vehicle {
            plate,
            registered_at: now,
        })
    }

    /// Add an already-validated plate without queuing a directory sync.
    /// Returns false if it was already registered.
    pub(super) fn insert_vehicle(&mut self, plate: Plate, at: Ms) -> bool {
        if self.registered.contains(&plate) {
            return false;
        }
        self.record(Event::VehicleRegistered { plate, at });
        metrics::counter!(VEHICLES_REGISTERED_TOTAL).increment(1);
        true
    }

    pub fn park_vehicle(&mut self, raw: &str, slot: u32) -> Result<SessionId, LedgerError> {
        self.park_vehicle_at(raw, slot, now_ms())
    }

    /// Open a session for `raw` in `slot`, entering at `now`.
    pub fn park_vehicle_at(&mut self, raw: &str, slot: u32, now: Ms) -> Result<SessionId, LedgerError> {
        let plate = self
            .check_parkable(raw, slot)
            .inspect_err(|e| count_error("park", e))?;

        let session = Ulid::new();
        info!("vehicle {plate} parked in slot {slot}");
        self.record(Event::SessionOpened {
            session,
            plate,
            slot,
            at: now,
            rate: self.config.hourly_rate,
        });
        metrics::counter!(SESSIONS_OPENED_TOTAL).increment(1);
        self.publish_occupancy();
        Ok(session)
    }

    /// Put a registered vehicle in a slot without opening a session, as when
    /// occupancy is imported from elsewhere with no history. The eventual
    /// unpark frees the slot but leaves no transaction behind.
    pub fn restore_occupancy(&mut self, raw: &str, slot: u32, entry: Ms) -> Result<(), LedgerError> {
        let plate = self
            .check_parkable(raw, slot)
            .inspect_err(|e| count_error("restore", e))?;
        self.record(Event::OccupancyRestored { plate, slot, at: entry });
        self.publish_occupancy();
        Ok(())
    }

    /// All park preconditions, in order: input, registration, one slot per
    /// vehicle, then the target slot itself.
    fn check_parkable(&self, raw: &str, number: u32) -> Result<Plate, LedgerError> {
        let plate = normalize(raw)?;
        let slot = self
            .slot(number)
            .ok_or(LedgerError::Validation("slot number not in inventory"))?;
        if !self.registered.contains(&plate) {
            return Err(LedgerError::NotRegistered(plate));
        }
        if let Some(held) = self.parked_slot(&plate) {
            return Err(LedgerError::AlreadyParked { plate, slot: held });
        }
        if slot.is_occupied() {
            return Err(LedgerError::SlotUnavailable {
                slot: number,
                reason: Unavailable::Occupied,
            });
        }
        if slot.reserved {
            return Err(LedgerError::SlotUnavailable {
                slot: number,
                reason: Unavailable::Reserved,
            });
        }
        Ok(plate)
    }

    pub fn unpark_vehicle(&mut self, raw: &str) -> Result<Receipt, LedgerError> {
        self.unpark_vehicle_at(raw, now_ms())
    }

    /// Free the slot held by `raw` and bill the stay up to `now`.
    pub fn unpark_vehicle_at(&mut self, raw: &str, now: Ms) -> Result<Receipt, LedgerError> {
        let receipt = self
            .try_unpark(raw, now)
            .inspect_err(|e| count_error("unpark", e))?;
        info!(
            "vehicle {} left slot {}, charged {}",
            receipt.plate,
            receipt.slot,
            self.format_amount(receipt.fee)
        );
        self.publish_occupancy();
        Ok(receipt)
    }

    fn try_unpark(&mut self, raw: &str, now: Ms) -> Result<Receipt, LedgerError> {
        let plate = normalize(raw)?;
        let (slot, entry) = self
            .slots
            .iter()
            .find_map(|s| {
                s.occupancy
                    .as_ref()
                    .filter(|o| o.plate == plate)
                    .map(|o| (s.number, o.since))
            })
            .ok_or_else(|| LedgerError::NotFound(plate.clone()))?;

        let open = self.open_sessions.get(&plate).copied();
        let rate = open.map_or(self.config.hourly_rate, |o| o.rate);
        let fee = session_fee(entry, now, rate);

        let session = match open {
            Some(open) => {
                self.record(Event::SessionClosed {
                    session: open.session,
                    plate: plate.clone(),
                    slot,
                    at: now,
                });
                metrics::counter!(SESSIONS_CLOSED_TOTAL).increment(1);
                metrics::counter!(REVENUE_TOTAL).increment(fee.0);
                Some(open.session)
            }
            None => {
                warn!("vehicle {plate} left slot {slot} with no open session, fee not recorded");
                self.record(Event::OccupancyReleased {
                    plate: plate.clone(),
                    slot,
                    at: now,
                });
                metrics::counter!(UNRECORDED_UNPARKS_TOTAL).increment(1);
                None
            }
        };

        Ok(Receipt {
            session,
            plate,
            slot,
            entry,
            exit: now,
            billed_hours: billed_hours(entry, now),
            fee,
        })
    }

    fn publish_occupancy(&self) {
        let occupied = self.slots.iter().filter(|s| s.is_occupied()).count();
        metrics::gauge!(SLOTS_OCCUPIED).set(occupied as f64);
    }
}
