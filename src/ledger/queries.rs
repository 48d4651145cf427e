use std::collections::HashMap;

use crate::model::*;

use super::Ledger;
use super::billing::session_fee;

impl Ledger {
    /// Occupancy, vehicle count and revenue. Pure read.
    pub fn snapshot_statistics(&self) -> Statistics {
        let occupied = self.slots.iter().filter(|s| s.is_occupied()).count();
        Statistics {
            occupied,
            free: self.slots.len() - occupied,
            vehicles: self.vehicles.len(),
            revenue: self.revenue(),
        }
    }

    /// Sum of fees over every closed session in the log.
    pub fn revenue(&self) -> Amount {
        self.transactions().filter_map(|t| t.amount).sum()
    }

    /// One row per session, most recent first. A closed session shows as
    /// `UNPARK` with its fee; an open one as `PARK` with no amount.
    pub fn transactions(&self) -> impl Iterator<Item = Transaction> + '_ {
        let closed: HashMap<SessionId, Ms> = self
            .events
            .iter()
            .filter_map(|e| match e {
                Event::SessionClosed { session, at, .. } => Some((*session, *at)),
                _ => None,
            })
            .collect();

        self.events.iter().rev().filter_map(move |e| match e {
            Event::SessionOpened {
                session,
                plate,
                slot,
                at,
                rate,
            } => {
                let closed_at = closed.get(session).copied();
                Some(Transaction {
                    session: *session,
                    time: *at,
                    plate: plate.clone(),
                    action: if closed_at.is_some() { Action::Unpark } else { Action::Park },
                    slot: *slot,
                    amount: closed_at.map(|exit| session_fee(*at, exit, *rate)),
                })
            }
            _ => None,
        })
    }

    /// The first `limit` transactions. Truncates the view, never the log.
    pub fn recent_transactions(&self, limit: usize) -> Vec<Transaction> {
        self.transactions().take(limit).collect()
    }

    /// Registered vehicles in registration order.
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicles_recent_first(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter().rev()
    }

    /// The slot this plate currently holds, if any.
    pub fn parked_slot(&self, plate: &Plate) -> Option<u32> {
        self.slots
            .iter()
            .find(|s| s.occupant() == Some(plate))
            .map(|s| s.number)
    }

    pub fn slot_state(&self, number: u32) -> Option<SlotState> {
        self.slot(number).map(Slot::state)
    }

    /// Free, unreserved slot numbers, ascending.
    pub fn available_slots(&self) -> Vec<u32> {
        self.slots
            .iter()
            .filter(|s| s.is_available())
            .map(|s| s.number)
            .collect()
    }

    /// Currency prefix plus integer magnitude, e.g. `₹100`.
    pub fn format_amount(&self, amount: Amount) -> String {
        format!("{}{}", self.config.currency_prefix, amount)
    }
}
