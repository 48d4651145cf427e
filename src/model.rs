use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Identifies one parking session across its open and close events.
pub type SessionId = Ulid;

/// Integer currency amount. No fractional units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount(0), Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized licence plate: trimmed and upper-cased.
///
/// Normalization only rejects empty input. The registration length rule is
/// enforced by the ledger, so lookups with short plates still resolve to
/// "not registered" rather than a validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plate(String);

impl Plate {
    pub fn normalize(raw: &str) -> Option<Plate> {
        let plate = raw.trim().to_uppercase();
        if plate.is_empty() {
            None
        } else {
            Some(Plate(plate))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters, not bytes.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for Plate {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Who holds a slot and since when. Present iff the slot is occupied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub plate: Plate,
    pub since: Ms,
}

/// One physical parking space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub number: u32,
    pub reserved: bool,
    pub occupancy: Option<Occupancy>,
}

impl Slot {
    pub fn new(number: u32, reserved: bool) -> Self {
        Self {
            number,
            reserved,
            occupancy: None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupancy.is_some()
    }

    pub fn occupant(&self) -> Option<&Plate> {
        self.occupancy.as_ref().map(|o| &o.plate)
    }

    pub fn entry_time(&self) -> Option<Ms> {
        self.occupancy.as_ref().map(|o| o.since)
    }

    /// Free and not reserved.
    pub fn is_available(&self) -> bool {
        !self.reserved && self.occupancy.is_none()
    }

    pub fn state(&self) -> SlotState {
        match &self.occupancy {
            Some(o) => SlotState::Occupied {
                plate: o.plate.clone(),
                since: o.since,
            },
            None if self.reserved => SlotState::Reserved,
            None => SlotState::Free,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Free,
    Reserved,
    Occupied { plate: Plate, since: Ms },
}

/// A registered plate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub plate: Plate,
    pub registered_at: Ms,
}

/// The event types. Flat, no nesting. Every ledger mutation is exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    SlotsInitialized {
        capacity: u32,
        /// Numbers of the slots drawn as reserved.
        reserved: Vec<u32>,
    },
    VehicleRegistered {
        plate: Plate,
        at: Ms,
    },
    SessionOpened {
        session: SessionId,
        plate: Plate,
        slot: u32,
        at: Ms,
        /// Hourly rate in force when the session opened.
        rate: Amount,
    },
    SessionClosed {
        session: SessionId,
        plate: Plate,
        slot: u32,
        at: Ms,
    },
    /// Occupancy imported without a session (no history to bill against).
    OccupancyRestored {
        plate: Plate,
        slot: u32,
        at: Ms,
    },
    /// Slot freed for an occupancy that had no open session.
    OccupancyReleased {
        plate: Plate,
        slot: u32,
        at: Ms,
    },
}

impl Event {
    /// The slot an event touches, if any.
    pub fn slot(&self) -> Option<u32> {
        match self {
            Event::SessionOpened { slot, .. }
            | Event::SessionClosed { slot, .. }
            | Event::OccupancyRestored { slot, .. }
            | Event::OccupancyReleased { slot, .. } => Some(*slot),
            Event::SlotsInitialized { .. } | Event::VehicleRegistered { .. } => None,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Park,
    Unpark,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Park => f.write_str("PARK"),
            Action::Unpark => f.write_str("UNPARK"),
        }
    }
}

/// History row for one parking session, derived from its open/close events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub session: SessionId,
    /// When the session opened.
    pub time: Ms,
    pub plate: Plate,
    pub action: Action,
    pub slot: u32,
    /// Present once the session has closed.
    pub amount: Option<Amount>,
}

impl Transaction {
    pub fn display_time(&self) -> String {
        display_time(self.time)
    }
}

/// Local wall-clock `HH:MM AM/PM` for a timestamp, `--` if out of range.
pub fn display_time(at: Ms) -> String {
    chrono::DateTime::from_timestamp_millis(at)
        .map(|utc| utc.with_timezone(&chrono::Local).format("%I:%M %p").to_string())
        .unwrap_or_else(|| "--".to_string())
}

/// What `unpark_vehicle` hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// `None` when the occupancy had no open session to close.
    pub session: Option<SessionId>,
    pub plate: Plate,
    pub slot: u32,
    pub entry: Ms,
    pub exit: Ms,
    pub billed_hours: u64,
    pub fee: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub occupied: usize,
    pub free: usize,
    pub vehicles: usize,
    pub revenue: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plate_normalizes_whitespace_and_case() {
        let plate = Plate::normalize("  ka05ef9012 \t").unwrap();
        assert_eq!(plate, "KA05EF9012");
        assert_eq!(plate.len(), 10);
    }

    #[test]
    fn plate_rejects_blank() {
        assert!(Plate::normalize("").is_none());
        assert!(Plate::normalize("   ").is_none());
    }

    #[test]
    fn slot_state_prefers_occupancy() {
        let mut slot = Slot::new(3, false);
        assert_eq!(slot.state(), SlotState::Free);
        assert!(slot.is_available());

        slot.occupancy = Some(Occupancy {
            plate: Plate::normalize("abc").unwrap(),
            since: 10,
        });
        assert!(!slot.is_available());
        assert_eq!(slot.entry_time(), Some(10));
        assert!(matches!(slot.state(), SlotState::Occupied { since: 10, .. }));

        let reserved = Slot::new(4, true);
        assert_eq!(reserved.state(), SlotState::Reserved);
        assert!(!reserved.is_available());
    }

    #[test]
    fn amounts_sum_and_display() {
        let total: Amount = [Amount(50), Amount(100), Amount(0)].into_iter().sum();
        assert_eq!(total, Amount(150));
        assert_eq!(total.to_string(), "150");
    }

    #[test]
    fn action_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Action::Unpark).unwrap(), "\"UNPARK\"");
        assert_eq!(Action::Park.to_string(), "PARK");
    }

    #[test]
    fn display_time_out_of_range() {
        assert_eq!(display_time(i64::MAX), "--");
        assert!(display_time(0).ends_with("AM") || display_time(0).ends_with("PM"));
    }
}
