use crate::model::Plate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    Occupied,
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed input: blank or short plate, slot number not in the inventory.
    Validation(&'static str),
    Duplicate(Plate),
    NotRegistered(Plate),
    AlreadyParked { plate: Plate, slot: u32 },
    SlotUnavailable { slot: u32, reason: Unavailable },
    /// No slot currently holds this plate.
    NotFound(Plate),
}

impl LedgerError {
    /// Short stable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation",
            LedgerError::Duplicate(_) => "duplicate",
            LedgerError::NotRegistered(_) => "not_registered",
            LedgerError::AlreadyParked { .. } => "already_parked",
            LedgerError::SlotUnavailable { .. } => "slot_unavailable",
            LedgerError::NotFound(_) => "not_found",
        }
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Validation(msg) => write!(f, "invalid input: {msg}"),
            LedgerError::Duplicate(plate) => write!(f, "vehicle {plate} is already registered"),
            LedgerError::NotRegistered(plate) => {
                write!(f, "vehicle {plate} not registered, register it first")
            }
            LedgerError::AlreadyParked { plate, slot } => {
                write!(f, "vehicle {plate} is already parked in slot {slot}, unpark it first")
            }
            LedgerError::SlotUnavailable { slot, reason } => match reason {
                Unavailable::Occupied => write!(f, "slot {slot} is occupied"),
                Unavailable::Reserved => write!(f, "slot {slot} is reserved"),
            },
            LedgerError::NotFound(plate) => write!(f, "vehicle {plate} not found in parking"),
        }
    }
}

impl std::error::Error for LedgerError {}
