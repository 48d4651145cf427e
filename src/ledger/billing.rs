use crate::model::*;

pub const HOUR_MS: Ms = 3_600_000;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// Whole hours started between entry and exit. Zero for a zero or negative (skewed) stay.
pub fn billed_hours(entry: Ms, exit: Ms) -> u64 {
    let elapsed = exit.saturating_sub(entry);
    if elapsed <= 0 {
        return 0;
    }
    (elapsed as u64).div_ceil(HOUR_MS as u64)
}

/// `max(rate, billed_hours * rate)`: every stay pays at least one hour.
pub fn session_fee(entry: Ms, exit: Ms, rate: Amount) -> Amount {
    let hours = billed_hours(entry, exit);
    Amount(rate.0.max(hours.saturating_mul(rate.0)))
}
