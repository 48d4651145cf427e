//! Startup seeding: from the directory when it answers, demo data otherwise.

use tracing::{info, warn};

use crate::directory::{DirectoryService, DirectoryStatus};
use crate::model::*;

use super::Ledger;
use super::billing::{HOUR_MS, now_ms};

pub const DEMO_PLATES: [&str; 3] = ["DL01AB1234", "MH12CD5678", "KA05EF9012"];

/// How long the demo vehicle has already been parked.
pub const DEMO_STAY_MS: Ms = 2 * HOUR_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    Directory { loaded: usize },
    Demo,
    Empty,
}

/// Probe the directory and seed the vehicle set.
///
/// Updates `status` with the probe result. Falls back to the demo seed (if
/// enabled) when the directory is unreachable or its listing fails. Seeded
/// plates are not queued for sync.
pub async fn load_initial_data(
    ledger: &mut Ledger,
    directory: &dyn DirectoryService,
    status: &DirectoryStatus,
) -> SeedSource {
    let reachable = directory.health().await;
    status.set(reachable);

    if reachable {
        match directory.list_vehicles().await {
            Ok(plates) => {
                let loaded = ledger.seed_from_directory(&plates);
                info!("loaded {loaded} vehicles from directory");
                return SeedSource::Directory { loaded };
            }
            Err(e) => warn!("directory listing failed, falling back: {e}"),
        }
    } else {
        info!("directory unreachable at startup");
    }

    if ledger.config.demo_seed {
        ledger.seed_demo(now_ms());
        SeedSource::Demo
    } else {
        SeedSource::Empty
    }
}

impl Ledger {
    /// Add plates listed by the directory. Blank, short and duplicate
    /// entries are skipped. Returns how many were added.
    pub fn seed_from_directory(&mut self, plates: &[String]) -> usize {
        let now = now_ms();
        let mut added = 0;
        for raw in plates {
            match Plate::normalize(raw) {
                Some(plate) if plate.len() >= crate::config::MIN_PLATE_LEN => {
                    if self.insert_vehicle(plate, now) {
                        added += 1;
                    }
                }
                _ => warn!("skipping directory plate {raw:?}"),
            }
        }
        added
    }

    /// Register the demo plates and park the first one in the first
    /// unreserved slot, entered two hours before `now`.
    pub fn seed_demo(&mut self, now: Ms) {
        for raw in DEMO_PLATES {
            if let Some(plate) = Plate::normalize(raw) {
                self.insert_vehicle(plate, now);
            }
        }
        let Some(slot) = self.available_slots().first().copied() else {
            info!("no free slot for the demo session");
            return;
        };
        match self.park_vehicle_at(DEMO_PLATES[0], slot, now.saturating_sub(DEMO_STAY_MS)) {
            Ok(_) => info!("demo vehicle {} parked in slot {slot}", DEMO_PLATES[0]),
            Err(e) => warn!("demo session not opened: {e}"),
        }
    }
}
