use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// What a subscriber listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Every ledger event.
    All,
    /// Only events touching one slot.
    Slot(u32),
}

/// Broadcast hub for ledger change notifications.
pub struct NotifyHub {
    channels: DashMap<Channel, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a channel. Creates the channel if needed.
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish to `All` and, for slot events, to that slot's channel.
    /// No-op if nobody is listening.
    pub fn send(&self, event: &Event) {
        if let Some(sender) = self.channels.get(&Channel::All) {
            let _ = sender.send(event.clone());
        }
        if let Some(slot) = event.slot()
            && let Some(sender) = self.channels.get(&Channel::Slot(slot))
        {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop every per-slot channel (after the inventory is rebuilt).
    pub fn clear_slots(&self) {
        self.channels.retain(|channel, _| matches!(channel, Channel::All));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Plate;

    fn plate(raw: &str) -> Plate {
        Plate::normalize(raw).unwrap()
    }

    #[tokio::test]
    async fn slot_subscriber_sees_only_its_slot() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe(Channel::Slot(2));

        hub.send(&Event::OccupancyRestored { plate: plate("AAA111"), slot: 1, at: 0 });
        let event = Event::OccupancyRestored { plate: plate("BBB222"), slot: 2, at: 0 };
        hub.send(&event);

        assert_eq!(rx.recv().await.unwrap(), event);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn all_channel_sees_ledger_wide_events() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe(Channel::All);

        let event = Event::VehicleRegistered { plate: plate("abc"), at: 5 };
        hub.send(&event);

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        hub.send(&Event::SlotsInitialized { capacity: 3, reserved: vec![] });
    }

    #[tokio::test]
    async fn clear_slots_closes_slot_channels() {
        let hub = NotifyHub::new();
        let mut slot_rx = hub.subscribe(Channel::Slot(1));
        let _all_rx = hub.subscribe(Channel::All);

        hub.clear_slots();

        assert!(matches!(
            slot_rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
