pub mod config;
pub mod directory;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod observability;
pub mod outbox;
pub mod poller;
