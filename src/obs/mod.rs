//! obs-websocket host adapter

mod controller;
mod events;

pub use controller::ObsController;
pub use events::spawn_event_pump;
