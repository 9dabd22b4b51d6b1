mod inventory;
mod locks;
mod orchestrator;
mod session;

pub use inventory::InventoryCache;
pub use locks::EnvironmentLocks;
pub use orchestrator::{Consent, Decision, Intent, Offer, Orchestrator};
pub use session::Session;
