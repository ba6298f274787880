pub mod state;
pub mod store;

pub use state::{SessionPhase, SessionSnapshot};
pub use store::SessionStore;
