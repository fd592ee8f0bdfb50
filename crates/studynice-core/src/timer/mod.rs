mod clock;
mod engine;
mod session;
mod store;
mod ticker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::SessionTimer;
pub use session::{SessionData, TimerSession, TimerState};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use ticker::{DisplayTicker, MAX_REFRESH_INTERVAL_MS};
