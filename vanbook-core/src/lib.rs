pub mod events;
pub mod identity;
pub mod lock;
pub mod memory;
pub mod model;
pub mod payment;
pub mod repository;
pub mod rules;

pub use identity::{Role, User};
pub use lock::{LockError, LockOutcome, SeatKey, SeatLocker};
pub use model::{Booking, BookingStatus, NewBooking, NewSchedule, Route, Schedule, ScheduleStatus, Waypoint};
pub use repository::{Repositories, StoreError, StoreResult};
pub use rules::{BookingRules, OperatingWindow};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
