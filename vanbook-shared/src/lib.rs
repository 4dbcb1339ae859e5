pub mod models;
pub mod pii;

pub use models::{BookingEvent, BookingEventKind, BOOKING_EVENTS_TOPIC};
pub use pii::Masked;
