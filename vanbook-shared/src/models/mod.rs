pub mod events;

pub use events::{BookingEvent, BookingEventKind, BOOKING_EVENTS_TOPIC};
