pub mod error;
pub mod manager;
pub mod queries;
pub mod reservation;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use vanbook_core::events::EventPublisher;
use vanbook_core::{Booking, BookingRules, BookingStatus, Repositories, SeatKey, SeatLocker};
use vanbook_shared::{BookingEvent, BookingEventKind};

pub use error::BookingError;
pub use manager::BookingLifecycle;
pub use queries::{BookingQueries, DriverSchedule};
pub use reservation::{PassengerDetails, ReservationCoordinator, ReservationOutcome, ReservationRequest};
pub use resolver::ScheduleResolver;

/// The booking services, wired to one store, one lock backend and one event channel.
#[derive(Clone)]
pub struct BookingServices {
    pub reservations: Arc<ReservationCoordinator>,
    pub lifecycle: Arc<BookingLifecycle>,
    pub queries: Arc<BookingQueries>,
}

impl BookingServices {
    pub fn new(
        repos: Repositories,
        locks: Arc<dyn SeatLocker>,
        events: Arc<dyn EventPublisher>,
        rules: BookingRules,
    ) -> Self {
        let resolver = ScheduleResolver::new(repos.clone(), rules.schedule_resolve_attempts);
        let hold_expiry = rules.hold_expiry();
        Self {
            reservations: Arc::new(ReservationCoordinator::new(
                repos.clone(),
                resolver.clone(),
                locks.clone(),
                events.clone(),
                rules,
            )),
            lifecycle: Arc::new(BookingLifecycle::new(repos.clone(), resolver, locks, events, hold_expiry)),
            queries: Arc::new(BookingQueries::new(repos)),
        }
    }
}

/// Lock releases never fail the operation that triggers them: the store has
/// already recorded the outcome and the hold expires on its own.
pub(crate) async fn release_seat(locks: &dyn SeatLocker, key: &SeatKey) {
    if let Err(e) = locks.release(key).await {
        warn!("Could not release seat lock {}: {}", key, e);
    }
}

pub(crate) fn booking_event(kind: BookingEventKind, booking: &Booking) -> BookingEvent {
    BookingEvent::new(
        kind,
        booking.id,
        booking.schedule_id,
        booking.seat_number,
        booking.status.as_str(),
        booking.user_id,
    )
}

pub(crate) async fn publish_event(events: &dyn EventPublisher, event: BookingEvent) {
    if let Err(e) = events.publish(&event).await {
        warn!("Failed to publish {:?} for booking {}: {}", event.kind, event.booking_id, e);
    }
}

/// Whether an active booking other than `except` holds the seat.
///
/// A `PENDING` booking created more than `hold_expiry` ago is an abandoned
/// hold: it is rejected here and stops counting. Age runs from creation, so
/// moving the booking to another departure does not extend it.
pub(crate) async fn seat_occupied(
    repos: &Repositories,
    events: &dyn EventPublisher,
    hold_expiry: Duration,
    key: &SeatKey,
    except: Option<i64>,
) -> Result<bool, BookingError> {
    let now = Utc::now();
    let occupants = repos
        .bookings
        .list_schedule_bookings(key.schedule_id)
        .await?
        .into_iter()
        .filter(|b| b.seat_number == key.seat_number && b.status.is_active() && Some(b.id) != except);

    for booking in occupants {
        let abandoned = booking.status == BookingStatus::Pending
            && booking
                .created_at
                .checked_add_signed(hold_expiry)
                .is_some_and(|deadline| deadline <= now);
        if !abandoned {
            return Ok(true);
        }

        match repos
            .bookings
            .transition_status(booking.id, &[BookingStatus::Pending], BookingStatus::Rejected)
            .await?
        {
            Some(expired) => {
                info!(booking_id = expired.id, "Rejected unpaid booking after its hold expired");
                publish_event(events, booking_event(BookingEventKind::BookingRejected, &expired)).await;
            }
            // Paid or cancelled in the meantime.
            None => {
                let current = repos.bookings.get_booking(booking.id).await?;
                if current.is_some_and(|b| b.status.is_active()) {
                    return Ok(true);
                }
            }
        }
    }

    Ok(false)
}
