use chrono::{Duration, NaiveDateTime};
use std::sync::Arc;
use tracing::{info, warn};
use vanbook_core::events::EventPublisher;
use vanbook_core::payment::SlipVerification;
use vanbook_core::{Booking, BookingStatus, Repositories, SeatKey, SeatLocker, StoreError};
use vanbook_shared::BookingEventKind;

use crate::error::BookingError;
use crate::resolver::ScheduleResolver;
use crate::{booking_event, publish_event, release_seat, seat_occupied};

/// Manages booking lifecycle and state transitions.
///
/// Every transition is a compare-and-set on the booking row, so two callers
/// racing on the same booking cannot both succeed. Seat lock releases and
/// event publication follow the store write and never undo it.
pub struct BookingLifecycle {
    repos: Repositories,
    resolver: ScheduleResolver,
    locks: Arc<dyn SeatLocker>,
    events: Arc<dyn EventPublisher>,
    /// Age after which an unpaid booking stops holding its seat.
    hold_expiry: Duration,
}

impl BookingLifecycle {
    pub fn new(
        repos: Repositories,
        resolver: ScheduleResolver,
        locks: Arc<dyn SeatLocker>,
        events: Arc<dyn EventPublisher>,
        hold_expiry: Duration,
    ) -> Self {
        Self { repos, resolver, locks, events, hold_expiry }
    }

    /// Transition: PENDING → CONFIRMED (verified transfer slip)
    ///
    /// The slip must cover the booking's total price.
    pub async fn confirm_payment(
        &self,
        booking_id: i64,
        slip: &SlipVerification,
    ) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;
        ensure_status(&booking, &[BookingStatus::Pending], "confirmed")?;

        if let Some(missing) = slip.shortfall(booking.total_price) {
            return Err(BookingError::InvalidRequest(format!(
                "transfer of {} satang is {} short of the {} due",
                slip.amount, missing, booking.total_price
            )));
        }

        let confirmed = match self
            .repos
            .bookings
            .confirm_payment(booking_id, &slip.slip_file_name, &slip.transaction_ref)
            .await?
        {
            Some(confirmed) => confirmed,
            None => return Err(self.stale(booking_id, "confirmed").await),
        };

        info!(booking_id, transaction_ref = %slip.transaction_ref, "Payment confirmed");
        self.release(&confirmed).await;
        self.publish(BookingEventKind::BookingConfirmed, &confirmed).await;
        Ok(confirmed)
    }

    /// Transition: PENDING → REJECTED (slip failed verification)
    pub async fn reject_payment(&self, booking_id: i64) -> Result<Booking, BookingError> {
        let rejected = self
            .transition(booking_id, &[BookingStatus::Pending], BookingStatus::Rejected, "rejected")
            .await?;

        info!(booking_id, "Payment rejected");
        self.release(&rejected).await;
        self.publish(BookingEventKind::BookingRejected, &rejected).await;
        Ok(rejected)
    }

    /// Transition: PENDING/CONFIRMED → CANCELLED
    ///
    /// Cancelling twice is an error, not a no-op.
    pub async fn cancel(&self, booking_id: i64) -> Result<Booking, BookingError> {
        let cancelled = self
            .transition(booking_id, &BookingStatus::ACTIVE, BookingStatus::Cancelled, "cancelled")
            .await?;

        info!(booking_id, "Booking cancelled");
        self.release(&cancelled).await;
        self.publish(BookingEventKind::BookingCancelled, &cancelled).await;
        Ok(cancelled)
    }

    /// Transition: CONFIRMED → PICKED_UP (driver confirms the passenger boarded)
    pub async fn verify_pickup(&self, booking_id: i64) -> Result<Booking, BookingError> {
        let picked_up = self
            .transition(booking_id, &[BookingStatus::Confirmed], BookingStatus::PickedUp, "picked up")
            .await?;

        info!(booking_id, "Passenger picked up");
        self.publish(BookingEventKind::PassengerPickedUp, &picked_up).await;
        Ok(picked_up)
    }

    /// Moves an active booking to another departure of the same route, keeping
    /// its seat and status.
    ///
    /// No lock is taken on the destination seat: the active-booking check and
    /// the store's seat uniqueness are the only guards. An abandoned hold on
    /// the destination seat is rejected the same way a reservation would. Rescheduling to the
    /// current departure returns the booking unchanged.
    pub async fn reschedule(
        &self,
        booking_id: i64,
        new_departure_time: NaiveDateTime,
    ) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;
        ensure_status(&booking, &BookingStatus::ACTIVE, "rescheduled")?;

        let current = self
            .repos
            .schedules
            .get_schedule(booking.schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound(booking.schedule_id))?;
        if current.departure_time == new_departure_time {
            return Ok(booking);
        }

        let target = self.resolver.resolve(current.route_id, new_departure_time).await?;
        let unavailable = BookingError::SeatUnavailable {
            schedule_id: target.id,
            seat_number: booking.seat_number,
        };

        let target_seat = SeatKey::new(target.id, booking.seat_number);
        let occupied = seat_occupied(
            &self.repos,
            self.events.as_ref(),
            self.hold_expiry,
            &target_seat,
            Some(booking.id),
        )
        .await?;
        if occupied {
            return Err(unavailable);
        }

        let moved = match self.repos.bookings.move_booking(booking_id, current.id, target.id).await {
            Ok(Some(moved)) => moved,
            Ok(None) => return Err(self.stale(booking_id, "rescheduled").await),
            Err(StoreError::Conflict(reason)) => {
                warn!(booking_id, "Reschedule rejected by store: {}", reason);
                return Err(unavailable);
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            booking_id,
            "Rescheduled seat {} from schedule {} to {}",
            moved.seat_number, current.id, target.id
        );
        release_seat(self.locks.as_ref(), &SeatKey::new(current.id, booking.seat_number)).await;
        publish_event(
            self.events.as_ref(),
            booking_event(BookingEventKind::BookingRescheduled, &moved).with_previous_schedule(current.id),
        )
        .await;
        Ok(moved)
    }

    async fn transition(
        &self,
        booking_id: i64,
        from: &[BookingStatus],
        to: BookingStatus,
        action: &'static str,
    ) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;
        ensure_status(&booking, from, action)?;

        match self.repos.bookings.transition_status(booking_id, from, to).await? {
            Some(updated) => Ok(updated),
            None => Err(self.stale(booking_id, action).await),
        }
    }

    async fn load(&self, booking_id: i64) -> Result<Booking, BookingError> {
        self.repos
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    /// The booking changed between our read and our write; report whatever it
    /// became.
    async fn stale(&self, booking_id: i64, action: &'static str) -> BookingError {
        match self.load(booking_id).await {
            Ok(booking) => BookingError::InvalidState { booking_id, status: booking.status, action },
            Err(e) => e,
        }
    }

    async fn release(&self, booking: &Booking) {
        release_seat(self.locks.as_ref(), &SeatKey::new(booking.schedule_id, booking.seat_number)).await;
    }

    async fn publish(&self, kind: BookingEventKind, booking: &Booking) {
        publish_event(self.events.as_ref(), booking_event(kind, booking)).await;
    }
}

fn ensure_status(
    booking: &Booking,
    allowed: &[BookingStatus],
    action: &'static str,
) -> Result<(), BookingError> {
    if allowed.contains(&booking.status) {
        Ok(())
    } else {
        Err(BookingError::InvalidState {
            booking_id: booking.id,
            status: booking.status,
            action,
        })
    }
}
