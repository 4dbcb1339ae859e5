use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use vanbook_core::repository::{BookingRepository, StoreError, StoreResult};
use vanbook_core::{Booking, BookingStatus, NewBooking, Waypoint};
use vanbook_shared::Masked;

use crate::map_db_error;

const BOOKING_COLUMNS: &str = "id, user_id, schedule_id, seat_number, status, total_price, \
    pickup_name, pickup_lat, pickup_lng, dropoff_name, dropoff_lat, dropoff_lng, \
    contact_phone, remark, slip_image_ref, transaction_ref, created_at, updated_at";

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    user_id: Option<i64>,
    schedule_id: i64,
    seat_number: i32,
    status: String,
    total_price: i32,
    pickup_name: String,
    pickup_lat: Option<f64>,
    pickup_lng: Option<f64>,
    dropoff_name: Option<String>,
    dropoff_lat: Option<f64>,
    dropoff_lng: Option<f64>,
    contact_phone: Option<String>,
    remark: Option<String>,
    slip_image_ref: Option<String>,
    transaction_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let dropoff = row.dropoff_name.map(|name| Waypoint {
            name,
            lat: row.dropoff_lat,
            lng: row.dropoff_lng,
        });

        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            schedule_id: row.schedule_id,
            seat_number: row.seat_number,
            status: row.status.parse::<BookingStatus>().map_err(StoreError::backend)?,
            total_price: row.total_price,
            pickup: Waypoint {
                name: row.pickup_name,
                lat: row.pickup_lat,
                lng: row.pickup_lng,
            },
            dropoff,
            contact_phone: row.contact_phone.map(Masked::new),
            remark: row.remark,
            slip_image_ref: row.slip_image_ref,
            transaction_ref: row.transaction_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn status_names(statuses: &[BookingStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

impl PgBookingRepository {
    async fn fetch_many(&self, sql: &str, id: i64) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(&self, booking: &NewBooking) -> StoreResult<Booking> {
        let dropoff = booking.dropoff.as_ref();

        // uq_bookings_active_seat turns a double booking into a unique violation.
        let row: BookingRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO bookings (user_id, schedule_id, seat_number, status, total_price,
                pickup_name, pickup_lat, pickup_lng, dropoff_name, dropoff_lat, dropoff_lng,
                contact_phone, remark)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking.user_id)
        .bind(booking.schedule_id)
        .bind(booking.seat_number)
        .bind(BookingStatus::Pending.as_str())
        .bind(booking.total_price)
        .bind(&booking.pickup.name)
        .bind(booking.pickup.lat)
        .bind(booking.pickup.lng)
        .bind(dropoff.map(|d| d.name.clone()))
        .bind(dropoff.and_then(|d| d.lat))
        .bind(dropoff.and_then(|d| d.lng))
        .bind(booking.contact_phone.as_ref().map(|p| p.expose().clone()))
        .bind(&booking.remark)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Booking::try_from(row)
    }

    async fn get_booking(&self, id: i64) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_schedule_bookings(&self, schedule_id: i64) -> StoreResult<Vec<Booking>> {
        self.fetch_many(
            &format!("SELECT {} FROM bookings WHERE schedule_id = $1 ORDER BY id", BOOKING_COLUMNS),
            schedule_id,
        )
        .await
    }

    async fn list_user_bookings(&self, user_id: i64) -> StoreResult<Vec<Booking>> {
        self.fetch_many(
            &format!("SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC", BOOKING_COLUMNS),
            user_id,
        )
        .await
    }

    async fn transition_status(
        &self,
        id: i64,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = ANY($3) RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(to.as_str())
        .bind(id)
        .bind(status_names(from))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn confirm_payment(
        &self,
        id: i64,
        slip_image_ref: &str,
        transaction_ref: &str,
    ) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings SET status = $1, slip_image_ref = $2, transaction_ref = $3, updated_at = NOW() \
             WHERE id = $4 AND status = $5 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(BookingStatus::Confirmed.as_str())
        .bind(slip_image_ref)
        .bind(transaction_ref)
        .bind(id)
        .bind(BookingStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn move_booking(
        &self,
        id: i64,
        from_schedule_id: i64,
        to_schedule_id: i64,
    ) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings SET schedule_id = $1, updated_at = NOW() \
             WHERE id = $2 AND schedule_id = $3 AND status = ANY($4) RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(to_schedule_id)
        .bind(id)
        .bind(from_schedule_id)
        .bind(status_names(&BookingStatus::ACTIVE))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Booking::try_from).transpose()
    }
}
