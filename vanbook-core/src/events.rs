use async_trait::async_trait;
use vanbook_shared::BookingEvent;

/// Outbound channel for booking lifecycle events (notifications, e-mail, reporting).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        event: &BookingEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Used when no broker is configured.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        event: &BookingEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!("Dropping booking event {:?} for booking {}", event.kind, event.booking_id);
        Ok(())
    }
}
