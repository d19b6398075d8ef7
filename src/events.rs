//! Best-effort NATS event publishing.
//!
//! The service runs fine without a broker; when `NATS_URL` is set, lifecycle
//! events are published as JSON so other services can subscribe.

pub const ORDER_PLACED: &str = "store.order.placed";
pub const ORDER_COMPLETED: &str = "store.order.completed";
pub const ORDER_CANCELLED: &str = "store.order.cancelled";
pub const COUPON_REDEEMED: &str = "store.coupon.redeemed";
pub const APPROVAL_SUBMITTED: &str = "store.approval.submitted";
pub const APPROVAL_RESOLVED: &str = "store.approval.resolved";

/// Publish an event, logging (not failing) on broker errors.
pub async fn publish(
    nats: &Option<async_nats::Client>,
    subject: &str,
    payload: serde_json::Value,
) {
    let Some(client) = nats else { return };
    let bytes = match serde_json::to_vec(&payload) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(subject, error = %e, "failed to serialize event");
            return;
        }
    };
    if let Err(e) = client.publish(subject.to_string(), bytes.into()).await {
        tracing::warn!(subject, error = %e, "failed to publish event");
    }
}
