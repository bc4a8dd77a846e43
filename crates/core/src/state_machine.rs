//! C5: booking status transitions and the invariants that span C1-C4.
//! Pure validation lives here; persistence is delegated back to the store.

use std::sync::Arc;

use dispatch_storage::Store;
use dispatch_types::{Booking, BookingStatus};
use uuid::Uuid;

use crate::error::{DispatchError, Result};

/// Returns `Ok(())` if `from -> to` is a legal manual transition (i.e. one
/// triggered by an owner/admin status update rather than by C2/C3/C4
/// themselves, which drive their own transitions directly through the
/// store).
pub fn validate_transition(booking_id: Uuid, from: BookingStatus, to: BookingStatus) -> Result<()> {
    use BookingStatus::*;
    let legal = matches!(
        (from, to),
        (Pending, Cancelled)
            | (AwaitingProvider, Cancelled)
            | (Confirmed, InProgress)
            | (Confirmed, Cancelled)
            | (InProgress, Completed)
            | (InProgress, Cancelled)
    );
    if legal {
        Ok(())
    } else {
        Err(DispatchError::InvalidTransition { booking_id, from, to })
    }
}

pub struct StateMachine {
    store: Arc<dyn Store>,
}

impl StateMachine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Owner/admin-initiated status update, constrained by
    /// [`validate_transition`]. Cancellation cascades to declining any
    /// pending offers, handled inside `Store::cancel_booking`.
    pub async fn transition(&self, booking_id: Uuid, to: BookingStatus) -> Result<Booking> {
        let current = self.store.get_booking(booking_id).await?;
        validate_transition(booking_id, current.status, to)?;

        let updated = if to == BookingStatus::Cancelled {
            dispatch_metrics::DISPATCH_METRICS.bookings_cancelled.inc();
            self.store.cancel_booking(booking_id).await?
        } else {
            self.store.update_booking_status(booking_id, to).await?
        };

        Ok(updated)
    }

    /// Customer-initiated cancellation; always legal outside terminal
    /// states, a special case of [`transition`] kept separate because it
    /// never takes an explicit `to`.
    pub async fn cancel(&self, booking_id: Uuid) -> Result<Booking> {
        let current = self.store.get_booking(booking_id).await?;
        if current.status.is_terminal() {
            return Err(DispatchError::InvalidTransition {
                booking_id,
                from: current.status,
                to: BookingStatus::Cancelled,
            });
        }
        dispatch_metrics::DISPATCH_METRICS.bookings_cancelled.inc();
        Ok(self.store.cancel_booking(booking_id).await?)
    }

    /// Rating is only accepted for a completed booking; the store
    /// atomically recomputes the provider's rolling average.
    pub async fn rate(&self, booking_id: Uuid, rating: f64, review: Option<String>) -> Result<()> {
        if !(1.0..=5.0).contains(&rating) {
            return Err(DispatchError::InvalidRating(rating));
        }
        let booking = self.store.get_booking(booking_id).await?;
        if booking.status != BookingStatus::Completed {
            return Err(DispatchError::BookingNotCompleted(booking_id));
        }
        self.store.rate_booking(booking_id, rating, review).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_to_cancelled_is_legal() {
        let id = Uuid::new_v4();
        assert!(validate_transition(id, BookingStatus::Pending, BookingStatus::Cancelled).is_ok());
    }

    #[test]
    fn completed_booking_cannot_transition_further() {
        let id = Uuid::new_v4();
        assert!(validate_transition(id, BookingStatus::Completed, BookingStatus::Cancelled).is_err());
    }

    #[test]
    fn awaiting_provider_cannot_jump_directly_to_in_progress() {
        let id = Uuid::new_v4();
        assert!(validate_transition(id, BookingStatus::AwaitingProvider, BookingStatus::InProgress).is_err());
    }

    #[test]
    fn confirmed_to_in_progress_to_completed_is_legal() {
        let id = Uuid::new_v4();
        assert!(validate_transition(id, BookingStatus::Confirmed, BookingStatus::InProgress).is_ok());
        assert!(validate_transition(id, BookingStatus::InProgress, BookingStatus::Completed).is_ok());
    }
}
