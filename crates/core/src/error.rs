use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Storage(#[from] dispatch_storage::StorageError),

    #[error("invalid state transition: booking {booking_id} cannot move from {from} to {to}")]
    InvalidTransition {
        booking_id: uuid::Uuid,
        from: dispatch_types::BookingStatus,
        to: dispatch_types::BookingStatus,
    },

    #[error("rating can only be submitted for a completed booking, booking {0} is not completed")]
    BookingNotCompleted(uuid::Uuid),

    #[error("rating must be between 1.0 and 5.0, got {0}")]
    InvalidRating(f64),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
