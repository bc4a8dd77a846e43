use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("booking not found: {0}")]
    BookingNotFound(uuid::Uuid),

    #[error("provider not found: {0}")]
    ProviderNotFound(uuid::Uuid),

    #[error("offer not found: {0}")]
    OfferNotFound(uuid::Uuid),

    #[error("service not found: {0}")]
    ServiceNotFound(uuid::Uuid),

    #[error("no provider profile for user {0}")]
    NoProviderForUser(uuid::Uuid),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
