use dispatch_types::Booking;
use uuid::Uuid;

/// Result of [`Store::accept_offer`]. These are expected business outcomes,
/// not exceptions — spec section 7 classifies "offer already accepted" /
/// "booking already assigned" / "wrong owner" / "offer expired" as state
/// conflicts that must be surfaced to the caller, never thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferActionError {
    OfferNotFound,
    NotOwner,
    NotPending,
    Expired,
    BookingNotFound,
    BookingAlreadyAssigned,
}

impl OfferActionError {
    pub fn message(&self) -> &'static str {
        match self {
            OfferActionError::OfferNotFound => "offer not found",
            OfferActionError::NotOwner => "offer does not belong to this provider",
            OfferActionError::NotPending => "offer is no longer pending",
            OfferActionError::Expired => "offer has expired",
            OfferActionError::BookingNotFound => "booking not found",
            OfferActionError::BookingAlreadyAssigned => {
                "booking already assigned to another provider"
            }
        }
    }
}

pub type AcceptOutcome = Result<Booking, OfferActionError>;
pub type DeclineOutcome = Result<(), OfferActionError>;

/// Result of [`Store::dispatch_offers`].
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// A pending offer already existed; dispatch was a no-op (I1).
    AlreadyPending,
    /// No eligible candidates; booking set to `pending`.
    NoCandidates,
    /// Offers created for the returned provider ids.
    Dispatched { provider_ids: Vec<Uuid> },
}
