//! Shared domain types for the dispatch subsystem.
//!
//! These mirror the persisted tables described in spec section 3/6:
//! users/profiles are owned by the identity collaborator and are out of
//! scope here; everything below is dispatch-owned.

pub mod booking;
pub mod offer;
pub mod provider;
pub mod service;
pub mod status;

pub use booking::{generate_booking_number, Booking, NewBooking};
pub use offer::{Offer, ScoredCandidate};
pub use provider::{NewProvider, Provider, ProviderUpdate};
pub use service::{Service, ServiceCategory};
pub use status::{BookingStatus, OfferStatus};
