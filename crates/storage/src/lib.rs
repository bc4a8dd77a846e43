pub mod error;
pub mod mock;
pub mod outcomes;
pub mod pg;
pub mod store;

pub use error::{Result, StorageError};
pub use mock::MockStore;
pub use outcomes::{AcceptOutcome, DeclineOutcome, DispatchOutcome, OfferActionError};
pub use pg::PgStore;
pub use store::{AdminCounters, Store};
