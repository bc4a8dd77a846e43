//! The dispatch core: candidate scoring (C1), offer dispatch (C2),
//! accept/decline arbitration (C3), reconciliation sweeps (C4), and the
//! booking state machine (C5).

pub mod arbitration;
pub mod candidate;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod reconciliation;
pub mod state_machine;

pub use arbitration::ArbitrationEngine;
pub use candidate::{haversine_km, rank_candidates, score_candidate};
pub use config::DispatchConfig;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, Result};
pub use reconciliation::ReconciliationLoop;
pub use state_machine::StateMachine;

#[cfg(test)]
mod property_tests;
