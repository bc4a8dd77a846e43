use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, Histogram, HistogramVec,
    IntCounter,
};

pub struct DispatchMetrics {
    pub offers_created: IntCounter,
    pub offers_accepted: IntCounter,
    pub offers_declined: IntCounter,
    pub offers_expired: IntCounter,
    pub bookings_confirmed: IntCounter,
    pub bookings_unfulfilled: IntCounter,
    pub bookings_cancelled: IntCounter,
    pub fallback_activations: IntCounter,
    pub candidate_pool_size: Histogram,
    /// Wall-clock duration of a single reconciliation sweep, in
    /// milliseconds, labeled by sweep name ("expire_stale_offers",
    /// "redispatch_drifted_bookings", "redispatch_scheduled_bookings",
    /// "refresh_notifications"). Observed once per sweep invocation in
    /// `dispatch_core::reconciliation`.
    pub sweep_duration: HistogramVec,
}

impl DispatchMetrics {
    fn new() -> Self {
        DispatchMetrics {
            offers_created: register_int_counter!(
                "dispatch_offers_created_total",
                "Number of offers created by the dispatcher"
            )
            .expect("register offers_created"),
            offers_accepted: register_int_counter!(
                "dispatch_offers_accepted_total",
                "Number of offers accepted by a provider"
            )
            .expect("register offers_accepted"),
            offers_declined: register_int_counter!(
                "dispatch_offers_declined_total",
                "Number of offers declined by a provider"
            )
            .expect("register offers_declined"),
            offers_expired: register_int_counter!(
                "dispatch_offers_expired_total",
                "Number of offers expired without a response"
            )
            .expect("register offers_expired"),
            bookings_confirmed: register_int_counter!(
                "dispatch_bookings_confirmed_total",
                "Number of bookings confirmed with a provider"
            )
            .expect("register bookings_confirmed"),
            bookings_unfulfilled: register_int_counter!(
                "dispatch_bookings_unfulfilled_total",
                "Number of dispatch passes that found zero eligible candidates"
            )
            .expect("register bookings_unfulfilled"),
            bookings_cancelled: register_int_counter!(
                "dispatch_bookings_cancelled_total",
                "Number of bookings cancelled"
            )
            .expect("register bookings_cancelled"),
            fallback_activations: register_int_counter!(
                "dispatch_fallback_activations_total",
                "Number of times the service-agnostic fallback candidate pool was used"
            )
            .expect("register fallback_activations"),
            candidate_pool_size: register_histogram!(
                "dispatch_candidate_pool_size",
                "Number of eligible candidates considered per dispatch pass"
            )
            .expect("register candidate_pool_size"),
            sweep_duration: register_histogram_vec!(
                "dispatch_reconciliation_sweep_duration_ms",
                "Reconciliation sweep duration in milliseconds, by sweep name",
                &["sweep"]
            )
            .expect("register sweep_duration"),
        }
    }
}

pub static DISPATCH_METRICS: Lazy<DispatchMetrics> = Lazy::new(DispatchMetrics::new);
