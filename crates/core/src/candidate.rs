//! C1: candidate selection. Eligibility filter (with fallback) plus a pure
//! scoring function, batched against the store in two queries rather than
//! one round trip per provider.

use dispatch_storage::Store;
use dispatch_types::{Booking, Provider, ScoredCandidate};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::error::Result;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two WGS-84 points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Scores a single already-eligible provider against a booking. Returns the
/// floored score and the distance used (if any coordinates were available).
pub fn score_candidate(
    booking: &Booking,
    provider: &Provider,
    active_bookings: i64,
    config: &DispatchConfig,
) -> (f64, Option<f64>) {
    let mut score = 25.0; // base: provider is available at all

    score += match provider.rating {
        Some(rating) => 4.0 * rating,
        None => 12.0,
    };

    score += 30.0; // service-match bonus, uniform for filtered survivors

    let distance_km = match (booking.latitude, booking.longitude, provider.latitude, provider.longitude) {
        (Some(blat), Some(blon), Some(plat), Some(plon)) => {
            let d = haversine_km(blat, blon, plat, plon);
            score += (config.max_distance_bonus_km - d).max(0.0);
            Some(d)
        }
        (Some(_), Some(_), None, None) | (Some(_), Some(_), _, None) | (Some(_), Some(_), None, _) => {
            if config.award_full_distance_bonus_when_provider_location_missing {
                score += config.max_distance_bonus_km;
            }
            None
        }
        _ => None,
    };

    if let (Some(bp), Some(pp)) = (&booking.pincode, &provider.pincode) {
        if !bp.is_empty() && bp == pp {
            score += 10.0;
        }
    }

    score -= (2.0 * active_bookings as f64).min(15.0);

    if let Some(years) = provider.experience_years {
        score += (years as f64).min(10.0);
    }

    (score.max(0.0), distance_km)
}

/// C1's eligibility filter plus scoring, batched: one query for eligible
/// providers (falling back to all available providers if the linked set is
/// empty), one query for active-booking counts across the whole candidate
/// set.
pub async fn rank_candidates(
    store: &dyn Store,
    booking: &Booking,
    config: &DispatchConfig,
) -> Result<Vec<ScoredCandidate>> {
    let mut providers = store.providers_linked_to_service(booking.service_id).await?;

    if providers.is_empty() {
        let available = store.available_providers().await?;
        if !available.is_empty() {
            tracing::warn!(
                booking_id = %booking.id,
                service_id = %booking.service_id,
                "no providers linked to service, falling back to all available providers"
            );
            dispatch_metrics::DISPATCH_METRICS.fallback_activations.inc();
            providers = available;
        }
    }

    if providers.is_empty() {
        return Ok(Vec::new());
    }

    let provider_ids: Vec<Uuid> = providers.iter().map(|p| p.id).collect();
    let active_counts = store.active_booking_counts(&provider_ids).await?;

    let mut scored: Vec<ScoredCandidate> = providers
        .iter()
        .map(|provider| {
            let active = active_counts.get(&provider.id).copied().unwrap_or(0);
            let (score, distance_km) = score_candidate(booking, provider, active, config);
            ScoredCandidate {
                provider_id: provider.id,
                score,
                distance_km,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.provider_id.cmp(&b.provider_id))
    });

    dispatch_metrics::DISPATCH_METRICS
        .candidate_pool_size
        .observe(scored.len() as f64);

    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn provider(lat: Option<f64>, lon: Option<f64>, rating: Option<f64>) -> Provider {
        Provider {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            business_name: "Acme".to_string(),
            latitude: lat,
            longitude: lon,
            pincode: None,
            rating,
            experience_years: None,
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn booking(lat: Option<f64>, lon: Option<f64>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            booking_number: "BK-TEST0001".to_string(),
            user_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            service_date: Utc::now().date_naive(),
            service_time: "09:00".to_string(),
            location: "somewhere".to_string(),
            latitude: lat,
            longitude: lon,
            pincode: None,
            special_instructions: None,
            estimated_price: None,
            final_price: None,
            rating: None,
            review: None,
            status: dispatch_types::BookingStatus::Pending,
            provider_id: None,
            provider_distance: None,
            estimated_arrival: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn haversine_zero_distance_for_identical_points() {
        assert!(haversine_km(12.9716, 77.5946, 12.9716, 77.5946) < 1e-6);
    }

    #[test]
    fn same_coordinates_score_full_distance_bonus() {
        let config = DispatchConfig::default();
        let b = booking(Some(12.9716), Some(77.5946));
        let p = provider(Some(12.9716), Some(77.5946), Some(4.5));
        let (score, distance) = score_candidate(&b, &p, 0, &config);
        // 25 base + 18 rating + 30 match + 20 distance = 93
        assert!((score - 93.0).abs() < 1e-6, "got {score}");
        assert!(distance.unwrap() < 1e-6);
    }

    #[test]
    fn missing_provider_coordinates_awards_full_bonus_by_default() {
        let config = DispatchConfig::default();
        let b = booking(Some(12.9716), Some(77.5946));
        let p = provider(None, None, None);
        let (score, distance) = score_candidate(&b, &p, 0, &config);
        // 25 base + 12 default rating + 30 match + 20 distance = 87
        assert!((score - 87.0).abs() < 1e-6, "got {score}");
        assert!(distance.is_none());
    }

    #[test]
    fn missing_provider_coordinates_awards_nothing_when_flag_disabled() {
        let mut config = DispatchConfig::default();
        config.award_full_distance_bonus_when_provider_location_missing = false;
        let b = booking(Some(12.9716), Some(77.5946));
        let p = provider(None, None, None);
        let (score, _) = score_candidate(&b, &p, 0, &config);
        // 25 base + 12 default rating + 30 match = 67
        assert!((score - 67.0).abs() < 1e-6, "got {score}");
    }

    #[test]
    fn workload_penalty_floors_at_zero() {
        let config = DispatchConfig::default();
        let b = booking(None, None);
        let p = provider(None, None, None);
        let (score, _) = score_candidate(&b, &p, 100, &config);
        assert_eq!(score, 0.0);
    }
}
