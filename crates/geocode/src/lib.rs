//! Address-to-coordinate resolution. The dispatcher needs latitude/longitude
//! for distance scoring; where a booking or provider was created without
//! them, this fills the gap. A single-method `Send + Sync` capability
//! interface, same shape as `dispatch_storage::Store`, so it can be swapped
//! for a deterministic fake in tests.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
pub trait GeocodingAdapter: Send + Sync {
    /// Resolves a free-form address to coordinates. Returns `None` rather
    /// than an error when the address can't be resolved — callers treat a
    /// missing geocode as "no distance bonus", not a failure.
    async fn resolve(&self, address: &str) -> Option<Coordinates>;
}

/// Always returns `None`. Used when no geocoding provider is configured;
/// the fallback rule in `dispatch-core` handles the resulting gap.
pub struct NullGeocoder;

#[async_trait]
impl GeocodingAdapter for NullGeocoder {
    async fn resolve(&self, address: &str) -> Option<Coordinates> {
        tracing::debug!(address, "no geocoding provider configured, returning null coordinates");
        None
    }
}

/// Deterministic stand-in for tests: resolves any address containing a
/// known substring to a fixed coordinate pair.
#[derive(Default)]
pub struct FakeGeocoder {
    entries: std::collections::HashMap<String, Coordinates>,
}

impl FakeGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, needle: impl Into<String>, lat: f64, lon: f64) -> Self {
        self.entries.insert(
            needle.into(),
            Coordinates {
                latitude: lat,
                longitude: lon,
            },
        );
        self
    }
}

#[async_trait]
impl GeocodingAdapter for FakeGeocoder {
    async fn resolve(&self, address: &str) -> Option<Coordinates> {
        self.entries
            .iter()
            .find(|(needle, _)| address.contains(needle.as_str()))
            .map(|(_, coords)| *coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_geocoder_never_resolves() {
        let geocoder = NullGeocoder;
        assert_eq!(geocoder.resolve("221B Baker Street").await, None);
    }

    #[tokio::test]
    async fn fake_geocoder_matches_on_substring() {
        let geocoder = FakeGeocoder::new().with("Baker Street", 51.5237, -0.1585);
        let resolved = geocoder.resolve("221B Baker Street, London").await;
        assert_eq!(
            resolved,
            Some(Coordinates {
                latitude: 51.5237,
                longitude: -0.1585
            })
        );
        assert_eq!(geocoder.resolve("Unknown Ave").await, None);
    }
}
