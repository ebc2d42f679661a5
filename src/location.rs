use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Decimal places kept in the grid fingerprint (~110 m cells).
pub const GRID_PRECISION: u32 = 3;

/// Derive the privacy-preserving grid key for a coordinate pair.
///
/// Each coordinate is scaled by `10^precision` and rounded half away from zero
/// (`f64::round`), then formatted with exactly `precision` decimals and joined
/// with `_`. Two sites that land in the same rounded cell share a key, so the
/// cache and location-based factors cannot tell them apart.
pub fn fingerprint(lat: f64, lng: f64, precision: u32) -> String {
    let decimals = precision as usize;
    format!(
        "{:.decimals$}_{:.decimals$}",
        round_to(lat, precision),
        round_to(lng, precision),
    )
}

fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    // Adding 0.0 folds -0.0 into 0.0 so "-0.000" never appears.
    (value * scale).round() / scale + 0.0
}

/// Great-circle distance between two points in meters (haversine).
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lng2 - lng1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] near antipodes.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// A site to be scored.
///
/// Immutable once built: the grid hash is derived at construction and the
/// fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LocationInput")]
pub struct Location {
    lat: f64,
    lng: f64,
    name: String,
    address: String,
    grid_hash: String,
}

/// Wire shape accepted when deserializing a location; the grid hash is always
/// recomputed rather than trusted from input.
#[derive(Deserialize)]
struct LocationInput {
    lat: f64,
    lng: f64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: String,
}

impl From<LocationInput> for Location {
    fn from(input: LocationInput) -> Self {
        Location::new(input.lat, input.lng)
            .with_name(input.name)
            .with_address(input.address)
    }
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            name: String::new(),
            address: String::new(),
            grid_hash: fingerprint(lat, lng, GRID_PRECISION),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn grid_hash(&self) -> &str {
        &self.grid_hash
    }

    pub fn distance_to(&self, other: &Location) -> f64 {
        haversine_m(self.lat, self.lng, other.lat, other.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_format() {
        assert_eq!(fingerprint(40.666, -111.897, 3), "40.666_-111.897");
        assert_eq!(fingerprint(40.7, -111.0, 3), "40.700_-111.000");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let first = fingerprint(40.760812, -111.891047, 3);
        for _ in 0..10 {
            assert_eq!(fingerprint(40.760812, -111.891047, 3), first);
        }
    }

    #[test]
    fn test_same_cell_collides() {
        // Both round to 40.761 / -111.891
        let a = Location::new(40.7608, -111.8908);
        let b = Location::new(40.76104, -111.89124);
        assert_eq!(a.grid_hash(), b.grid_hash());

        let c = Location::new(40.7620, -111.8908);
        assert_ne!(a.grid_hash(), c.grid_hash());
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        // 0.0625 and -0.0625 are exact in binary, so the tie is real.
        assert_eq!(fingerprint(0.0625, -0.0625, 3), "0.063_-0.063");
    }

    #[test]
    fn test_negative_zero_normalized() {
        assert_eq!(fingerprint(-0.0001, -0.0004, 3), "0.000_0.000");
    }

    #[test]
    fn test_custom_precision() {
        assert_eq!(fingerprint(40.76089, -111.89104, 2), "40.76_-111.89");
    }

    #[test]
    fn test_distance_coincident_is_zero() {
        let a = Location::new(40.666, -111.897);
        assert_eq!(a.distance_to(&a.clone()), 0.0);
    }

    #[test]
    fn test_distance_antipodal_is_half_circumference() {
        let d = haversine_m(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1e-6);

        let poles = haversine_m(90.0, 0.0, -90.0, 0.0);
        assert!(poles.is_finite());
        assert!((poles - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1e-3);
    }

    #[test]
    fn test_distance_known_pair() {
        // Salt Lake City to Murray, roughly 12.8 km
        let slc = Location::new(40.7608, -111.8910);
        let murray = Location::new(40.6461, -111.8939);
        let d = slc.distance_to(&murray);
        assert!(d > 12_000.0 && d < 13_500.0, "distance was {}", d);
    }

    #[test]
    fn test_deserialize_recomputes_grid_hash() {
        let json = r#"{"lat": 40.7608, "lng": -111.891, "name": "Home", "grid_hash": "bogus"}"#;
        let location: Location = serde_json::from_str(json).unwrap();
        assert_eq!(location.grid_hash(), "40.761_-111.891");
        assert_eq!(location.name(), "Home");
    }
}
