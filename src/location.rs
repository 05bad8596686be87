use serde::{Deserialize, Serialize};
use std::fmt;

/// Root under which every location partition lives in the store
pub const PARTITION_ROOT: &str = "tweets";

/// Partition identifier derived from an address's administrative area
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationKey(String);

impl LocationKey {
    pub const UNKNOWN: &'static str = "unknown";

    /// Build a key from an optional administrative area (state, province, ...)
    pub fn from_admin_area(admin_area: Option<&str>) -> Self {
        match admin_area.map(str::trim) {
            Some(area) if !area.is_empty() => Self(sanitize(area)),
            _ => Self(Self::UNKNOWN.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store path of this key's partition, e.g. `tweets/Texas`
    pub fn partition_path(&self) -> String {
        format!("{}/{}", PARTITION_ROOT, self.0)
    }

    /// Inverse of [`partition_path`](Self::partition_path)
    pub fn from_partition_path(path: &str) -> Option<Self> {
        let rest = path.trim_matches('/').strip_prefix(PARTITION_ROOT)?;
        let key = rest.strip_prefix('/')?;
        if key.is_empty() || key.contains('/') || sanitize(key) != key {
            return None;
        }
        Some(Self(key.to_string()))
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Characters the store refuses inside a path segment
fn sanitize(area: &str) -> String {
    area.chars()
        .map(|c| match c {
            '.' | '$' | '#' | '[' | ']' | '/' => '_',
            c if c.is_ascii_control() => '_',
            c => c,
        })
        .collect()
}

/// A geocoded location handed from the location picker to the feed screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub address_line: String,
    pub admin_area: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ResolvedAddress {
    pub fn new(address_line: impl Into<String>, admin_area: Option<String>) -> Self {
        Self {
            address_line: address_line.into(),
            admin_area,
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn location_key(&self) -> LocationKey {
        LocationKey::from_admin_area(self.admin_area.as_deref())
    }

    /// Coordinates, when the address was resolved from a map point or GPS fix
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_admin_area_is_unknown() {
        assert_eq!(LocationKey::from_admin_area(None).as_str(), "unknown");
        assert_eq!(LocationKey::from_admin_area(Some("   ")).as_str(), "unknown");
    }

    #[test]
    fn test_admin_area_is_used_verbatim() {
        let key = LocationKey::from_admin_area(Some("Texas"));
        assert_eq!(key.as_str(), "Texas");
        assert_eq!(key.partition_path(), "tweets/Texas");
    }

    #[test]
    fn test_illegal_path_characters_are_replaced() {
        let key = LocationKey::from_admin_area(Some("St. John's/North"));
        assert_eq!(key.as_str(), "St_ John's_North");
    }

    #[test]
    fn test_partition_path_round_trip() {
        let key = LocationKey::from_admin_area(Some("New York"));
        let parsed = LocationKey::from_partition_path(&key.partition_path()).unwrap();
        assert_eq!(parsed, key);

        assert!(LocationKey::from_partition_path("users/Texas").is_none());
        assert!(LocationKey::from_partition_path("tweets/").is_none());
        assert!(LocationKey::from_partition_path("tweets/Texas/abc").is_none());
    }

    #[test]
    fn test_resolved_address_coordinates() {
        let address = ResolvedAddress::new("1 Main St", Some("Virginia".to_string()));
        assert!(address.coordinates().is_none());

        let address = address.with_coordinates(38.9, -77.0);
        assert_eq!(address.coordinates(), Some((38.9, -77.0)));
        assert_eq!(address.location_key().as_str(), "Virginia");
    }
}
