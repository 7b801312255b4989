//! # Request Domain Enumerations
//!
//! The kinds of request the engine fulfils, the vehicle classes that price
//! them, payment methods, and the places a request moves between.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What the requester is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// A ride booking: a driver carries the requester.
    Ride,
    /// A restaurant order delivered to the requester.
    Food,
    /// A grocery order delivered to the requester.
    Grocery,
    /// A pharmacy order delivered to the requester.
    Pharmacy,
}

impl RequestType {
    /// All request types.
    pub const ALL: [RequestType; 4] = [Self::Ride, Self::Food, Self::Grocery, Self::Pharmacy];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ride => "ride",
            Self::Food => "food",
            Self::Grocery => "grocery",
            Self::Pharmacy => "pharmacy",
        }
    }

    /// Whether the request is an order (delivered goods) rather than a ride.
    pub fn is_order(&self) -> bool {
        !matches!(self, Self::Ride)
    }
}

impl FromStr for RequestType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ride" => Ok(Self::Ride),
            "food" => Ok(Self::Food),
            "grocery" => Ok(Self::Grocery),
            "pharmacy" => Ok(Self::Pharmacy),
            _ => Err(ValidationError::UnknownVariant {
                kind: "request type",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vehicle or service class used to select a tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    /// Two-wheeler; also the default courier class for deliveries.
    Motorcycle,
    /// Four-seat car.
    Car,
    /// Six-seat SUV.
    Suv,
}

impl VehicleClass {
    /// All vehicle classes.
    pub const ALL: [VehicleClass; 3] = [Self::Motorcycle, Self::Car, Self::Suv];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motorcycle => "motorcycle",
            Self::Car => "car",
            Self::Suv => "suv",
        }
    }
}

impl FromStr for VehicleClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "motorcycle" => Ok(Self::Motorcycle),
            "car" => Ok(Self::Car),
            "suv" => Ok(Self::Suv),
            _ => Err(ValidationError::UnknownVariant {
                kind: "vehicle class",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method declared at request time. Settlement is external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid to the fulfiller on completion.
    Cash,
    /// Charged to a stored card.
    Card,
    /// Debited from an in-app wallet.
    Wallet,
}

/// A pickup or drop-off point.
///
/// Coordinates are optional because order pickups are often a merchant
/// reference resolved by the geo provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Human-readable address or landmark.
    pub address: String,
    /// WGS84 latitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// WGS84 longitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Place {
    /// A place known only by its address.
    pub fn address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            latitude: None,
            longitude: None,
        }
    }

    /// Reject empty addresses and out-of-range coordinates.
    pub fn validate(&self, field: &'static str) -> Result<(), ValidationError> {
        if self.address.trim().is_empty() {
            return Err(ValidationError::Missing(field));
        }
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ValidationError::Invalid(format!(
                    "{field} latitude {lat} is out of range"
                )));
            }
        }
        if let Some(lng) = self.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                return Err(ValidationError::Invalid(format!(
                    "{field} longitude {lng} is out of range"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_type_parses_case_insensitively() {
        assert_eq!("Food".parse::<RequestType>().unwrap(), RequestType::Food);
        assert!("laundry".parse::<RequestType>().is_err());
    }

    #[test]
    fn only_rides_are_not_orders() {
        assert!(!RequestType::Ride.is_order());
        assert!(RequestType::Food.is_order());
        assert!(RequestType::Grocery.is_order());
        assert!(RequestType::Pharmacy.is_order());
    }

    #[test]
    fn vehicle_class_round_trips_through_names() {
        for class in VehicleClass::ALL {
            assert_eq!(class.as_str().parse::<VehicleClass>().unwrap(), class);
        }
    }

    #[test]
    fn place_validation() {
        assert!(Place::address("SM North EDSA").validate("pickup").is_ok());
        assert!(Place::address("  ").validate("pickup").is_err());
        let bad = Place {
            address: "Nowhere".into(),
            latitude: Some(123.0),
            longitude: None,
        };
        assert!(bad.validate("dropoff").is_err());
    }
}
