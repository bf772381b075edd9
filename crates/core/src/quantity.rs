//! Quantity value objects.
//!
//! Quantities are whole units. Requests carry raw integers (they come straight
//! from operator input); domain logic validates them through [`Quantity`].

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::MaterialCode;

/// A strictly positive number of units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(units: i64) -> DomainResult<Self> {
        if units <= 0 {
            return Err(DomainError::invalid_quantity(format!(
                "quantity must be positive (got {units})"
            )));
        }
        Ok(Self(units))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Sum of two quantities, `None` when it does not fit.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Clamp to `limit`, returning `None` when nothing would remain.
    pub fn clamp_to(self, limit: i64) -> Option<Self> {
        let clamped = self.0.min(limit);
        (clamped > 0).then_some(Self(clamped))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let units: i64 = s
            .trim()
            .parse()
            .map_err(|_| DomainError::invalid_quantity(format!("not a whole number: {s:?}")))?;
        Self::new(units)
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One `(material, quantity)` pair of a movement selection or record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialQuantity {
    pub material: MaterialCode,
    pub quantity: i64,
}

impl MaterialQuantity {
    pub fn new(material: MaterialCode, quantity: i64) -> Self {
        Self { material, quantity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        assert!(matches!(Quantity::new(0), Err(DomainError::InvalidQuantity(_))));
        assert!(matches!(Quantity::new(-3), Err(DomainError::InvalidQuantity(_))));
    }

    #[test]
    fn unparseable_input_is_an_invalid_quantity() {
        let err = "tres".parse::<Quantity>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(msg) if msg.contains("tres")));
        assert_eq!(" 4 ".parse::<Quantity>().unwrap().get(), 4);
    }

    #[test]
    fn clamp_never_produces_zero() {
        let q = Quantity::new(10).unwrap();
        assert_eq!(q.clamp_to(2).map(Quantity::get), Some(2));
        assert_eq!(q.clamp_to(0), None);
    }

    #[test]
    fn checked_add_refuses_to_wrap() {
        let max = Quantity::new(i64::MAX).unwrap();
        let one = Quantity::new(1).unwrap();
        assert_eq!(max.checked_add(one), None);
        assert_eq!(one.checked_add(one).map(Quantity::get), Some(2));
    }

    #[test]
    fn deserializing_a_non_positive_quantity_fails() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("7").unwrap().get(), 7);
    }

    proptest! {
        #[test]
        fn clamp_stays_within_bounds(requested in 1i64..10_000, limit in -10i64..10_000) {
            let q = Quantity::new(requested).unwrap();
            match q.clamp_to(limit) {
                Some(c) => {
                    prop_assert!(c.get() >= 1);
                    prop_assert!(c.get() <= requested);
                    prop_assert!(c.get() <= limit);
                }
                None => prop_assert!(limit <= 0),
            }
        }
    }
}
