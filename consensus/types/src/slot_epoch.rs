//! The `Slot` and `Epoch` types are defined as new types over u64 to enforce type-safety between
//! the two types.
//!
//! `Slot` and `Epoch` have implementations which permit conversion, comparison and math operations
//! between each and `u64`, however specifically not between each other.
//!
//! All math operations on `Slot` and `Epoch` are saturating, they never wrap.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(#[serde(with = "serde_utils::quoted_u64")] u64);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(#[serde(with = "serde_utils::quoted_u64")] u64);

impl_common!(Slot);
impl_common!(Epoch);

impl Slot {
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch::new(self.0.checked_div(slots_per_epoch).unwrap_or(0))
    }
}

impl Epoch {
    /// The first slot in the epoch.
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::from(self.0.saturating_mul(slots_per_epoch))
    }

    /// The last slot in the epoch.
    pub fn end_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::from(
            self.0
                .saturating_mul(slots_per_epoch)
                .saturating_add(slots_per_epoch.saturating_sub(1)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_to_epoch() {
        assert_eq!(Slot::new(0).epoch(32), Epoch::new(0));
        assert_eq!(Slot::new(31).epoch(32), Epoch::new(0));
        assert_eq!(Slot::new(32).epoch(32), Epoch::new(1));
        assert_eq!(Slot::new(100).epoch(0), Epoch::new(0));
    }

    #[test]
    fn epoch_slots() {
        assert_eq!(Epoch::new(2).start_slot(8), Slot::new(16));
        assert_eq!(Epoch::new(2).end_slot(8), Slot::new(23));
        assert_eq!(Epoch::max_value().start_slot(32), Slot::max_value());
    }

    #[test]
    fn math_saturates() {
        assert_eq!(Slot::new(1) - 5, Slot::new(0));
        assert_eq!(Epoch::max_value() + 1, Epoch::max_value());
        assert_eq!(Epoch::new(10).saturating_sub(3u64), Epoch::new(7));
        assert_eq!(Epoch::new(10) / 0, Epoch::new(0));
    }

    #[test]
    fn serde_is_quoted() {
        let json = serde_json::to_string(&Slot::new(42)).unwrap();
        assert_eq!(json, "\"42\"");
        assert_eq!(serde_json::from_str::<Epoch>("\"7\"").unwrap(), Epoch::new(7));
    }
}
