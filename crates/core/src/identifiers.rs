//! Identifiers for key types.
//! 
//! These are simple newtype wrappers over Strings whose main purpose is to keep 
//! the different kinds of keys from being mixed up, and to let us implement Traits 
//! that will not 'leak' into the underlying, wrapped type.
//! 
//! All identifiers are cheap to convert into a `&str` and can be used to look up 
//! map entries keyed by them with a plain `&str` (via `Borrow<str>`).

use core::borrow::Borrow;

use bevy::reflect::Reflect;

#[cfg(feature = "actionset_loader")]
use serde::{Serialize, Deserialize};


macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Reflect, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
        #[cfg_attr(feature = "actionset_loader", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "actionset_loader", serde(transparent))]
        pub struct $name(String);

        impl $name {
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl<IS: Into<String>> From<IS> for $name {
            fn from(value: IS) -> Self {
                Self::from_string(value.into())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.borrow()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_identifier!(
    /// Stable identity of a UtilityAction within one agent's catalogue. 
    /// 
    /// Used for diagnostics and for the "is this the same action as last cycle" check.
    ActionKey
);

string_identifier!(
    /// Name of a response curve in the `UtilityCurveRegistry`.
    CurveIdentifier
);

string_identifier!(
    /// Name of an Operator factory in the `OperatorRegistry`.
    OperatorKey
);

string_identifier!(
    /// Name of a world-state entry in the `StateRegistry` / Blackboard.
    StateKeyName
);


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GanglionKvMap;

    #[test]
    fn identifiers_lookup_by_str() {
        let mut map: GanglionKvMap<ActionKey, u8> = GanglionKvMap::default();
        map.insert(ActionKey::from("Flee"), 3);
        assert_eq!(map.get("Flee"), Some(&3));
        assert_eq!(ActionKey::from("Flee").to_string(), "Flee");
    }
}
