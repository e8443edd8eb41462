use ganglion_core::actionset::ActionSet;

/// A file format ActionSets can be deserialized from.
pub trait ActionSetLoaderBackend: bevy::reflect::TypePath + Send + Sync + 'static {
    type Error: core::error::Error + Send + Sync + 'static;

    fn from_slice(bytes: &[u8]) -> Result<ActionSet, Self::Error>;

    /// File extensions this backend claims by default.
    fn extensions() -> &'static [&'static str] {
        &[]
    }
}

#[cfg(any(feature = "json_support", test))]
pub mod json_support {
    use super::{ActionSet, ActionSetLoaderBackend};

    #[derive(Debug, Default, Clone, Copy, bevy::reflect::TypePath)]
    pub struct JsonActionSetLoader;

    impl ActionSetLoaderBackend for JsonActionSetLoader {
        type Error = serde_json::Error;

        fn from_slice(bytes: &[u8]) -> Result<ActionSet, Self::Error> {
            serde_json::from_slice(bytes)
        }

        fn extensions() -> &'static [&'static str] {
            &["actionset.json", "json"]
        }
    }
}

#[cfg(feature = "toml_support")]
pub mod toml_support {
    use super::{ActionSet, ActionSetLoaderBackend};

    #[derive(Debug, Default, Clone, Copy, bevy::reflect::TypePath)]
    pub struct TomlActionSetLoader;

    impl ActionSetLoaderBackend for TomlActionSetLoader {
        type Error = toml::de::Error;

        fn from_slice(bytes: &[u8]) -> Result<ActionSet, Self::Error> {
            toml::from_slice(bytes)
        }

        fn extensions() -> &'static [&'static str] {
            &["actionset.toml", "toml"]
        }
    }
}

#[cfg(feature = "msgpack_support")]
pub mod msgpack_support {
    use super::{ActionSet, ActionSetLoaderBackend};

    #[derive(Debug, Default, Clone, Copy, bevy::reflect::TypePath)]
    pub struct MsgpackActionSetLoader;

    impl ActionSetLoaderBackend for MsgpackActionSetLoader {
        type Error = rmp_serde::decode::Error;

        fn from_slice(bytes: &[u8]) -> Result<ActionSet, Self::Error> {
            rmp_serde::decode::from_slice(bytes)
        }

        fn extensions() -> &'static [&'static str] {
            &["msgpack"]
        }
    }
}

#[cfg(feature = "cbor_support")]
pub mod cbor_support {
    use super::{ActionSet, ActionSetLoaderBackend};

    #[derive(Debug, Default, Clone, Copy, bevy::reflect::TypePath)]
    pub struct CborActionSetLoader;

    impl ActionSetLoaderBackend for CborActionSetLoader {
        type Error = ciborium::de::Error<std::io::Error>;

        fn from_slice(bytes: &[u8]) -> Result<ActionSet, Self::Error> {
            ciborium::de::from_reader(bytes)
        }

        fn extensions() -> &'static [&'static str] {
            &["cbor"]
        }
    }
}

#[cfg(any(feature = "ron_support", test))]
pub mod ron_support {
    use super::{ActionSet, ActionSetLoaderBackend};

    #[derive(Debug, Default, Clone, Copy, bevy::reflect::TypePath)]
    pub struct RonActionSetLoader;

    impl ActionSetLoaderBackend for RonActionSetLoader {
        type Error = ron::de::SpannedError;

        fn from_slice(bytes: &[u8]) -> Result<ActionSet, Self::Error> {
            ron::de::from_bytes(bytes)
        }

        fn extensions() -> &'static [&'static str] {
            &["actionset.ron", "ron"]
        }
    }
}

#[cfg(any(feature = "yaml_support", test))]
pub mod yaml_support {
    use super::{ActionSet, ActionSetLoaderBackend};

    #[derive(Debug, Default, Clone, Copy, bevy::reflect::TypePath)]
    pub struct YamlActionSetLoader;

    impl ActionSetLoaderBackend for YamlActionSetLoader {
        type Error = serde_saphyr::Error;

        fn from_slice(bytes: &[u8]) -> Result<ActionSet, Self::Error> {
            serde_saphyr::from_slice(bytes)
        }

        fn extensions() -> &'static [&'static str] {
            &["actionset.yaml", "yaml", "yml"]
        }
    }
}

/// Postcard is not self-describing, so Operator params (which are untagged) cannot round-trip through it.
/// Only plans without params load from postcard files.
#[cfg(feature = "postcard_support")]
pub mod postcard_support {
    use super::{ActionSet, ActionSetLoaderBackend};

    #[derive(Debug, Default, Clone, Copy, bevy::reflect::TypePath)]
    pub struct PostcardActionSetLoader;

    impl ActionSetLoaderBackend for PostcardActionSetLoader {
        type Error = postcard::Error;

        fn from_slice(bytes: &[u8]) -> Result<ActionSet, Self::Error> {
            postcard::from_bytes(bytes)
        }

        fn extensions() -> &'static [&'static str] {
            &["postcard"]
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::json_support::JsonActionSetLoader;
    use super::ron_support::RonActionSetLoader;
    use super::yaml_support::YamlActionSetLoader;

    use ganglion_core::actionset::CurveTemplate;

    fn check_guard(set: &ActionSet) {
        assert_eq!(set.name, "Guard");
        assert_eq!(set.actions.len(), 2);

        let patrol = &set.actions[0];
        assert_eq!(patrol.key.as_str(), "Patrol");
        assert_eq!(patrol.considerations[0].curve, CurveTemplate::AntiLinear);
        assert_eq!(patrol.plan[0].params.number("seconds"), Ok(3.0));

        let fight = &set.actions[1];
        assert_eq!(fight.bonus, 2.0);
        assert!(!fight.can_override);
        assert_eq!(fight.considerations[0].curve, CurveTemplate::preset("Aggression"));
    }

    #[test]
    fn loads_json() {
        let raw = br#"{
            "name": "Guard",
            "actions": [
                {
                    "key": "Patrol",
                    "considerations": [{"state": "Alertness", "curve": "AntiLinear"}],
                    "plan": [{"operator": "Wait", "params": {"seconds": 3.0}}]
                },
                {
                    "key": "Fight",
                    "bonus": 2.0,
                    "can_override": false,
                    "considerations": [{"state": "EnemyNear", "curve": {"Preset": {"name": "Aggression"}}}]
                }
            ]
        }"#;

        check_guard(&JsonActionSetLoader::from_slice(raw).unwrap());
    }

    #[test]
    fn loads_ron() {
        let raw = br#"(
            name: "Guard",
            actions: [
                (
                    key: "Patrol",
                    considerations: [(state: "Alertness", curve: AntiLinear)],
                    plan: [(operator: "Wait", params: {"seconds": 3.0})],
                ),
                (
                    key: "Fight",
                    bonus: 2.0,
                    can_override: false,
                    considerations: [(state: "EnemyNear", curve: Preset(name: "Aggression"))],
                ),
            ],
        )"#;

        check_guard(&RonActionSetLoader::from_slice(raw).unwrap());
    }

    #[test]
    fn loads_yaml() {
        let raw = br#"
name: Guard
actions:
  - key: Patrol
    considerations:
      - state: Alertness
        curve: AntiLinear
    plan:
      - operator: Wait
        params:
          seconds: 3.0
  - key: Fight
    bonus: 2.0
    can_override: false
    considerations:
      - state: EnemyNear
        curve:
          Preset:
            name: Aggression
"#;

        check_guard(&YamlActionSetLoader::from_slice(raw).unwrap());
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(JsonActionSetLoader::from_slice(br#"{"actions": []}"#).is_err());
        assert!(JsonActionSetLoader::from_slice(b"not json").is_err());
    }
}
