//! Type aliases and 'abstracting' newtypes.

pub use crate::thread_safe_wrapper::ThreadSafeRef;
pub use crate::identifiers::{ActionKey, CurveIdentifier, OperatorKey, StateKeyName};

pub type ActionScore = f32;

pub const MIN_CONSIDERATION_SCORE: ActionScore = 0.;
pub const MAX_CONSIDERATION_SCORE: ActionScore = 1.;

/// Seconds elapsed since the previous tick.
pub type DeltaTime = f32;

/// The key-value map used throughout the library. 
/// 
/// Bevy's platform map, so we get a fast fixed hasher for free.
pub type GanglionKvMap<K, V> = bevy::platform::collections::HashMap<K, V>;

pub type UtilityCurveKey = String;

/// Monotonic counter of Blackboard decision cycles.
pub type BlackboardGeneration = u64;
