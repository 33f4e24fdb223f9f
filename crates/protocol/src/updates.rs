//! Partial state patch carried by `state_update` frames.
//!
//! The server only includes the keys that changed. A key missing from the patch
//! must leave the client's copy untouched, while an explicit `null` on a nullable
//! key clears it. Nullable keys are therefore modelled as `Option<Option<T>>`:
//! the outer `Option` is "present in the patch", the inner one is the value.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A partial update of the synchronized game state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdates {
    /// Live players, in seating order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eliminated_players: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub president: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub chancellor: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liberal_progress: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fascist_progress: Option<u32>,
    /// Failed elections since the last enacted policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election_tracker: Option<u32>,
    /// Description of each fascist board slot's presidential power ("" for none)
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub fascist_powers: Option<Option<Vec<String>>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub unused_tiles: Option<Option<u32>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub discarded_tiles: Option<Option<u32>>,
    /// The receiving player's secret role
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub identity: Option<Option<String>>,
    /// Winning faction, set once the game is over
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub winner: Option<Option<String>>,
    /// Keys this client has no typed field for
    #[serde(flatten)]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl StateUpdates {
    /// True when the patch carries no keys at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Marks a key as present, keeping an explicit `null` as `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
