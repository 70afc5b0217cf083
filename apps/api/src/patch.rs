//! Serde helper for PATCH-style update bodies.

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent JSON key (keep the stored value, outer `None`)
/// from an explicit `null` (clear the field, `Some(None)`). Use together
/// with `#[serde(default)]`.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}
