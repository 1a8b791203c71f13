mod auth;
mod catalog;
mod favorites_api;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) use auth::{AuthClient, AuthUser, current_user};
pub(crate) use catalog::{
    CatalogClient, Show, ShowDetail, ShowOrder, filter_shows, genre_list,
};
pub(crate) use favorites_api::{FavoritesStore, SupabaseFavorites};

/// Ids come back as strings from some endpoints and numbers from others.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    })
}

pub(crate) fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_string(deserializer)?;
    Ok((!value.is_empty()).then_some(value))
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
