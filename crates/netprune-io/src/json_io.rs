use crate::error::IoResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Save a serializable value as pretty-printed JSON.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> IoResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load a value from a JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> IoResult<T> {
    let json = fs::read_to_string(path)?;
    let value = serde_json::from_str(&json)?;
    Ok(value)
}
