use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::error::{ContractError, Result};

/// Pretty-printed JSON for any serializable report data
pub fn to_json_string<T: Serialize>(data: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Write any serializable data structure to a JSON file
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let output_path = output_path.as_ref();
    let parent_missing = output_path
        .parent()
        .map(|dir| !dir.as_os_str().is_empty() && !dir.is_dir())
        .unwrap_or(false);
    if output_path.is_dir() || parent_missing {
        return Err(ContractError::ExportTarget {
            path: output_path.to_path_buf(),
        }
        .into());
    }

    let json_data = to_json_string(data)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;

    Ok(())
}
