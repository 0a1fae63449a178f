// Device ID management for multi-device sync
// Format: "eyerest-<uuid>"

use std::fs;
use std::path::Path;
use uuid::Uuid;

const DEVICE_ID_FILE: &str = "device_id.txt";
const DEVICE_ID_PREFIX: &str = "eyerest-";

/// Error type for device ID operations
#[derive(Debug, thiserror::Error)]
pub enum DeviceIdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid device ID format: {0}")]
    InvalidFormat(String),
}

/// Generate a fresh device id without persisting it.
pub fn new_device_id() -> String {
    format!("{}{}", DEVICE_ID_PREFIX, Uuid::new_v4())
}

/// Get or create the device ID stored under `path`.
///
/// # Returns
/// Device ID string in format "eyerest-<uuid>"
pub fn get_or_create_device_id_at(path: &Path) -> Result<String, DeviceIdError> {
    let device_id_path = path.join(DEVICE_ID_FILE);

    if device_id_path.exists() {
        let content = fs::read_to_string(&device_id_path)?;
        let device_id = content.trim().to_string();
        if device_id.starts_with(DEVICE_ID_PREFIX) {
            return Ok(device_id);
        }
        return Err(DeviceIdError::InvalidFormat(device_id));
    }

    let device_id = new_device_id();
    fs::create_dir_all(path)?;
    fs::write(&device_id_path, format!("{device_id}\n"))?;
    tracing::info!(device_id = %device_id, "created device id");

    Ok(device_id)
}

/// Get or create device ID in the default data directory.
pub fn get_or_create_device_id() -> Result<String, DeviceIdError> {
    let data_dir = crate::storage::data_dir()
        .map_err(|e| DeviceIdError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string())))?;
    get_or_create_device_id_at(&data_dir)
}
