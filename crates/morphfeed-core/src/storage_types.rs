use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend types
///
/// Defined in core because both configuration and the storage factory need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_round_trip() {
        assert_eq!("LOCAL".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!(StorageBackend::Memory.to_string(), "memory");
        assert!("s3".parse::<StorageBackend>().is_err());
    }
}
