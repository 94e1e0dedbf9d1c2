use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage provider kinds
///
/// Exactly one of these is active per process; it is resolved once from configuration
/// at startup (see [`crate::config::StorageConfig::resolve_provider`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Plain local filesystem
    Local,
    /// Local filesystem behind a hard size ceiling and an image-only allowlist
    Capped,
    /// Object storage / CDN (B2-style API)
    Object,
    /// Cold storage for large files (blob-store API)
    Cold,
}

impl ProviderKind {
    /// Whether bytes for this provider live on the local filesystem.
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Local | ProviderKind::Capped)
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "filesystem" => Ok(ProviderKind::Local),
            "capped" | "free-tier" => Ok(ProviderKind::Capped),
            "object" | "b2" | "cdn" => Ok(ProviderKind::Object),
            "cold" | "blob" => Ok(ProviderKind::Cold),
            _ => Err(anyhow::anyhow!("Invalid storage provider: {}", s)),
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProviderKind::Local => write!(f, "local"),
            ProviderKind::Capped => write!(f, "capped"),
            ProviderKind::Object => write!(f, "object"),
            ProviderKind::Cold => write!(f, "cold"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_aliases() {
        assert_eq!("B2".parse::<ProviderKind>().unwrap(), ProviderKind::Object);
        assert_eq!("blob".parse::<ProviderKind>().unwrap(), ProviderKind::Cold);
        assert_eq!(" Local ".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert!("nfs".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_display_round_trips() {
        for kind in [
            ProviderKind::Local,
            ProviderKind::Capped,
            ProviderKind::Object,
            ProviderKind::Cold,
        ] {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
    }
}
