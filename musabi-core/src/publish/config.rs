//! Graph API configuration.

use std::fmt;

use crate::config::SecretStore;
use crate::error::PipelineError;

pub const ACCESS_TOKEN_PARAM: &str = "/meta/musabi/access-token";
pub const ACCOUNT_ID_PARAM: &str = "/meta/musabi/account-id";
pub const VERSION_PARAM: &str = "/meta/musabi/version";
pub const GRAPH_URL_PARAM: &str = "/meta/musabi/graph-url";

/// Credentials and endpoint of the publishing account.
#[derive(Clone)]
pub struct MetaConfig {
    pub access_token: String,
    pub account_id: String,
    /// API version segment, e.g. "v21.0".
    pub version: String,
    pub graph_url: String,
}

impl MetaConfig {
    /// Resolve every parameter from `secrets`.
    pub async fn load(secrets: &dyn SecretStore) -> Result<Self, PipelineError> {
        Ok(Self {
            access_token: secrets.get(ACCESS_TOKEN_PARAM).await?,
            account_id: secrets.get(ACCOUNT_ID_PARAM).await?,
            version: secrets.get(VERSION_PARAM).await?,
            graph_url: secrets.get(GRAPH_URL_PARAM).await?,
        })
    }

    /// `{graph_url}/{version}/`
    pub fn endpoint_base(&self) -> String {
        format!(
            "{}/{}/",
            self.graph_url.trim_end_matches('/'),
            self.version.trim_matches('/')
        )
    }
}

impl fmt::Debug for MetaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaConfig")
            .field("access_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("version", &self.version)
            .field("graph_url", &self.graph_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvSecretStore;

    fn secrets() -> EnvSecretStore {
        EnvSecretStore::new()
            .with_secret(ACCESS_TOKEN_PARAM, "token-abc")
            .with_secret(ACCOUNT_ID_PARAM, "1784")
            .with_secret(VERSION_PARAM, "v21.0")
            .with_secret(GRAPH_URL_PARAM, "https://graph.facebook.com/")
    }

    #[tokio::test]
    async fn test_load_and_endpoint_base() {
        let config = MetaConfig::load(&secrets()).await.unwrap();
        assert_eq!(config.endpoint_base(), "https://graph.facebook.com/v21.0/");
        assert_eq!(config.account_id, "1784");
    }

    #[tokio::test]
    async fn test_debug_hides_token() {
        let config = MetaConfig::load(&secrets()).await.unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("token-abc"));
        assert!(printed.contains("1784"));
    }
}
