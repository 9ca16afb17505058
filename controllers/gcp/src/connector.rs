//! Provider connection
//!
//! Every reconcile cycle resolves the object's `ProviderConfig`, reads its
//! credentials and builds a fresh GCP client bound to the configured
//! project. Nothing is cached between cycles, so rotated credentials and
//! edited ProviderConfigs take effect on the next cycle.

use crds::{CredentialsSource, ProviderConfig, ProviderConfigReference};
use gcp_client::{parse_access_token, GcpClient, GcpClientTrait, GcpEndpoints};
use kube::{Api, Client};
use managed::{ConnectError, Connector, ExternalClient, Managed, SecretStore};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Lookup of cluster-scoped ProviderConfigs
#[async_trait::async_trait]
pub trait ProviderConfigs: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<ProviderConfig>, ConnectError>;
}

/// [`ProviderConfigs`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeProviderConfigs {
    api: Api<ProviderConfig>,
}

impl std::fmt::Debug for KubeProviderConfigs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeProviderConfigs").finish_non_exhaustive()
    }
}

impl KubeProviderConfigs {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait::async_trait]
impl ProviderConfigs for KubeProviderConfigs {
    async fn get(&self, name: &str) -> Result<Option<ProviderConfig>, ConnectError> {
        self.api
            .get_opt(name)
            .await
            .map_err(|e| ConnectError::Lookup(Box::new(e)))
    }
}

/// Credentials resolved from a ProviderConfig
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// OAuth2 access token read from a Secret
    AccessToken(String),
    /// Identity of the controller pod
    InjectedIdentity,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Credentials::InjectedIdentity => f.write_str("InjectedIdentity"),
        }
    }
}

/// Builds GCP clients from resolved credentials
#[async_trait::async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(
        &self,
        project_id: &str,
        credentials: Credentials,
    ) -> Result<Arc<dyn GcpClientTrait>, ConnectError>;
}

/// [`ClientFactory`] producing REST clients
#[derive(Debug, Clone, Default)]
pub struct RestClientFactory {
    endpoints: GcpEndpoints,
}

impl RestClientFactory {
    pub fn new(endpoints: GcpEndpoints) -> Self {
        Self { endpoints }
    }
}

#[async_trait::async_trait]
impl ClientFactory for RestClientFactory {
    async fn build(
        &self,
        project_id: &str,
        credentials: Credentials,
    ) -> Result<Arc<dyn GcpClientTrait>, ConnectError> {
        let client = match credentials {
            Credentials::AccessToken(token) => {
                GcpClient::new(project_id.to_string(), token, self.endpoints.clone())
            }
            Credentials::InjectedIdentity => {
                GcpClient::from_metadata_server(project_id.to_string(), self.endpoints.clone()).await
            }
        }
        .map_err(|e| ConnectError::Client(Box::new(e)))?;
        Ok(Arc::new(client))
    }
}

/// Resolves a ProviderConfig reference into a GCP client
pub struct ProviderResolver {
    configs: Arc<dyn ProviderConfigs>,
    secrets: Arc<dyn SecretStore>,
    factory: Arc<dyn ClientFactory>,
}

impl std::fmt::Debug for ProviderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderResolver").finish_non_exhaustive()
    }
}

impl ProviderResolver {
    pub fn new(
        configs: Arc<dyn ProviderConfigs>,
        secrets: Arc<dyn SecretStore>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            configs,
            secrets,
            factory,
        }
    }

    /// ProviderConfig -> credentials -> client
    pub async fn resolve(
        &self,
        reference: &ProviderConfigReference,
    ) -> Result<Arc<dyn GcpClientTrait>, ConnectError> {
        let config = self
            .configs
            .get(&reference.name)
            .await?
            .ok_or_else(|| ConnectError::ProviderConfigNotFound(reference.name.clone()))?;

        let credentials = match config.spec.credentials.source {
            CredentialsSource::Secret => {
                let selector = config.spec.credentials.secret_ref.as_ref().ok_or_else(|| {
                    ConnectError::InvalidConfig(format!(
                        "ProviderConfig {} uses source Secret but has no secretRef",
                        reference.name
                    ))
                })?;
                let raw = self.secrets.get_secret(selector).await?;
                let token = parse_access_token(&raw).map_err(|e| {
                    ConnectError::InvalidConfig(format!("credentials secret {}: {}", selector, e))
                })?;
                Credentials::AccessToken(token)
            }
            CredentialsSource::InjectedIdentity => Credentials::InjectedIdentity,
        };

        debug!(
            "Connecting to project {} using ProviderConfig {}",
            config.spec.project_id, reference.name
        );
        self.factory.build(&config.spec.project_id, credentials).await
    }
}

/// Builds the kind-specific external client around a connected GCP client
pub type ExternalFactory<E> = Arc<dyn Fn(Arc<dyn GcpClientTrait>) -> E + Send + Sync>;

/// [`Connector`] for one managed kind
pub struct GcpConnector<K, E> {
    resolver: Arc<ProviderResolver>,
    external: ExternalFactory<E>,
    _kind: PhantomData<fn() -> K>,
}

impl<K, E> std::fmt::Debug for GcpConnector<K, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpConnector").finish_non_exhaustive()
    }
}

impl<K, E> GcpConnector<K, E> {
    pub fn new(resolver: Arc<ProviderResolver>, external: ExternalFactory<E>) -> Self {
        Self {
            resolver,
            external,
            _kind: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<K, E> Connector<K> for GcpConnector<K, E>
where
    K: Managed,
    E: ExternalClient<K> + 'static,
{
    type Client = E;

    async fn connect(&self, obj: &K) -> Result<E, ConnectError> {
        let gcp = self.resolver.resolve(obj.provider_config_ref()).await?;
        Ok((self.external)(gcp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{provider_config, MockClientFactory, StaticProviderConfigs};
    use gcp_client::MockGcpClient;
    use managed::testing::MemorySecrets;

    fn resolver(
        configs: StaticProviderConfigs,
        secrets: MemorySecrets,
        factory: MockClientFactory,
    ) -> ProviderResolver {
        ProviderResolver::new(Arc::new(configs), Arc::new(secrets), Arc::new(factory))
    }

    fn default_ref() -> ProviderConfigReference {
        ProviderConfigReference::default()
    }

    #[tokio::test]
    async fn test_resolves_token_from_secret() {
        let secrets = MemorySecrets::new();
        secrets.insert("crossplane-system", "gcp-creds", "token", b"ya29.test\n");
        let factory = MockClientFactory::new(MockGcpClient::new("my-project"));
        let r = resolver(
            StaticProviderConfigs::with(provider_config("default", "my-project")),
            secrets,
            factory.clone(),
        );

        let client = r.resolve(&default_ref()).await.unwrap();
        assert_eq!(client.project_id(), "my-project");
        assert_eq!(
            factory.builds(),
            vec![("my-project".to_string(), Credentials::AccessToken("ya29.test".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_missing_provider_config() {
        let r = resolver(
            StaticProviderConfigs::default(),
            MemorySecrets::new(),
            MockClientFactory::new(MockGcpClient::new("p")),
        );
        let err = r.resolve(&default_ref()).await.err().unwrap();
        assert!(matches!(err, ConnectError::ProviderConfigNotFound(ref name) if name == "default"));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_missing_secret_and_key() {
        let configs = StaticProviderConfigs::with(provider_config("default", "p"));
        let r = resolver(
            configs.clone(),
            MemorySecrets::new(),
            MockClientFactory::new(MockGcpClient::new("p")),
        );
        let err = r.resolve(&default_ref()).await.err().unwrap();
        assert!(matches!(err, ConnectError::CredentialsNotFound(_)));

        let secrets = MemorySecrets::new();
        secrets.insert("crossplane-system", "gcp-creds", "other", b"x");
        let r = resolver(configs, secrets, MockClientFactory::new(MockGcpClient::new("p")));
        let err = r.resolve(&default_ref()).await.err().unwrap();
        assert!(matches!(err, ConnectError::CredentialsKeyMissing { ref key, .. } if key == "token"));
    }

    #[tokio::test]
    async fn test_service_account_key_is_rejected() {
        let secrets = MemorySecrets::new();
        secrets.insert(
            "crossplane-system",
            "gcp-creds",
            "token",
            br#"{"type":"service_account","project_id":"p"}"#,
        );
        let r = resolver(
            StaticProviderConfigs::with(provider_config("default", "p")),
            secrets,
            MockClientFactory::new(MockGcpClient::new("p")),
        );
        let err = r.resolve(&default_ref()).await.err().unwrap();
        assert!(matches!(err, ConnectError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_injected_identity_skips_secret() {
        let mut config = provider_config("default", "p");
        config.spec.credentials.source = CredentialsSource::InjectedIdentity;
        config.spec.credentials.secret_ref = None;
        let factory = MockClientFactory::new(MockGcpClient::new("p"));
        let r = resolver(StaticProviderConfigs::with(config), MemorySecrets::new(), factory.clone());

        r.resolve(&default_ref()).await.unwrap();
        assert_eq!(factory.builds(), vec![("p".to_string(), Credentials::InjectedIdentity)]);
    }

    #[tokio::test]
    async fn test_client_is_rebuilt_every_connect() {
        let secrets = MemorySecrets::new();
        secrets.insert("crossplane-system", "gcp-creds", "token", b"ya29.one");
        let factory = MockClientFactory::new(MockGcpClient::new("p"));
        let r = resolver(
            StaticProviderConfigs::with(provider_config("default", "p")),
            secrets.clone(),
            factory.clone(),
        );

        r.resolve(&default_ref()).await.unwrap();
        secrets.insert("crossplane-system", "gcp-creds", "token", b"ya29.two");
        r.resolve(&default_ref()).await.unwrap();

        let tokens: Vec<_> = factory.builds().into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            tokens,
            vec![
                Credentials::AccessToken("ya29.one".to_string()),
                Credentials::AccessToken("ya29.two".to_string()),
            ]
        );
    }
}
