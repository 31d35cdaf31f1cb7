//! # Application State
//!
//! Shared state for the Axum application.
//! Contains configuration, the download catalog, link signing and the
//! payment, storage and email collaborators.

use crate::email::ResendNotifier;
use crate::storage::FsAssetStore;
use drop_core::{
    BoxedAssetStore, BoxedNotifier, BoxedPaymentGateway, DownloadCatalog, DownloadSecret,
    LinkIssuer, LinkVerifier,
};
use drop_stripe::{StripeConfig, StripeGateway, StripeWebhookVerifier};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_CATALOG_PATH: &str = "config/catalog.toml";
const DEFAULT_NOTIFY_FROM: &str = "journals. intake <onboarding@resend.dev>";
const DEFAULT_INTAKE_TO: &str = "journals.sound@gmail.com";

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public site URL, used for checkout redirects and absolute links in email
    pub site_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Key for signing download links
    pub download_secret: DownloadSecret,
    /// Root directory of the filesystem asset store
    pub asset_root: PathBuf,
    /// Explicit catalog location; searched for when unset
    pub catalog_path: Option<PathBuf>,
    /// Resend API key; email is disabled without it
    pub resend_api_key: Option<String>,
    /// Sender for outbound email
    pub notify_from: String,
    /// Inbox receiving intake submissions
    pub intake_to: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let environment = get("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let download_secret = get("DOWNLOAD_SECRET")
            .map(DownloadSecret::new)
            .ok_or_else(|| anyhow::anyhow!("DOWNLOAD_SECRET not set"))?;

        if download_secret.is_insecure_default() {
            if environment == "production" {
                anyhow::bail!("DOWNLOAD_SECRET is the development default; refusing to start in production");
            }
            tracing::warn!("DOWNLOAD_SECRET is the development default; download links are forgeable");
        }

        let port = match get("PORT") {
            Some(p) => p
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT {:?}: {}", p, e))?,
            None => 8080,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            site_url: get("SITE_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            environment,
            download_secret,
            asset_root: get("ASSET_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./assets")),
            catalog_path: get("CATALOG_PATH").map(PathBuf::from),
            resend_api_key: get("RESEND_API_KEY"),
            notify_from: get("NOTIFY_FROM").unwrap_or_else(|| DEFAULT_NOTIFY_FROM.to_string()),
            intake_to: get("INTAKE_TO").unwrap_or_else(|| DEFAULT_INTAKE_TO.to_string()),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("site_url", &self.site_url)
            .field("environment", &self.environment)
            .field("download_secret", &self.download_secret)
            .field("asset_root", &self.asset_root)
            .field("catalog_path", &self.catalog_path)
            .field("email", &self.resend_api_key.is_some())
            .field("notify_from", &self.notify_from)
            .field("intake_to", &self.intake_to)
            .finish()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: Arc<AppConfig>,
    /// Price id -> asset mapping
    pub catalog: Arc<DownloadCatalog>,
    pub issuer: LinkIssuer,
    pub verifier: LinkVerifier,
    /// Payment provider
    pub payments: BoxedPaymentGateway,
    /// Where the downloadable assets live
    pub store: BoxedAssetStore,
    /// Outbound email, absent when unconfigured
    pub notifier: Option<BoxedNotifier>,
    /// Stripe webhook signature check, absent when no signing secret is set
    pub webhooks: Option<StripeWebhookVerifier>,
}

impl AppState {
    /// Build the production state from environment variables
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let catalog = load_download_catalog(config.catalog_path.as_deref())?;

        let stripe_config = StripeConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;
        let webhooks = stripe_config
            .webhook_secret
            .clone()
            .map(StripeWebhookVerifier::new);
        let gateway = StripeGateway::new(stripe_config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        let store = FsAssetStore::new(&config.asset_root);

        let notifier = match &config.resend_api_key {
            Some(key) => {
                let notifier = ResendNotifier::new(
                    key.clone(),
                    &config.notify_from,
                    &config.intake_to,
                    &config.site_url,
                )
                .map_err(|e| anyhow::anyhow!("Failed to initialize email: {}", e))?;
                Some(Arc::new(notifier) as BoxedNotifier)
            }
            None => {
                tracing::warn!("RESEND_API_KEY not set, email notifications disabled");
                None
            }
        };

        let state = Self::from_parts(
            config,
            catalog,
            Arc::new(gateway),
            Arc::new(store),
            notifier,
        );

        Ok(match webhooks {
            Some(verifier) => state.with_webhook_verifier(verifier),
            None => state,
        })
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: AppConfig,
        catalog: DownloadCatalog,
        payments: BoxedPaymentGateway,
        store: BoxedAssetStore,
        notifier: Option<BoxedNotifier>,
    ) -> Self {
        let issuer = LinkIssuer::new(config.download_secret.clone());
        let verifier = LinkVerifier::new(config.download_secret.clone());

        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            issuer,
            verifier,
            payments,
            store,
            notifier,
            webhooks: None,
        }
    }

    /// Builder: enable the Stripe webhook route
    pub fn with_webhook_verifier(mut self, verifier: StripeWebhookVerifier) -> Self {
        self.webhooks = Some(verifier);
        self
    }

    /// Success URL with Stripe's session id placeholder
    pub fn success_url(&self) -> String {
        format!(
            "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.config.site_url
        )
    }

    /// Cancel URL, back to the samples page
    pub fn cancel_url(&self) -> String {
        format!("{}/samples", self.config.site_url)
    }
}

/// Load the download catalog from an explicit path or the usual locations
fn load_download_catalog(explicit: Option<&Path>) -> anyhow::Result<DownloadCatalog> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        return parse_catalog(&content, path);
    }

    let config_paths = [
        DEFAULT_CATALOG_PATH.to_string(),
        format!("../{}", DEFAULT_CATALOG_PATH),
        format!("../../{}", DEFAULT_CATALOG_PATH),
    ];

    for path in &config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            return parse_catalog(&content, Path::new(path));
        }
    }

    tracing::warn!("No download catalog found, purchases will not unlock downloads");
    Ok(DownloadCatalog::new())
}

fn parse_catalog(content: &str, path: &Path) -> anyhow::Result<DownloadCatalog> {
    let catalog = DownloadCatalog::from_toml(content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
    tracing::info!(
        "Loaded {} catalog items from {} (fallback: {})",
        catalog.len(),
        path.display(),
        catalog.fallback.is_some()
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("DOWNLOAD_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.site_url, "http://localhost:8080");
        assert_eq!(config.asset_root, PathBuf::from("./assets"));
        assert_eq!(config.intake_to, DEFAULT_INTAKE_TO);
        assert!(config.catalog_path.is_none());
        assert!(config.resend_api_key.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_download_secret_required() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("DOWNLOAD_SECRET", "")])).is_err());
    }

    #[test]
    fn test_default_secret_refused_in_production() {
        let dev = AppConfig::from_lookup(lookup(&[("DOWNLOAD_SECRET", "dev-secret-change-me")]));
        assert!(dev.is_ok());

        let prod = AppConfig::from_lookup(lookup(&[
            ("DOWNLOAD_SECRET", "dev-secret-change-me"),
            ("ENVIRONMENT", "production"),
        ]));
        assert!(prod.is_err());
    }

    #[test]
    fn test_invalid_port() {
        let result = AppConfig::from_lookup(lookup(&[("DOWNLOAD_SECRET", "x"), ("PORT", "http")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_site_url_trailing_slash() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DOWNLOAD_SECRET", "x"),
            ("SITE_URL", "https://journals.example/"),
        ]))
        .unwrap();
        assert_eq!(config.site_url, "https://journals.example");
    }

    #[test]
    fn test_socket_addr() {
        let mut config = AppConfig::from_lookup(lookup(&[("DOWNLOAD_SECRET", "x")])).unwrap();
        config.host = "0.0.0.0".to_string();
        config.port = 3000;

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DOWNLOAD_SECRET", "topsecret"),
            ("RESEND_API_KEY", "re_live_key"),
        ]))
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("topsecret"));
        assert!(!rendered.contains("re_live_key"));
    }

    #[test]
    fn test_explicit_catalog_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(
            &path,
            "[[items]]\nprice_id = \"price_a\"\nname = \"A\"\nresource_key = \"samples/a.zip\"\nsize = \"1 MB\"\n",
        )
        .unwrap();

        let catalog = load_download_catalog(Some(&path)).unwrap();
        assert_eq!(catalog.len(), 1);

        assert!(load_download_catalog(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
