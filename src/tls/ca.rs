//! Local certificate authority for intercepted tunnels.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
    KeyUsagePurpose, PKCS_ECDSA_P256_SHA256,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;

/// Errors from loading the CA or minting leaf certificates.
#[derive(Debug, thiserror::Error)]
pub enum CaError {
    #[error("CA file error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("no certificate found in {0}")]
    MissingCertificate(String),

    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),
}

/// Signs per-host leaf certificates and caches the resulting TLS configs.
pub struct CertificateAuthority {
    common_name: String,
    ca_cert_pem: String,
    ca_cert_der: CertificateDer<'static>,
    ca_key_pair: KeyPair,
    server_configs: DashMap<String, Arc<ServerConfig>>,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("common_name", &self.common_name)
            .field("cached_hosts", &self.server_configs.len())
            .finish()
    }
}

impl CertificateAuthority {
    /// Load the CA from disk, or generate one at the given paths.
    pub async fn load_or_generate(
        cert_path: &Path,
        key_path: &Path,
        common_name: &str,
    ) -> Result<Self, CaError> {
        if cert_path.exists() && key_path.exists() {
            tracing::info!(path = %cert_path.display(), "Loading CA certificate");
            let cert_pem = read(cert_path).await?;
            let key_pem = read(key_path).await?;
            Self::from_pem(&cert_pem, &key_pem, common_name, &cert_path.display().to_string())
        } else {
            tracing::info!(path = %cert_path.display(), "Generating CA certificate");
            let ca = Self::generate(common_name)?;
            write(cert_path, &ca.ca_cert_pem).await?;
            write(key_path, &ca.ca_key_pair.serialize_pem()).await?;
            tracing::warn!(
                path = %cert_path.display(),
                "New CA generated; clients must trust it for HTTPS interception"
            );
            Ok(ca)
        }
    }

    /// Create a fresh, in-memory CA.
    pub fn generate(common_name: &str) -> Result<Self, CaError> {
        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;
        let cert = ca_params(common_name)?.self_signed(&key_pair)?;
        let pem = cert.pem();
        Self::from_pem(&pem, &key_pair.serialize_pem(), common_name, "generated CA")
    }

    fn from_pem(
        cert_pem: &str,
        key_pem: &str,
        common_name: &str,
        origin: &str,
    ) -> Result<Self, CaError> {
        let ca_key_pair = KeyPair::from_pem(key_pem)?;
        let ca_cert_der = rustls_pemfile::certs(&mut cert_pem.as_bytes())
            .next()
            .ok_or_else(|| CaError::MissingCertificate(origin.to_string()))?
            .map_err(|source| CaError::Io { path: origin.to_string(), source })?;

        Ok(Self {
            common_name: common_name.to_string(),
            ca_cert_pem: cert_pem.to_string(),
            ca_cert_der,
            ca_key_pair,
            server_configs: DashMap::new(),
        })
    }

    /// PEM of the CA certificate, for installing into client trust stores.
    pub fn ca_cert_pem(&self) -> &str {
        &self.ca_cert_pem
    }

    /// TLS server config presenting a leaf certificate for `host`.
    pub fn server_config_for(&self, host: &str) -> Result<Arc<ServerConfig>, CaError> {
        if let Some(config) = self.server_configs.get(host) {
            return Ok(config.value().clone());
        }

        let config = Arc::new(self.build_server_config(host)?);
        // A concurrent handshake may have raced us; keep whichever landed first.
        let config = self
            .server_configs
            .entry(host.to_string())
            .or_insert(config)
            .value()
            .clone();
        tracing::debug!(host = %host, "Minted leaf certificate");
        Ok(config)
    }

    /// Number of hosts with a cached leaf certificate.
    pub fn cached_hosts(&self) -> usize {
        self.server_configs.len()
    }

    fn build_server_config(&self, host: &str) -> Result<ServerConfig, CaError> {
        let mut params = CertificateParams::new(vec![host.to_string()])?;
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::CommonName, host);
        params.use_authority_key_identifier_extension = false;

        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;
        let issuer = Issuer::new(ca_params(&self.common_name)?, &self.ca_key_pair);
        let cert = params.signed_by(&key_pair, &issuer)?;

        let chain = vec![cert.der().clone(), self.ca_cert_der.clone()];
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

        let mut config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(chain, key)?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        Ok(config)
    }
}

fn ca_params(common_name: &str) -> Result<CertificateParams, rcgen::Error> {
    let mut params = CertificateParams::new(Vec::<String>::new())?;
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.distinguished_name.push(DnType::OrganizationName, "egress-proxy");
    Ok(params)
}

async fn read(path: &Path) -> Result<String, CaError> {
    tokio::fs::read_to_string(path).await.map_err(|source| CaError::Io {
        path: path.display().to_string(),
        source,
    })
}

async fn write(path: &Path, contents: &str) -> Result<(), CaError> {
    let io_err = |source| CaError::Io { path: path.display().to_string(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, contents).await.map_err(io_err)
}
