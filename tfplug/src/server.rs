//! Server module for running Terraform providers
//!
//! Terraform launches the plugin binary with a magic cookie in the
//! environment, reads a single handshake line from stdout and then talks gRPC
//! to the advertised address. Anything else the process wants to say goes to
//! stderr.
//!
//! When Terraform passes its client certificate in `PLUGIN_CLIENT_CERT`
//! (AutoMTLS), the server generates its own certificate, requires the client
//! to present Terraform's, and advertises the server certificate as the sixth
//! handshake field.

use crate::error::{Result, TfplugError};
use crate::grpc::ProviderService;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use std::path::PathBuf;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const PROTOCOL_VERSION: u32 = 6;
const CORE_PROTOCOL_VERSION: u32 = 1;

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PEM certificate; plaintext gRPC is served when unset
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    /// Terraform's client certificate (PEM) for AutoMTLS
    pub client_cert: Option<String>,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    pub log_level: tracing::Level,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tls_cert: None,
            tls_key: None,
            client_cert: None,
            max_message_size: 256 << 20, // 256MB
            log_level: tracing::Level::INFO,
        }
    }
}

impl ServerConfig {
    /// Builds the configuration from the environment Terraform provides
    ///
    /// `TF_LOG_PROVIDER` takes precedence over `TF_LOG`. `TFPLUG_TLS_CERT` and
    /// `TFPLUG_TLS_KEY` enable TLS when both are set. `PLUGIN_CLIENT_CERT`
    /// enables AutoMTLS.
    pub fn from_env() -> Self {
        let log_level = std::env::var("TF_LOG_PROVIDER")
            .ok()
            .or_else(|| std::env::var("TF_LOG").ok())
            .and_then(|level| parse_log_level(&level))
            .unwrap_or(tracing::Level::INFO);

        let tls_cert = std::env::var_os("TFPLUG_TLS_CERT").map(PathBuf::from);
        let tls_key = std::env::var_os("TFPLUG_TLS_KEY").map(PathBuf::from);
        let client_cert = std::env::var("PLUGIN_CLIENT_CERT")
            .ok()
            .filter(|pem| !pem.trim().is_empty());

        Self {
            tls_cert,
            tls_key,
            client_cert,
            log_level,
            ..Self::default()
        }
    }
}

fn parse_log_level(level: &str) -> Option<tracing::Level> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        // TF_LOG=1 and similar switch logging on without naming a level
        "" => None,
        _ => Some(tracing::Level::TRACE),
    }
}

/// Fails unless the process was started by Terraform
pub fn check_magic_cookie() -> Result<()> {
    match std::env::var(MAGIC_COOKIE_KEY) {
        Ok(value) if value == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::NotLaunchedByTerraform),
    }
}

/// Self-signed server certificate for AutoMTLS
struct GeneratedCertificate {
    cert_pem: String,
    key_pem: String,
    der: Vec<u8>,
}

fn generate_certificate() -> Result<GeneratedCertificate> {
    let tls_error =
        |e: rcgen::Error| TfplugError::TlsError(format!("Failed to generate certificate: {}", e));

    let mut params = CertificateParams::new(vec!["localhost".to_string()]).map_err(tls_error)?;
    params.distinguished_name.push(DnType::CommonName, "localhost");
    params.distinguished_name.push(DnType::OrganizationName, "HashiCorp");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let key_pair = KeyPair::generate().map_err(tls_error)?;
    let cert = params.self_signed(&key_pair).map_err(tls_error)?;

    Ok(GeneratedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        der: cert.der().to_vec(),
    })
}

/// TLS settings for the server, plus the certificate DER to advertise in the
/// handshake when one was generated
///
/// Explicit cert/key paths take precedence over AutoMTLS.
async fn tls_config(
    config: &ServerConfig,
) -> Result<Option<(ServerTlsConfig, Option<Vec<u8>>)>> {
    let client_ca = config
        .client_cert
        .as_ref()
        .map(|pem| Certificate::from_pem(pem.as_bytes()));

    if let (Some(cert_path), Some(key_path)) = (&config.tls_cert, &config.tls_key) {
        let cert = tokio::fs::read(cert_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;
        let key = tokio::fs::read(key_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;

        let mut tls = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));
        if let Some(ca) = client_ca {
            tls = tls.client_ca_root(ca);
        }
        return Ok(Some((tls, None)));
    }

    let Some(ca) = client_ca else {
        return Ok(None);
    };

    let generated = generate_certificate()?;
    let tls = ServerTlsConfig::new()
        .identity(Identity::from_pem(&generated.cert_pem, &generated.key_pem))
        .client_ca_root(ca);

    Ok(Some((tls, Some(generated.der))))
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    check_magic_cookie()?;

    let provider_service = ProviderServer::new(ProviderService::new(provider))
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let mut builder = Server::builder();
    let mut server_cert = None;
    let tls = tls_config(&config).await?;
    let tls_enabled = tls.is_some();
    if let Some((tls, cert_der)) = tls {
        // Another component may already have installed a provider
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        builder = builder.tls_config(tls)?;
        server_cert = cert_der;
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    println!("{}", handshake_line(addr.port(), server_cert.as_deref()));
    tracing::info!(
        %addr,
        tls = tls_enabled,
        auto_mtls = server_cert.is_some(),
        "provider server listening"
    );

    builder
        .add_service(provider_service)
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await?;

    Ok(())
}

fn handshake_line(port: u16, server_cert: Option<&[u8]>) -> String {
    let line = format!(
        "{}|{}|tcp|127.0.0.1:{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, port
    );

    match server_cert {
        Some(der) => format!("{}|{}", line, STANDARD_NO_PAD.encode(der)),
        None => line,
    }
}
