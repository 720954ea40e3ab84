use firebase::FirebaseProvider;
use tfplug::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ServerConfig::from_env();

    // Outbound credential exchanges need a process-wide crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    // stdout is reserved for the plugin handshake
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(config.log_level)
        .init();

    tfplug::serve(FirebaseProvider::new(), config).await?;

    Ok(())
}
