//! qr-scan binary entry point.

use anyhow::Context;
use clap::Parser;
use scanner_cli::{run, scan_image, CliArgs, CliConfig, CliError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing on stderr.
///
/// Set `RUST_LOG` to control log levels (default: warn,scanner_cli=info,scanner_core=info).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,scanner_cli=info,scanner_core=info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

async fn scan_images(config: &CliConfig) -> anyhow::Result<bool> {
    let mut found = false;
    for path in &config.images {
        match scan_image(path).await? {
            Some(payload) => {
                found = true;
                if config.json {
                    println!(
                        "{}",
                        serde_json::json!({ "image": path, "payload": payload })
                    );
                } else {
                    println!("{}: {payload}", path.display());
                }
            }
            None => tracing::warn!("No QR code in {}", path.display()),
        }
    }
    Ok(found)
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let config = CliConfig::try_from(args).context("Failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let local = tokio::task::LocalSet::new();

    if !config.images.is_empty() {
        let found = local.block_on(&runtime, scan_images(&config))?;
        if !found {
            anyhow::bail!("No QR code found in {} image(s)", config.images.len());
        }
        return Ok(());
    }

    match local.block_on(&runtime, run(&config)) {
        Ok(report) => {
            println!("{}", report.render(config.json));
            Ok(())
        }
        Err(err @ CliError::NoCode { .. }) => Err(err.into()),
        Err(err) => Err(anyhow::Error::new(err).context("Scan failed")),
    }
}
