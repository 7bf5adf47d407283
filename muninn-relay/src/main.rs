#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use http::Method;
use muninn_relay_lib::telemetry::{init_metrics, init_tracing, render_metrics};
use muninn_relay_lib::{
    load_from_path, ClientHelloShape, Config, ProxyRoute, Relay, RelayError, RelayRequest,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Muninn relay (browser TLS fingerprints for outbound HTTPS)")]
struct Cli {
    /// Path to configuration TOML file; built-in defaults when omitted
    #[arg(short, long, value_name = "FILE", env = "MUNINN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available fingerprint profiles
    Profiles,
    /// Print the ClientHello shape and JA3 string a profile produces
    Fingerprint {
        profile: String,
        /// Server name to put in the SNI extension
        #[arg(long, default_value = "example.com")]
        server_name: String,
    },
    /// Relay one request and print the response body
    Fetch {
        url: String,
        /// Profile to use; the configured default when omitted
        #[arg(short, long)]
        profile: Option<String>,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Extra header, `Name: value`; repeatable
        #[arg(short = 'H', long = "header", value_name = "HEADER")]
        headers: Vec<String>,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
        /// HTTP CONNECT proxy, `http://[user:password@]host[:port]`
        #[arg(long)]
        proxy: Option<String>,
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
        /// Print status line and headers before the body
        #[arg(short, long)]
        include: bool,
        /// Keep the body as received instead of undoing content-encoding
        #[arg(long)]
        raw: bool,
        /// Print Prometheus metrics to stderr afterwards
        #[arg(long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => match load_from_path(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("failed to load configuration: {err}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Err(err) = init_tracing(
        &config.logging.level,
        config.logging.show_target,
        &config.telemetry.otel_log_level,
    ) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }
    info!(config = ?cli.config, profiles = config.profiles.len(), "configuration loaded");

    if let Err(err) = run(cli.command, config).await {
        error!(%err, "command failed");
        let report = serde_json::json!({
            "error": err.error_type(),
            "status": err.status_code().as_u16(),
            "message": err.to_string(),
        });
        eprintln!("{report}");
        std::process::exit(1);
    }
}

async fn run(command: Command, config: Config) -> Result<(), RelayError> {
    match command {
        Command::Profiles => {
            let relay = Relay::from_config(&config, None)?;
            for id in relay.profiles().list_profiles() {
                let marker = if id == relay.default_profile() { " (default)" } else { "" };
                println!("{id}{marker}");
            }
            Ok(())
        }
        Command::Fingerprint { profile, server_name } => {
            let relay = Relay::from_config(&config, None)?;
            let profile = relay.profiles().get_profile(&profile)?;
            let shape = ClientHelloShape::expected(&profile, Some(&server_name));
            let out = serde_json::json!({
                "profile": profile.id(),
                "ja3": shape.ja3_string(),
                "client_hello": shape,
                "http2": profile.http2(),
                "header_order": profile.header_order().iter().map(|h| h.as_str()).collect::<Vec<_>>(),
            });
            let pretty = serde_json::to_string_pretty(&out)
                .map_err(|e| RelayError::Config(format!("failed to render fingerprint: {e}")))?;
            println!("{pretty}");
            Ok(())
        }
        Command::Fetch {
            url,
            profile,
            method,
            headers,
            data,
            proxy,
            timeout_ms,
            include,
            raw,
            metrics,
        } => {
            let registry = if metrics || config.telemetry.metrics_enabled {
                let (m, registry) = init_metrics()
                    .map_err(|e| RelayError::Config(format!("failed to initialize metrics: {e}")))?;
                Some((m, registry))
            } else {
                None
            };
            let relay = Relay::from_config(&config, registry.as_ref().map(|(m, _)| m.clone()))?;

            let method: Method = method
                .parse()
                .map_err(|_| RelayError::InvalidRequest(format!("invalid method '{method}'")))?;
            let profile = profile.unwrap_or_else(|| relay.default_profile().to_string());
            let mut request = RelayRequest::new(method, &url, profile)?;
            for header in &headers {
                let (name, value) = header.split_once(':').ok_or_else(|| {
                    RelayError::InvalidRequest(format!("header '{header}' is not 'Name: value'"))
                })?;
                request = request.header(name.trim(), value.trim())?;
            }
            if let Some(data) = data {
                request = request.body(data);
            }
            if let Some(proxy) = proxy {
                request = request.proxy(proxy.parse::<ProxyRoute>()?);
            }
            if let Some(ms) = timeout_ms {
                request = request.timeout(Duration::from_millis(ms));
            }

            let response = relay.dispatch(request.decompress(!raw)).await?;
            info!(
                status = response.status().as_u16(),
                version = ?response.version(),
                attempts = response.attempts(),
                elapsed_ms = response.elapsed().as_millis(),
                "response received"
            );

            let mut stdout = std::io::stdout().lock();
            if include {
                writeln!(stdout, "{:?} {}", response.version(), response.status())?;
                for (name, value) in response.headers() {
                    writeln!(stdout, "{name}: {}", String::from_utf8_lossy(value.as_bytes()))?;
                }
                writeln!(stdout)?;
            }
            stdout.write_all(response.body())?;
            stdout.flush()?;

            if let Some((_, registry)) = registry {
                eprint!("{}", render_metrics(&registry)?);
            }
            Ok(())
        }
    }
}
