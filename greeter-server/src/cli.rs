use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use greeter_core::{Config, CurrentWeather, Greeter, GreetingRequest, ProviderId};
use inquire::{Confirm, Password, Text};
use tower_http::trace::TraceLayer;

use crate::http::{self, AppState};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "greeter", version, about = "Greets visitors with their local temperature")]
pub struct Cli {
    /// Read configuration from this file instead of the platform config dir.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Bind host; overrides HOST and the config file.
        #[arg(long)]
        host: Option<String>,

        /// Bind port; overrides PORT and the config file.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Produce one greeting and print the JSON response.
    Greet {
        /// Visitor name; defaults to "Guest".
        #[arg(long)]
        name: Option<String>,

        /// Client IP to locate; defaults to this machine's public IP.
        #[arg(long)]
        ip: Option<IpAddr>,
    },

    /// Store credentials for a weather provider.
    Configure {
        /// Provider short name, e.g. "weatherapi" or "openweather".
        provider: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Serve { host, port } => {
                let config = load_config(self.config.as_ref())?;
                serve(config, host, port).await
            }
            Command::Greet { name, ip } => {
                let config = load_config(self.config.as_ref())?;
                let greeter = Greeter::from_config(&config)?;
                let (response, weather) = greeter
                    .greet_with_weather(&GreetingRequest { visitor_name: name, client_ip: ip })
                    .await?;

                if self.verbose {
                    eprintln!("{}", describe_weather(&weather));
                }
                println!("{}", serde_json::to_string_pretty(&response)?);
                Ok(())
            }
            Command::Configure { provider } => configure(self.config.as_ref(), &provider),
        }
    }
}

fn describe_weather(weather: &CurrentWeather) -> String {
    format!(
        "{} via {}: {:.1}°C (feels like {:.1}°C), {}, humidity {}%, wind {:.1} m/s, observed {}",
        weather.location_name,
        weather.provider,
        weather.temperature_c,
        weather.feels_like_c,
        weather.condition,
        weather.humidity_pct,
        weather.wind_speed_mps,
        weather.observation_time.format("%Y-%m-%d %H:%M UTC"),
    )
}

fn read_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// File config with the environment layered on top.
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut config = read_config(path)?;
    config.apply_process_env()?;
    Ok(config)
}

async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let greeter = Greeter::from_config(&config)?;
    tracing::info!(provider = %config.default_provider_id()?, "Weather provider selected");
    if config.geolocation_token().is_none() {
        tracing::warn!("IPINFO_TOKEN is not set; geolocation requests are rate limited");
    }

    let router = http::routes()
        .with_state(Arc::new(AppState { greeter }))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

fn configure(path: Option<&PathBuf>, provider: &str) -> Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = read_config(path)?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.upsert_provider_api_key(id, api_key.trim().to_string());

    let token = Text::new("ipinfo.io token (leave empty to skip):")
        .prompt()
        .context("Failed to read ipinfo token")?;
    if !token.trim().is_empty() {
        config.set_geolocation_token(token.trim().to_string());
    }

    if config.default_provider_id()? != id {
        let make_default = Confirm::new(&format!("Use {id} as the default provider?"))
            .with_default(true)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    match path {
        Some(path) => config.save_to(path)?,
        None => config.save()?,
    }
    println!("Saved configuration for {id}");

    Ok(())
}
