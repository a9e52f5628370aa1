//! Core library for the visitor greeter.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Clients for the public IP, geolocation and weather upstreams
//! - The [`Greeter`] that chains them into a single greeting
//!
//! It is used by `greeter-server`, but can also be reused by other binaries or services.

pub mod config;
pub mod geo;
pub mod greeting;
pub mod ip;
pub mod model;
pub mod provider;

mod http;

pub use config::{Config, GeolocationConfig, ProviderConfig, ServerConfig};
pub use geo::{GeoLocator, IpInfoClient};
pub use greeting::Greeter;
pub use ip::{ClientIpError, IpifyClient, PublicIpLookup};
pub use model::{CurrentWeather, GeoLocation, GreetingRequest, GreetingResponse};
pub use provider::{ProviderId, WeatherProvider};
