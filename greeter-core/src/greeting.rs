//! Composes the public IP, location and weather lookups into a greeting.

use anyhow::{Context, Result};

use crate::{
    Config,
    geo::{GeoLocator, IpInfoClient},
    ip::{IpifyClient, PublicIpLookup, is_public},
    model::{CurrentWeather, GreetingRequest, GreetingResponse},
    provider::{WeatherProvider, default_provider_from_config},
};

const DEFAULT_VISITOR: &str = "Guest";

pub fn normalize_visitor(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => DEFAULT_VISITOR.to_string(),
    }
}

pub fn format_greeting(visitor: &str, temperature_c: f64, location: &str) -> String {
    format!("Hello, {visitor}! The temperature is {temperature_c:.1} degrees Celsius in {location}")
}

#[derive(Debug)]
pub struct Greeter {
    ip_lookup: Box<dyn PublicIpLookup>,
    geo: Box<dyn GeoLocator>,
    weather: Box<dyn WeatherProvider>,
}

impl Greeter {
    pub fn new(
        ip_lookup: Box<dyn PublicIpLookup>,
        geo: Box<dyn GeoLocator>,
        weather: Box<dyn WeatherProvider>,
    ) -> Self {
        Self { ip_lookup, geo, weather }
    }

    /// Build a greeter talking to the real upstreams configured in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let weather = default_provider_from_config(config)?;
        let geo = IpInfoClient::new(config.geolocation_token().map(str::to_owned));

        Ok(Self::new(Box::new(IpifyClient::new()), Box::new(geo), weather))
    }

    pub async fn greet(&self, request: &GreetingRequest) -> Result<GreetingResponse> {
        let (response, _) = self.greet_with_weather(request).await?;
        Ok(response)
    }

    /// Like [`Greeter::greet`], also returning the full weather report.
    pub async fn greet_with_weather(
        &self,
        request: &GreetingRequest,
    ) -> Result<(GreetingResponse, CurrentWeather)> {
        let visitor = normalize_visitor(request.visitor_name.as_deref());

        let ip = match request.client_ip {
            Some(ip) if is_public(ip) => ip,
            other => {
                tracing::debug!(client_ip = ?other, "Client address is not public, asking ipify");
                self.ip_lookup
                    .public_ip()
                    .await
                    .context("Unable to resolve public IP address")?
            }
        };

        let location = self
            .geo
            .locate(ip)
            .await
            .with_context(|| format!("Unable to locate IP address {ip}"))?;

        let weather = self
            .weather
            .current_weather(&location.city)
            .await
            .with_context(|| format!("Unable to fetch weather details for {}", location.city))?;

        tracing::info!(
            %ip,
            city = %location.city,
            provider = %weather.provider,
            temperature_c = weather.temperature_c,
            feels_like_c = weather.feels_like_c,
            condition = %weather.condition,
            humidity_pct = weather.humidity_pct,
            wind_speed_mps = weather.wind_speed_mps,
            observed_at = %weather.observation_time,
            "Greeting visitor"
        );

        let response = GreetingResponse {
            client_ip: ip.to_string(),
            greeting: format_greeting(&visitor, weather.temperature_c, &location.city),
            location: location.city,
        };
        Ok((response, weather))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeoLocation;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::net::IpAddr;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Debug, Default)]
    struct FakeIpLookup {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PublicIpLookup for FakeIpLookup {
        async fn public_ip(&self) -> Result<IpAddr> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("198.51.100.23".parse()?)
        }
    }

    #[derive(Debug)]
    struct FakeGeo {
        city: &'static str,
    }

    #[async_trait]
    impl GeoLocator for FakeGeo {
        async fn locate(&self, ip: IpAddr) -> Result<GeoLocation> {
            Ok(GeoLocation {
                ip,
                city: self.city.to_string(),
                region: None,
                country: Some("NG".into()),
            })
        }
    }

    #[derive(Debug)]
    struct FakeWeather {
        temperature_c: Option<f64>,
    }

    #[async_trait]
    impl WeatherProvider for FakeWeather {
        async fn current_weather(&self, location: &str) -> Result<CurrentWeather> {
            let temperature_c = self.temperature_c.ok_or_else(|| anyhow!("provider down"))?;
            Ok(CurrentWeather {
                provider: "fake".into(),
                location_name: location.to_string(),
                temperature_c,
                feels_like_c: temperature_c,
                condition: "Sunny".into(),
                humidity_pct: 40,
                wind_speed_mps: 1.0,
                observation_time: Utc::now(),
            })
        }
    }

    fn greeter(calls: Arc<AtomicUsize>, temperature_c: Option<f64>) -> Greeter {
        Greeter::new(
            Box::new(FakeIpLookup { calls }),
            Box::new(FakeGeo { city: "Lagos" }),
            Box::new(FakeWeather { temperature_c }),
        )
    }

    #[test]
    fn visitor_defaults_to_guest() {
        assert_eq!(normalize_visitor(None), "Guest");
        assert_eq!(normalize_visitor(Some("   ")), "Guest");
        assert_eq!(normalize_visitor(Some(" Mark ")), "Mark");
    }

    #[test]
    fn greeting_rounds_to_one_decimal() {
        assert_eq!(
            format_greeting("Mark", 11.04, "New York"),
            "Hello, Mark! The temperature is 11.0 degrees Celsius in New York"
        );
        assert_eq!(
            format_greeting("Ada", -3.0, "Oslo"),
            "Hello, Ada! The temperature is -3.0 degrees Celsius in Oslo"
        );
    }

    #[tokio::test]
    async fn public_client_ip_is_used_directly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let greeter = greeter(calls.clone(), Some(29.46));

        let response = greeter
            .greet(&GreetingRequest {
                visitor_name: Some("Mark".into()),
                client_ip: Some("8.8.4.4".parse().unwrap()),
            })
            .await
            .unwrap();

        assert_eq!(
            response,
            GreetingResponse {
                client_ip: "8.8.4.4".into(),
                location: "Lagos".into(),
                greeting: "Hello, Mark! The temperature is 29.5 degrees Celsius in Lagos".into(),
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn private_client_ip_triggers_public_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let greeter = greeter(calls.clone(), Some(20.0));

        let response = greeter
            .greet(&GreetingRequest {
                visitor_name: None,
                client_ip: Some("127.0.0.1".parse().unwrap()),
            })
            .await
            .unwrap();

        assert_eq!(response.client_ip, "198.51.100.23");
        assert_eq!(response.greeting, "Hello, Guest! The temperature is 20.0 degrees Celsius in Lagos");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn weather_failure_aborts_with_context() {
        let greeter = greeter(Arc::default(), None);

        let err = greeter.greet(&GreetingRequest::default()).await.unwrap_err();

        let chain = format!("{err:#}");
        assert!(chain.contains("Unable to fetch weather details for Lagos"));
        assert!(chain.contains("provider down"));
    }

    #[derive(Debug)]
    struct UnreachableIpLookup;

    #[async_trait]
    impl PublicIpLookup for UnreachableIpLookup {
        async fn public_ip(&self) -> Result<IpAddr> {
            Err(anyhow!("ipify lookup request failed with status 503"))
        }
    }

    #[derive(Debug)]
    struct FailingGeo;

    #[async_trait]
    impl GeoLocator for FailingGeo {
        async fn locate(&self, _ip: IpAddr) -> Result<GeoLocation> {
            Err(anyhow!("ipinfo returned no city"))
        }
    }

    #[tokio::test]
    async fn greet_with_weather_returns_full_report() {
        let greeter = greeter(Arc::default(), Some(18.0));

        let (response, weather) = greeter
            .greet_with_weather(&GreetingRequest {
                visitor_name: Some("Ada".into()),
                client_ip: Some("8.8.8.8".parse().unwrap()),
            })
            .await
            .unwrap();

        assert_eq!(response.location, "Lagos");
        assert_eq!(weather.condition, "Sunny");
        assert_eq!(weather.humidity_pct, 40);
        assert_eq!(weather.location_name, "Lagos");
    }

    #[tokio::test]
    async fn public_ip_failure_aborts_before_geolocation() {
        let greeter = Greeter::new(
            Box::new(UnreachableIpLookup),
            Box::new(FailingGeo),
            Box::new(FakeWeather { temperature_c: Some(1.0) }),
        );

        let err = greeter.greet(&GreetingRequest::default()).await.unwrap_err();

        let chain = format!("{err:#}");
        assert!(chain.starts_with("Unable to resolve public IP address"));
        assert!(chain.contains("status 503"));
        assert!(!chain.contains("ipinfo"));
    }

    #[tokio::test]
    async fn geolocation_failure_aborts_with_context() {
        let greeter = Greeter::new(
            Box::new(FakeIpLookup::default()),
            Box::new(FailingGeo),
            Box::new(FakeWeather { temperature_c: Some(1.0) }),
        );

        let err = greeter
            .greet(&GreetingRequest {
                visitor_name: None,
                client_ip: Some("8.8.8.8".parse().unwrap()),
            })
            .await
            .unwrap_err();

        let chain = format!("{err:#}");
        assert!(chain.starts_with("Unable to locate IP address 8.8.8.8"));
        assert!(chain.contains("ipinfo returned no city"));
    }

    #[tokio::test]
    async fn bogon_answer_from_ipinfo_fails_the_greeting() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/198.51.100.23/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ip": "198.51.100.23", "bogon": true})),
            )
            .mount(&mock_server)
            .await;

        let greeter = Greeter::new(
            Box::new(FakeIpLookup::default()),
            Box::new(IpInfoClient::with_base_url(None, &mock_server.uri())),
            Box::new(FakeWeather { temperature_c: Some(1.0) }),
        );

        let err = greeter.greet(&GreetingRequest::default()).await.unwrap_err();

        let chain = format!("{err:#}");
        assert!(chain.starts_with("Unable to locate IP address 198.51.100.23"));
        assert!(chain.contains("non-public address 198.51.100.23"));
    }
}
