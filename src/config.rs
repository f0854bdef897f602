use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub relay_port: u16,
    /// Base URL the main service uses to reach the relay's /notify endpoint.
    pub relay_url: String,
    /// Base URL the relay uses for persistence callbacks into the main service.
    pub service_url: String,
    pub log_level: String,
    pub delivery_radius_km: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            relay_port: parse_or_default("RELAY_PORT", 4000)?,
            relay_url: env::var("RELAY_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            service_url: env::var("SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            delivery_radius_km: parse_or_default("DELIVERY_RADIUS_KM", 5.0)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
