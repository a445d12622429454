use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Policy dials for every evaluator in the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduling: SchedulingPolicy,
    pub workload: WorkloadPolicy,
    pub coverage: CoveragePolicy,
    pub evv: EvvPolicy,
    pub distance: DistancePolicy,
}

impl EngineConfig {
    /// Defaults overridden by any `HOMECARE_*` variables present in the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = parse_var("HOMECARE_SUGGESTION_THRESHOLD")? {
            config.scheduling.suggestion_threshold = value;
        }
        if let Some(value) = parse_var("HOMECARE_MAX_SUGGESTIONS")? {
            config.scheduling.max_suggestions = value;
            config.coverage.max_candidates = value;
        }
        if let Some(value) = parse_var::<f64>("HOMECARE_WORKLOAD_TOLERANCE")? {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    variable: "HOMECARE_WORKLOAD_TOLERANCE",
                    value: value.to_string(),
                });
            }
            config.workload.overload_tolerance = value;
            config.workload.underutilization_tolerance = value;
        }
        if let Some(value) = parse_var::<i64>("HOMECARE_EVV_GRACE_MINUTES")? {
            if value < 0 {
                return Err(ConfigError::InvalidValue {
                    variable: "HOMECARE_EVV_GRACE_MINUTES",
                    value: value.to_string(),
                });
            }
            config.evv.late_arrival_grace_minutes = value;
            config.evv.early_departure_grace_minutes = value;
        }
        if let Some(value) = non_negative_var("HOMECARE_DURATION_TOLERANCE_HOURS")? {
            config.evv.duration_tolerance_hours = value;
        }
        if let Some(value) = non_negative_var("HOMECARE_GEOFENCE_RADIUS_METERS")? {
            config.evv.geofence_radius_meters = value;
        }
        if let Some(value) = non_negative_var("HOMECARE_MAX_GPS_ACCURACY_METERS")? {
            config.evv.max_accuracy_meters = value;
        }
        if let Ok(raw) = env::var("HOMECARE_DISTANCE_ESTIMATOR") {
            config.distance.estimator = match raw.trim().to_ascii_lowercase().as_str() {
                "noop" | "address" | "placeholder" => DistanceEstimatorKind::NoOp,
                "haversine" => DistanceEstimatorKind::Haversine,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        variable: "HOMECARE_DISTANCE_ESTIMATOR",
                        value: raw,
                    })
                }
            };
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(variable: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                variable,
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}

/// Finite, non-negative float override.
fn non_negative_var(variable: &'static str) -> Result<Option<f64>, ConfigError> {
    match parse_var::<f64>(variable)? {
        Some(value) if !value.is_finite() || value < 0.0 => Err(ConfigError::InvalidValue {
            variable,
            value: value.to_string(),
        }),
        other => Ok(other),
    }
}

/// Weights and limits for ranking caregivers against an open client need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingPolicy {
    pub base_score: i32,
    pub unavailable_penalty: i32,
    pub same_day_penalty: i32,
    pub skilled_bonus: i32,
    /// The best candidate must score strictly above this for any suggestion to be made.
    pub suggestion_threshold: i32,
    pub max_suggestions: usize,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            base_score: 100,
            unavailable_penalty: 40,
            same_day_penalty: 30,
            skilled_bonus: 10,
            suggestion_threshold: 50,
            max_suggestions: 3,
        }
    }
}

/// Fractional deviation from mean scheduled hours before a caregiver is flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadPolicy {
    pub overload_tolerance: f64,
    pub underutilization_tolerance: f64,
}

impl Default for WorkloadPolicy {
    fn default() -> Self {
        Self {
            overload_tolerance: 0.2,
            underutilization_tolerance: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoveragePolicy {
    pub high_severity_hours: i64,
    pub medium_severity_hours: i64,
    pub max_candidates: usize,
}

impl Default for CoveragePolicy {
    fn default() -> Self {
        Self {
            high_severity_hours: 24,
            medium_severity_hours: 72,
            max_candidates: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvvPolicy {
    pub late_arrival_grace_minutes: i64,
    pub early_departure_grace_minutes: i64,
    pub duration_tolerance_hours: f64,
    pub geofence_radius_meters: f64,
    /// Largest reported GPS accuracy accepted for a clock event. Coarser fixes are rejected, and
    /// the accuracy credited against the radius never exceeds this.
    pub max_accuracy_meters: f64,
    /// Append a geofence exception at clock-out when either fix fell outside the radius.
    pub flag_geofence: bool,
}

impl Default for EvvPolicy {
    fn default() -> Self {
        Self {
            late_arrival_grace_minutes: 15,
            early_departure_grace_minutes: 15,
            duration_tolerance_hours: 0.5,
            geofence_radius_meters: 150.0,
            max_accuracy_meters: 100.0,
            flag_geofence: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceEstimatorKind {
    NoOp,
    Haversine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistancePolicy {
    pub estimator: DistanceEstimatorKind,
    pub penalty_per_km: f64,
    pub max_penalty: i32,
}

impl Default for DistancePolicy {
    fn default() -> Self {
        Self {
            estimator: DistanceEstimatorKind::NoOp,
            penalty_per_km: 1.0,
            max_penalty: 30,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue {
        variable: &'static str,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { variable, value } => {
                write!(f, "{variable} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "HOMECARE_SUGGESTION_THRESHOLD",
            "HOMECARE_MAX_SUGGESTIONS",
            "HOMECARE_WORKLOAD_TOLERANCE",
            "HOMECARE_EVV_GRACE_MINUTES",
            "HOMECARE_DURATION_TOLERANCE_HOURS",
            "HOMECARE_GEOFENCE_RADIUS_METERS",
            "HOMECARE_MAX_GPS_ACCURACY_METERS",
            "HOMECARE_DISTANCE_ESTIMATOR",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.scheduling.suggestion_threshold, 50);
        assert_eq!(config.engine.evv.late_arrival_grace_minutes, 15);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn engine_overrides_apply_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("HOMECARE_WORKLOAD_TOLERANCE", "0.35");
        env::set_var("HOMECARE_DISTANCE_ESTIMATOR", "Haversine");
        env::set_var("HOMECARE_MAX_SUGGESTIONS", "5");

        let engine = EngineConfig::from_env().expect("engine config loads");
        assert_eq!(engine.workload.overload_tolerance, 0.35);
        assert_eq!(engine.workload.underutilization_tolerance, 0.35);
        assert_eq!(engine.distance.estimator, DistanceEstimatorKind::Haversine);
        assert_eq!(engine.scheduling.max_suggestions, 5);
        assert_eq!(engine.coverage.max_candidates, 5);
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_tolerance() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("HOMECARE_WORKLOAD_TOLERANCE", "1.5");

        match EngineConfig::from_env() {
            Err(ConfigError::InvalidValue { variable, .. }) => {
                assert_eq!(variable, "HOMECARE_WORKLOAD_TOLERANCE")
            }
            other => panic!("expected invalid value, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_negative_or_nan_evv_dials() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        for (variable, raw) in [
            ("HOMECARE_GEOFENCE_RADIUS_METERS", "-5"),
            ("HOMECARE_GEOFENCE_RADIUS_METERS", "NaN"),
            ("HOMECARE_DURATION_TOLERANCE_HOURS", "-0.5"),
            ("HOMECARE_DURATION_TOLERANCE_HOURS", "inf"),
            ("HOMECARE_EVV_GRACE_MINUTES", "-1"),
            ("HOMECARE_MAX_GPS_ACCURACY_METERS", "-10"),
        ] {
            reset_env();
            env::set_var(variable, raw);
            match EngineConfig::from_env() {
                Err(ConfigError::InvalidValue { variable: found, .. }) => {
                    assert_eq!(found, variable, "{variable}={raw}")
                }
                other => panic!("expected {variable}={raw} to be rejected, got {other:?}"),
            }
        }
        reset_env();
    }

    #[test]
    fn accepts_zero_evv_dials() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("HOMECARE_GEOFENCE_RADIUS_METERS", "0");
        env::set_var("HOMECARE_EVV_GRACE_MINUTES", "0");
        env::set_var("HOMECARE_MAX_GPS_ACCURACY_METERS", "25");

        let engine = EngineConfig::from_env().expect("engine config loads");
        assert_eq!(engine.evv.geofence_radius_meters, 0.0);
        assert_eq!(engine.evv.late_arrival_grace_minutes, 0);
        assert_eq!(engine.evv.max_accuracy_meters, 25.0);
        reset_env();
    }

    #[test]
    fn rejects_unknown_distance_estimator() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("HOMECARE_DISTANCE_ESTIMATOR", "manhattan");

        assert!(matches!(
            EngineConfig::from_env(),
            Err(ConfigError::InvalidValue {
                variable: "HOMECARE_DISTANCE_ESTIMATOR",
                ..
            })
        ));
        reset_env();
    }
}
