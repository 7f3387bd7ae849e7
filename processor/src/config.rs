//! Configuration for rivulet processors
//!
//! Every setting is read once at startup into an immutable struct and passed
//! by value into constructors. Nothing in the processing path reads the
//! environment.
//!
//! Each struct has `from_env()` and `from_lookup(..)`; the latter takes any
//! `Fn(&str) -> Option<String>` so tests never touch process state. Empty
//! values are treated as unset.
//!
//! # Ambient variables
//!
//! | Variable                   | Default          |
//! |----------------------------|------------------|
//! | `RIVULET_METRICS_ADDR`     | `0.0.0.0:9090` (`off` disables) |
//! | `RIVULET_QUEUE_CAPACITY`   | `1024`           |
//! | `RIVULET_TRANSPORT`        | `sidecar`        |
//! | `DAPR_HTTP_PORT`           | `3500`           |
//! | `RIVULET_DISPATCH_TIMEOUT` | `5s`             |
//! | `RIVULET_LOG_LEVEL`        | `info`           |
//! | `RIVULET_LOG_FORMAT`       | `pretty`         |

use crate::expr::sanitize_identifier;
use crate::router::Targets;
use rivulet_core::Target;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Default service listen address
pub const DEFAULT_LISTEN_ADDR: &str = ":8080";

/// Default joiner window
pub const DEFAULT_WINDOW: &str = "10ms";

/// Binding name used by Channel when nothing names the stream
pub const DEFAULT_BINDING_NAME: &str = "event";

/// Missing or malformed setting
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Which transport delivers outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// HTTP to the local pub/sub sidecar
    #[default]
    Sidecar,
    /// Print each dispatch (dry run)
    Stdout,
}

/// Settings shared by both processors
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Prometheus endpoint; `None` disables metrics
    pub metrics_addr: Option<SocketAddr>,
    /// Bounded input queue capacity
    pub queue_capacity: usize,
    pub log_level: String,
    pub log_format: LogFormat,
    pub transport: TransportKind,
    /// Base URL of the sidecar HTTP API
    pub sidecar_url: String,
    /// Per-request dispatch timeout
    pub dispatch_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            metrics_addr: Some(SocketAddr::from(([0, 0, 0, 0], 9090))),
            queue_capacity: 1024,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            transport: TransportKind::Sidecar,
            sidecar_url: "http://127.0.0.1:3500".to_string(),
            dispatch_timeout: Duration::from_secs(5),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| non_empty(lookup(key));
        let defaults = Self::default();

        let metrics_addr = match get("RIVULET_METRICS_ADDR") {
            None => defaults.metrics_addr,
            Some(v) if v.eq_ignore_ascii_case("off") => None,
            Some(v) => Some(parse_listen_addr("RIVULET_METRICS_ADDR", &v)?),
        };

        let queue_capacity = match get("RIVULET_QUEUE_CAPACITY") {
            None => defaults.queue_capacity,
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::invalid(
                        "RIVULET_QUEUE_CAPACITY",
                        format!("'{v}' is not a positive integer"),
                    ))
                }
            },
        };

        let log_format = match get("RIVULET_LOG_FORMAT").as_deref() {
            None => defaults.log_format,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(v) => {
                return Err(ConfigError::invalid(
                    "RIVULET_LOG_FORMAT",
                    format!("'{v}' (expected json or pretty)"),
                ))
            }
        };

        let transport = match get("RIVULET_TRANSPORT").as_deref() {
            None => defaults.transport,
            Some(v) if v.eq_ignore_ascii_case("sidecar") => TransportKind::Sidecar,
            Some(v) if v.eq_ignore_ascii_case("stdout") => TransportKind::Stdout,
            Some(v) => {
                return Err(ConfigError::invalid(
                    "RIVULET_TRANSPORT",
                    format!("'{v}' (expected sidecar or stdout)"),
                ))
            }
        };

        let sidecar_url = match get("DAPR_HTTP_PORT") {
            None => defaults.sidecar_url,
            Some(v) => {
                let port: u16 = v.parse().map_err(|_| {
                    ConfigError::invalid("DAPR_HTTP_PORT", format!("'{v}' is not a port"))
                })?;
                format!("http://127.0.0.1:{port}")
            }
        };

        let dispatch_timeout = match get("RIVULET_DISPATCH_TIMEOUT") {
            None => defaults.dispatch_timeout,
            Some(v) => positive_duration("RIVULET_DISPATCH_TIMEOUT", &v)?,
        };

        Ok(Self {
            metrics_addr,
            queue_capacity,
            log_level: get("RIVULET_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            transport,
            sidecar_url,
            dispatch_timeout,
        })
    }
}

/// A topic subscription, written `pubsub|topic|route`
///
/// The route defaults to the topic name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub pubsub: String,
    pub topic: String,
    pub route: String,
}

impl StreamInfo {
    pub fn parse(key: &str, value: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = value.split('|').map(str::trim).collect();
        let (pubsub, topic, route) = match parts.as_slice() {
            [pubsub, topic] => (*pubsub, *topic, ""),
            [pubsub, topic, route] => (*pubsub, *topic, *route),
            _ => {
                return Err(ConfigError::invalid(
                    key,
                    format!("'{value}' (expected pubsub|topic|route)"),
                ))
            }
        };
        if pubsub.is_empty() || topic.is_empty() {
            return Err(ConfigError::invalid(
                key,
                format!("'{value}' has an empty pubsub or topic"),
            ));
        }

        let route = route.trim_start_matches('/');
        let route = if route.is_empty() { topic } else { route };
        Ok(Self {
            pubsub: pubsub.to_string(),
            topic: topic.to_string(),
            route: route.to_string(),
        })
    }

    /// HTTP path deliveries for this stream arrive on
    pub fn path(&self) -> String {
        format!("/{}", self.route)
    }

    /// Expression variable name for this stream's events
    pub fn binding_name(&self) -> String {
        sanitize_identifier(&self.topic)
    }
}

/// Channel processing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// Route every selected payload immediately
    #[default]
    Stream,
    /// Hold selected payloads behind a trigger gate
    Aggregate,
}

/// Channel processor settings (`CHANNEL_*`)
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub listen_addr: SocketAddr,
    /// Path segment for push-style invocations
    pub service_route: String,
    /// Optional topic subscription in addition to push invocation
    pub source: Option<StreamInfo>,
    /// Variable name the event is bound to in expressions
    pub binding_name: String,
    pub mode: ChannelMode,
    pub trigger_expr: Option<String>,
    pub filter_expr: Option<String>,
    pub select_expr: Option<String>,
    pub targets: Targets,
}

impl ChannelConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| non_empty(lookup(key));

        let listen_addr = parse_listen_addr(
            "CHANNEL_SERVICE_PORT",
            &get("CHANNEL_SERVICE_PORT").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        )?;

        let service_route = get("CHANNEL_SERVICE_ROUTE")
            .or_else(|| get("APP_ID"))
            .map(|r| r.trim_start_matches('/').to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ConfigError::Missing("CHANNEL_SERVICE_ROUTE (or APP_ID)".to_string()))?;

        let source = get("CHANNEL_STREAM_INFO")
            .map(|v| StreamInfo::parse("CHANNEL_STREAM_INFO", &v))
            .transpose()?;

        let binding_name = get("CHANNEL_STREAM_NAME")
            .map(|n| sanitize_identifier(&n))
            .or_else(|| source.as_ref().map(StreamInfo::binding_name))
            .unwrap_or_else(|| DEFAULT_BINDING_NAME.to_string());

        let mode = match get("CHANNEL_MODE").as_deref() {
            None => ChannelMode::Stream,
            Some(v) if v.eq_ignore_ascii_case("stream") => ChannelMode::Stream,
            Some(v) if v.eq_ignore_ascii_case("aggregate") => ChannelMode::Aggregate,
            Some(v) => {
                return Err(ConfigError::invalid(
                    "CHANNEL_MODE",
                    format!("'{v}' (expected stream or aggregate)"),
                ))
            }
        };

        let mut routes = vec![service_route.as_str()];
        if let Some(info) = &source {
            routes.push(info.route.as_str());
        }
        check_routes("CHANNEL_STREAM_INFO", &routes)?;

        let targets = parse_targets(&get, "CHANNEL_TARGET", "CHANNEL_STREAM_TARGET")?;

        Ok(Self {
            listen_addr,
            service_route,
            source,
            binding_name,
            mode,
            trigger_expr: get("CHANNEL_AGGREGATE_TRIGGER"),
            filter_expr: get("CHANNEL_SELECT_FILTER_EXPRESSION"),
            select_expr: get("CHANNEL_SELECT_DATA_EXPRESSION"),
            targets,
        })
    }
}

/// Joiner processor settings (`JOINER_*`)
#[derive(Debug, Clone, PartialEq)]
pub struct JoinerConfig {
    pub listen_addr: SocketAddr,
    /// The two joined streams, in configuration order
    pub streams: [StreamInfo; 2],
    pub window: Duration,
    /// Without a filter, `true` collects no pairs and `false` collects all
    pub require_filter: bool,
    pub filter_expr: Option<String>,
    pub select_expr: Option<String>,
    pub targets: Targets,
}

impl JoinerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| non_empty(lookup(key));

        let listen_addr = parse_listen_addr(
            "JOINER_SERVICE_PORT",
            &get("JOINER_SERVICE_PORT").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        )?;

        let streams = match get("JOINER_STREAMS_INFO") {
            Some(combined) => combined
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| StreamInfo::parse("JOINER_STREAMS_INFO", s))
                .collect::<Result<Vec<_>, _>>()?,
            None => {
                let first = get("JOINER_STREAM0_INFO")
                    .ok_or_else(|| ConfigError::Missing("JOINER_STREAM0_INFO".to_string()))?;
                let second = get("JOINER_STREAM1_INFO")
                    .ok_or_else(|| ConfigError::Missing("JOINER_STREAM1_INFO".to_string()))?;
                vec![
                    StreamInfo::parse("JOINER_STREAM0_INFO", &first)?,
                    StreamInfo::parse("JOINER_STREAM1_INFO", &second)?,
                ]
            }
        };
        let streams: [StreamInfo; 2] = streams.try_into().map_err(|v: Vec<StreamInfo>| {
            ConfigError::invalid(
                "JOINER_STREAMS_INFO",
                format!("exactly two streams required, found {}", v.len()),
            )
        })?;
        if streams[0].topic == streams[1].topic {
            return Err(ConfigError::invalid(
                "JOINER_STREAMS_INFO",
                format!("both streams use topic '{}'", streams[0].topic),
            ));
        }
        if streams[0].binding_name() == streams[1].binding_name() {
            return Err(ConfigError::invalid(
                "JOINER_STREAMS_INFO",
                format!(
                    "topics '{}' and '{}' bind to the same name",
                    streams[0].topic, streams[1].topic
                ),
            ));
        }

        check_routes(
            "JOINER_STREAMS_INFO",
            &[streams[0].route.as_str(), streams[1].route.as_str()],
        )?;

        let window = positive_duration(
            "JOINER_WINDOW_SIZE",
            &get("JOINER_WINDOW_SIZE").unwrap_or_else(|| DEFAULT_WINDOW.to_string()),
        )?;

        let require_filter = match get("JOINER_REQUIRE_FILTER") {
            None => true,
            Some(v) => parse_bool("JOINER_REQUIRE_FILTER", &v)?,
        };

        let targets = parse_targets(&get, "JOINER_TARGET", "JOINER_STREAM_TARGET")?;

        Ok(Self {
            listen_addr,
            streams,
            window,
            require_filter,
            filter_expr: get("JOINER_FILTER_EXPRESSION"),
            select_expr: get("JOINER_DATA_EXPRESSION"),
            targets,
        })
    }

    /// Topic names of both streams
    pub fn topics(&self) -> [&str; 2] {
        [&self.streams[0].topic, &self.streams[1].topic]
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Paths the delivery surface serves itself
const RESERVED_ROUTES: &[&str] = &["health", "dapr/subscribe"];

fn check_routes(key: &str, routes: &[&str]) -> Result<(), ConfigError> {
    for (i, route) in routes.iter().enumerate() {
        if RESERVED_ROUTES.contains(route) {
            return Err(ConfigError::invalid(key, format!("route '{route}' is reserved")));
        }
        if routes[..i].contains(route) {
            return Err(ConfigError::invalid(key, format!("route '{route}' is used twice")));
        }
    }
    Ok(())
}

fn parse_targets(
    get: &impl Fn(&str) -> Option<String>,
    component_key: &str,
    stream_key: &str,
) -> Result<Targets, ConfigError> {
    let parse = |key: &str| -> Result<Option<Target>, ConfigError> {
        match get(key) {
            Some(address) => {
                Target::parse(&address).map_err(|e| ConfigError::invalid(key, e.to_string()))
            }
            None => Ok(None),
        }
    };
    let targets = Targets {
        component: parse(component_key)?,
        stream: parse(stream_key)?,
    };
    if targets.is_empty() {
        return Err(ConfigError::Missing(format!(
            "{component_key} or {stream_key}"
        )));
    }
    Ok(targets)
}

/// Parse `host:port`, `:port` or a bare port
pub fn parse_listen_addr(key: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    let full = if let Some(port) = value.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else if value.chars().all(|c| c.is_ascii_digit()) {
        format!("0.0.0.0:{value}")
    } else {
        value.to_string()
    };
    full.parse()
        .map_err(|_| ConfigError::invalid(key, format!("'{value}' is not a listen address")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("'{value}' is not a boolean"))),
    }
}

fn positive_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let duration = parse_duration(value).map_err(|msg| ConfigError::invalid(key, msg))?;
    if duration.is_zero() {
        return Err(ConfigError::invalid(key, "duration must be positive"));
    }
    Ok(duration)
}

/// Parse a duration string such as `300ms`, `1m30s`, `1.5h` or `250us`
///
/// Whole-number forms go straight to `humantime`. Segments with a fraction
/// (`1.5s`) are rewritten as whole nanoseconds first. A bare `0` is zero and
/// negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err(format!("'{input}' is negative"));
    }
    let s = s.strip_prefix('+').unwrap_or(s).replace(['µ', 'μ'], "u");
    let s = if s.contains('.') {
        expand_fractions(&s).map_err(|msg| format!("'{input}': {msg}"))?
    } else {
        s
    };
    humantime::parse_duration(&s).map_err(|e| format!("'{input}': {e}"))
}

fn expand_fractions(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len() + 16);
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let unit_end = rest[num_end..]
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .map_or(rest.len(), |i| num_end + i);
        let number = &rest[..num_end];

        if number.contains('.') {
            let unit = rest[num_end..unit_end].trim();
            let scale = match unit {
                "ns" => 1.0,
                "us" => 1e3,
                "ms" => 1e6,
                "s" => 1e9,
                "m" => 60e9,
                "h" => 3600e9,
                "" => return Err("missing unit".to_string()),
                unit => return Err(format!("unit '{unit}' does not take a fraction")),
            };
            let value: f64 = number
                .parse()
                .map_err(|_| format!("bad number '{number}'"))?;
            let nanos = (value * scale).round();
            if !nanos.is_finite() || nanos > u64::MAX as f64 {
                return Err("out of range".to_string());
            }
            out.push_str(&format!("{}ns ", nanos as u64));
        } else {
            out.push_str(&rest[..unit_end]);
        }
        rest = &rest[unit_end..];
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    // ==========================================================================
    // Durations
    // ==========================================================================

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("10ms").unwrap(), Duration::from_millis(10));
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_compound_and_fractional() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("1.5h30m").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("0.25ms").unwrap(), Duration::from_micros(250));
    }

    #[test]
    fn test_parse_duration_accepts_humantime_forms() {
        assert_eq!(parse_duration("2h 37min").unwrap(), Duration::from_secs(9420));
        assert_eq!(parse_duration("5sec").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("40µs").unwrap(), Duration::from_micros(40));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("1.5").is_err());
        assert!(parse_duration("1.5d").is_err());
    }

    // ==========================================================================
    // Runtime
    // ==========================================================================

    #[test]
    fn test_runtime_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_runtime_overrides() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("RIVULET_METRICS_ADDR", "off"),
            ("RIVULET_QUEUE_CAPACITY", "2000"),
            ("RIVULET_TRANSPORT", "stdout"),
            ("RIVULET_LOG_FORMAT", "json"),
            ("DAPR_HTTP_PORT", "3600"),
            ("RIVULET_DISPATCH_TIMEOUT", "250ms"),
        ]))
        .unwrap();
        assert_eq!(config.metrics_addr, None);
        assert_eq!(config.queue_capacity, 2000);
        assert_eq!(config.transport, TransportKind::Stdout);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.sidecar_url, "http://127.0.0.1:3600");
        assert_eq!(config.dispatch_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_runtime_rejects_zero_capacity() {
        assert!(matches!(
            RuntimeConfig::from_lookup(lookup(&[("RIVULET_QUEUE_CAPACITY", "0")])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_listen_addr_shorthand() {
        assert_eq!(
            parse_listen_addr("k", ":8080").unwrap(),
            SocketAddr::from(([0, 0, 0, 0], 8080))
        );
        assert_eq!(
            parse_listen_addr("k", "9000").unwrap(),
            SocketAddr::from(([0, 0, 0, 0], 9000))
        );
        assert_eq!(
            parse_listen_addr("k", "127.0.0.1:7000").unwrap(),
            SocketAddr::from(([127, 0, 0, 1], 7000))
        );
        assert!(parse_listen_addr("k", "nowhere").is_err());
    }

    // ==========================================================================
    // Streams
    // ==========================================================================

    #[test]
    fn test_stream_info() {
        let info = StreamInfo::parse("k", "pubsub|order-events|/orders").unwrap();
        assert_eq!(info.pubsub, "pubsub");
        assert_eq!(info.topic, "order-events");
        assert_eq!(info.path(), "/orders");
        assert_eq!(info.binding_name(), "order_events");
    }

    #[test]
    fn test_stream_info_route_defaults_to_topic() {
        let info = StreamInfo::parse("k", "pubsub|orders").unwrap();
        assert_eq!(info.route, "orders");
        let info = StreamInfo::parse("k", "pubsub|orders|").unwrap();
        assert_eq!(info.route, "orders");
    }

    #[test]
    fn test_stream_info_rejects_malformed() {
        assert!(StreamInfo::parse("k", "orders").is_err());
        assert!(StreamInfo::parse("k", "|orders|x").is_err());
        assert!(StreamInfo::parse("k", "a|b|c|d").is_err());
    }

    // ==========================================================================
    // Channel
    // ==========================================================================

    #[test]
    fn test_channel_minimal() {
        let config = ChannelConfig::from_lookup(lookup(&[
            ("APP_ID", "channel-1"),
            ("CHANNEL_TARGET", "pricing/compute"),
        ]))
        .unwrap();
        assert_eq!(config.listen_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.service_route, "channel-1");
        assert_eq!(config.binding_name, "event");
        assert_eq!(config.mode, ChannelMode::Stream);
        assert_eq!(
            config.targets.component,
            Some(Target::new("pricing", "compute"))
        );
        assert_eq!(config.targets.stream, None);
        assert_eq!(config.filter_expr, None);
    }

    #[test]
    fn test_channel_binding_name_from_stream() {
        let config = ChannelConfig::from_lookup(lookup(&[
            ("CHANNEL_SERVICE_ROUTE", "/in"),
            ("CHANNEL_STREAM_INFO", "pubsub|order-events"),
            ("CHANNEL_STREAM_TARGET", "pubsub/priced"),
        ]))
        .unwrap();
        assert_eq!(config.service_route, "in");
        assert_eq!(config.binding_name, "order_events");

        let config = ChannelConfig::from_lookup(lookup(&[
            ("CHANNEL_SERVICE_ROUTE", "in"),
            ("CHANNEL_STREAM_INFO", "pubsub|order-events"),
            ("CHANNEL_STREAM_NAME", "orders"),
            ("CHANNEL_STREAM_TARGET", "pubsub/priced"),
        ]))
        .unwrap();
        assert_eq!(config.binding_name, "orders");
    }

    #[test]
    fn test_channel_requires_a_target() {
        assert_eq!(
            ChannelConfig::from_lookup(lookup(&[("APP_ID", "c")])),
            Err(ConfigError::Missing(
                "CHANNEL_TARGET or CHANNEL_STREAM_TARGET".to_string()
            ))
        );
    }

    #[test]
    fn test_channel_requires_a_route() {
        assert!(matches!(
            ChannelConfig::from_lookup(lookup(&[("CHANNEL_TARGET", "svc")])),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_channel_rejects_route_collisions() {
        assert!(ChannelConfig::from_lookup(lookup(&[
            ("CHANNEL_SERVICE_ROUTE", "orders"),
            ("CHANNEL_STREAM_INFO", "pubsub|orders"),
            ("CHANNEL_TARGET", "svc"),
        ]))
        .is_err());
        assert!(ChannelConfig::from_lookup(lookup(&[
            ("CHANNEL_SERVICE_ROUTE", "health"),
            ("CHANNEL_TARGET", "svc"),
        ]))
        .is_err());
    }

    #[test]
    fn test_channel_aggregate_mode() {
        let config = ChannelConfig::from_lookup(lookup(&[
            ("APP_ID", "c"),
            ("CHANNEL_TARGET", "svc"),
            ("CHANNEL_MODE", "aggregate"),
            ("CHANNEL_AGGREGATE_TRIGGER", "trigger.count >= 10"),
        ]))
        .unwrap();
        assert_eq!(config.mode, ChannelMode::Aggregate);
        assert_eq!(config.trigger_expr.as_deref(), Some("trigger.count >= 10"));

        assert!(ChannelConfig::from_lookup(lookup(&[
            ("APP_ID", "c"),
            ("CHANNEL_TARGET", "svc"),
            ("CHANNEL_MODE", "batch"),
        ]))
        .is_err());
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = ChannelConfig::from_lookup(lookup(&[
            ("APP_ID", "c"),
            ("CHANNEL_TARGET", "svc"),
            ("CHANNEL_STREAM_TARGET", "  "),
            ("CHANNEL_SELECT_FILTER_EXPRESSION", ""),
        ]))
        .unwrap();
        assert_eq!(config.targets.stream, None);
        assert_eq!(config.filter_expr, None);
    }

    // ==========================================================================
    // Joiner
    // ==========================================================================

    #[test]
    fn test_joiner_defaults() {
        let config = JoinerConfig::from_lookup(lookup(&[
            ("JOINER_STREAM0_INFO", "pubsub|A"),
            ("JOINER_STREAM1_INFO", "pubsub|B"),
            ("JOINER_TARGET", "sink"),
        ]))
        .unwrap();
        assert_eq!(config.topics(), ["A", "B"]);
        assert_eq!(config.window, Duration::from_millis(10));
        assert!(config.require_filter);
        assert_eq!(config.targets.component, Some(Target::new("sink", "sink")));
    }

    #[test]
    fn test_joiner_combined_streams() {
        let config = JoinerConfig::from_lookup(lookup(&[
            ("JOINER_STREAMS_INFO", "ps|A|a-route; ps|B|b-route"),
            ("JOINER_STREAM_TARGET", "ps/joined"),
            ("JOINER_WINDOW_SIZE", "50ms"),
            ("JOINER_REQUIRE_FILTER", "false"),
        ]))
        .unwrap();
        assert_eq!(config.streams[1].path(), "/b-route");
        assert_eq!(config.window, Duration::from_millis(50));
        assert!(!config.require_filter);
    }

    #[test]
    fn test_joiner_rejects_duplicate_topics() {
        assert!(matches!(
            JoinerConfig::from_lookup(lookup(&[
                ("JOINER_STREAMS_INFO", "ps|A;other|A"),
                ("JOINER_TARGET", "sink"),
            ])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_joiner_rejects_colliding_binding_names() {
        assert!(JoinerConfig::from_lookup(lookup(&[
            ("JOINER_STREAMS_INFO", "ps|a-b;ps|a.b"),
            ("JOINER_TARGET", "sink"),
        ]))
        .is_err());
    }

    #[test]
    fn test_joiner_rejects_shared_route() {
        assert!(JoinerConfig::from_lookup(lookup(&[
            ("JOINER_STREAMS_INFO", "ps|A|in;ps|B|in"),
            ("JOINER_TARGET", "sink"),
        ]))
        .is_err());
    }

    #[test]
    fn test_joiner_rejects_wrong_stream_count() {
        assert!(JoinerConfig::from_lookup(lookup(&[
            ("JOINER_STREAMS_INFO", "ps|A;ps|B;ps|C"),
            ("JOINER_TARGET", "sink"),
        ]))
        .is_err());
    }

    #[test]
    fn test_joiner_missing_stream() {
        assert_eq!(
            JoinerConfig::from_lookup(lookup(&[
                ("JOINER_STREAM0_INFO", "ps|A"),
                ("JOINER_TARGET", "sink"),
            ])),
            Err(ConfigError::Missing("JOINER_STREAM1_INFO".to_string()))
        );
    }

    #[test]
    fn test_joiner_rejects_zero_window() {
        assert!(matches!(
            JoinerConfig::from_lookup(lookup(&[
                ("JOINER_STREAM0_INFO", "ps|A"),
                ("JOINER_STREAM1_INFO", "ps|B"),
                ("JOINER_TARGET", "sink"),
                ("JOINER_WINDOW_SIZE", "0s"),
            ])),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
