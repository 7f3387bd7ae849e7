//! Output target addresses
//!
//! Targets are written as `endpoint[/route]`:
//!
//! | Address        | Endpoint  | Route         |
//! |----------------|-----------|---------------|
//! | `svc`          | `svc`     | `svc`         |
//! | `svc/route`    | `svc`     | `route`       |
//! | `svc/a/b`      | `svc`     | `a/b`         |
//! | `""`           | (no target, nothing is sent) |
//!
//! For a component target the endpoint is the remote app ID and the route is
//! the method. For a stream target the endpoint is the pub/sub component and
//! the route is the topic.

use std::fmt;
use thiserror::Error;

/// Error returned for a malformed target address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// Address has a route but no endpoint (e.g. `/route`)
    #[error("target '{0}' is missing an endpoint")]
    MissingEndpoint(String),
}

/// A resolved `(endpoint, route)` destination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    endpoint: String,
    route: String,
}

impl Target {
    /// Create a target from explicit parts
    pub fn new(endpoint: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            route: route.into(),
        }
    }

    /// Parse a target address
    ///
    /// Returns `Ok(None)` for an empty (or all-whitespace) address, meaning
    /// "do not send". The route defaults to the endpoint when absent.
    ///
    /// # Example
    ///
    /// ```
    /// use rivulet_core::Target;
    ///
    /// let target = Target::parse("pricing/compute").unwrap().unwrap();
    /// assert_eq!(target.endpoint(), "pricing");
    /// assert_eq!(target.route(), "compute");
    ///
    /// assert_eq!(Target::parse("").unwrap(), None);
    /// ```
    pub fn parse(address: &str) -> Result<Option<Self>, TargetError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }

        let (endpoint, route) = match address.split_once('/') {
            Some((endpoint, route)) => (endpoint.trim(), route.trim()),
            None => (address, ""),
        };

        if endpoint.is_empty() {
            return Err(TargetError::MissingEndpoint(address.to_string()));
        }

        let route = if route.is_empty() { endpoint } else { route };
        Ok(Some(Self::new(endpoint, route)))
    }

    /// Remote app ID or pub/sub component name
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Method or topic name
    pub fn route(&self) -> &str {
        &self.route
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.endpoint, self.route)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_only_defaults_route() {
        let target = Target::parse("svc").unwrap().unwrap();
        assert_eq!(target, Target::new("svc", "svc"));
    }

    #[test]
    fn test_endpoint_and_route() {
        let target = Target::parse("svc/route").unwrap().unwrap();
        assert_eq!(target, Target::new("svc", "route"));
    }

    #[test]
    fn test_nested_route_is_kept_whole() {
        let target = Target::parse("svc/v1/orders").unwrap().unwrap();
        assert_eq!(target.route(), "v1/orders");
    }

    #[test]
    fn test_empty_address_is_no_target() {
        assert_eq!(Target::parse("").unwrap(), None);
        assert_eq!(Target::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_trailing_slash_defaults_route() {
        let target = Target::parse("svc/").unwrap().unwrap();
        assert_eq!(target.route(), "svc");
    }

    #[test]
    fn test_missing_endpoint_is_error() {
        assert_eq!(
            Target::parse("/route"),
            Err(TargetError::MissingEndpoint("/route".to_string()))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Target::new("pricing", "compute").to_string(), "pricing/compute");
    }
}
