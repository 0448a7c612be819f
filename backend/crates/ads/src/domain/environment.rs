//! Environment Resolver
//!
//! Maps a deployment environment and an anonymity requirement to the
//! canonical request host. Every environment owns its own constant host set;
//! hosts are never derived from one another at runtime, so a staging request
//! cannot end up on a production host.

use crate::error::AdsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment environment, fixed for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    Staging,
    Development,
}

/// Whether a request may carry account-identifying context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonymityClass {
    #[default]
    Anonymous,
    NonAnonymous,
}

struct EnvironmentHosts {
    anonymous: &'static str,
    non_anonymous: &'static str,
}

const PRODUCTION_HOSTS: EnvironmentHosts = EnvironmentHosts {
    anonymous: "https://ads-serve.brave.com",
    non_anonymous: "https://mywallet.ads.brave.com",
};

const STAGING_HOSTS: EnvironmentHosts = EnvironmentHosts {
    anonymous: "https://ads-serve.bravesoftware.com",
    non_anonymous: "https://mywallet.ads.bravesoftware.com",
};

const DEVELOPMENT_HOSTS: EnvironmentHosts = EnvironmentHosts {
    anonymous: "https://ads-serve.brave.software",
    non_anonymous: "https://mywallet.ads.brave.software",
};

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Production,
        Environment::Staging,
        Environment::Development,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
        }
    }

    const fn hosts(&self) -> &'static EnvironmentHosts {
        match self {
            Environment::Production => &PRODUCTION_HOSTS,
            Environment::Staging => &STAGING_HOSTS,
            Environment::Development => &DEVELOPMENT_HOSTS,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            _ => Err(AdsError::InvalidEnvironment(s.to_string())),
        }
    }
}

impl AnonymityClass {
    pub const ALL: [AnonymityClass; 2] = [AnonymityClass::Anonymous, AnonymityClass::NonAnonymous];

    pub const fn as_str(&self) -> &'static str {
        match self {
            AnonymityClass::Anonymous => "anonymous",
            AnonymityClass::NonAnonymous => "non_anonymous",
        }
    }
}

/// Canonical origin for `environment` and `anonymity`
pub const fn resolve_host(environment: Environment, anonymity: AnonymityClass) -> &'static str {
    let hosts = environment.hosts();
    match anonymity {
        AnonymityClass::Anonymous => hosts.anonymous,
        AnonymityClass::NonAnonymous => hosts.non_anonymous,
    }
}
