//! Provider configuration.
//!
//! The configuration is an explicit value handed to every CRUD handler
//! through [`ProviderContext`]; there is no process-wide client.
//!
//! Each field may be set in the provider configuration block or through an
//! environment variable. Values in the configuration block take precedence.
//!
//! | Field | Environment variable |
//! |-------|----------------------|
//! | `https_host` | `DSCONFIG_PROVIDER_HTTPS_HOST` |
//! | `username` | `DSCONFIG_PROVIDER_USERNAME` |
//! | `password` | `DSCONFIG_PROVIDER_PASSWORD` |
//! | `insecure_trust_all_tls` | `DSCONFIG_PROVIDER_INSECURE_TRUST_ALL_TLS` |
//! | `product_version` | `DSCONFIG_PROVIDER_PRODUCT_VERSION` |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use crate::validation::validate;

const ENV_PREFIX: &str = "DSCONFIG_PROVIDER_";

/// Connection settings for the configuration API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the server, e.g. `https://localhost:1443`.
    pub https_host: String,
    /// Bind username.
    pub username: String,
    /// Bind password.
    pub password: String,
    /// Accept any TLS certificate presented by the server.
    #[serde(default)]
    pub insecure_trust_all_tls: bool,
    /// Version of the server product being managed.
    #[serde(default)]
    pub product_version: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("https_host", &self.https_host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure_trust_all_tls", &self.insecure_trust_all_tls)
            .field("product_version", &self.product_version)
            .finish()
    }
}

impl ProviderConfig {
    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Connection settings for the directory server configuration API")
            .with_attribute(
                "https_host",
                Attribute::required_string()
                    .with_description("URI of the server's HTTPS interface"),
            )
            .with_attribute(
                "username",
                Attribute::required_string().with_description("Username used to authenticate"),
            )
            .with_attribute(
                "password",
                Attribute::required_string()
                    .sensitive()
                    .with_description("Password used to authenticate"),
            )
            .with_attribute(
                "insecure_trust_all_tls",
                Attribute::optional_bool()
                    .with_description("Trust any certificate presented by the server"),
            )
            .with_attribute(
                "product_version",
                Attribute::optional_string().with_description("Version of the managed server"),
            )
    }

    /// Build the configuration from the provider block, falling back to the
    /// process environment.
    pub fn from_value(config: &Value) -> Result<Self, Vec<Diagnostic>> {
        Self::from_value_with_env(config, |key| std::env::var(key).ok())
    }

    /// Build the configuration, looking up missing fields with `env`.
    pub fn from_value_with_env(
        config: &Value,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Vec<Diagnostic>> {
        let mut merged = match config {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(vec![Diagnostic::error("Expected object")
                    .with_detail("The provider configuration must be an object")]);
            }
        };

        let schema = Self::schema();
        let mut diagnostics = Vec::new();
        for (name, attribute) in &schema.attributes {
            if merged.get(name).is_some_and(|v| !v.is_null()) {
                continue;
            }
            let key = format!("{}{}", ENV_PREFIX, name.to_ascii_uppercase());
            let Some(raw) = env(&key) else {
                continue;
            };
            match attribute.attr_type {
                AttributeType::Bool => match raw.parse::<bool>() {
                    Ok(b) => {
                        merged.insert(name.clone(), Value::Bool(b));
                    }
                    Err(_) => diagnostics.push(
                        Diagnostic::error(format!("Invalid value in {}", key))
                            .with_detail(format!("Expected true or false, got '{}'", raw))
                            .with_attribute(name.as_str()),
                    ),
                },
                _ => {
                    merged.insert(name.clone(), Value::String(raw));
                }
            }
        }

        merged.retain(|_, v| !v.is_null());
        let merged = Value::Object(merged);
        diagnostics.extend(validate(&schema, &merged));
        if let Some(host) = merged.get("https_host").and_then(Value::as_str) {
            if !host.starts_with("https://") {
                diagnostics.push(
                    Diagnostic::error("Invalid https_host")
                        .with_detail(format!("'{}' must start with https://", host))
                        .with_attribute("https_host"),
                );
            }
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        serde_json::from_value(merged).map_err(|e| {
            vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
        })
    }

    /// Base URL of the configuration API.
    pub fn config_api_url(&self) -> String {
        format!("{}/config/v1", self.https_host.trim_end_matches('/'))
    }
}

/// Everything a CRUD handler needs to talk to the server.
#[derive(Debug)]
pub struct ProviderContext<C> {
    /// Connection settings.
    pub config: ProviderConfig,
    /// Configuration API client built from `config`.
    pub client: C,
}

impl<C> ProviderContext<C> {
    /// Bundle a configuration with its client.
    pub fn new(config: ProviderConfig, client: C) -> Self {
        Self { config, client }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_from_value() {
        let config = ProviderConfig::from_value_with_env(
            &json!({
                "https_host": "https://localhost:1443/",
                "username": "cn=administrator",
                "password": "secret",
            }),
            no_env,
        )
        .unwrap();

        assert_eq!(config.username, "cn=administrator");
        assert!(!config.insecure_trust_all_tls);
        assert_eq!(config.product_version, None);
        assert_eq!(config.config_api_url(), "https://localhost:1443/config/v1");
    }

    #[test]
    fn test_env_fallback() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DSCONFIG_PROVIDER_USERNAME", "cn=env"),
            ("DSCONFIG_PROVIDER_PASSWORD", "from-env"),
            ("DSCONFIG_PROVIDER_INSECURE_TRUST_ALL_TLS", "true"),
            ("DSCONFIG_PROVIDER_HTTPS_HOST", "https://ignored:1443"),
        ]);
        let config = ProviderConfig::from_value_with_env(
            &json!({"https_host": "https://explicit:1443"}),
            |key| env.get(key).map(|v| v.to_string()),
        )
        .unwrap();

        assert_eq!(config.https_host, "https://explicit:1443");
        assert_eq!(config.username, "cn=env");
        assert_eq!(config.password, "from-env");
        assert!(config.insecure_trust_all_tls);
    }

    #[test]
    fn test_missing_required_fields() {
        let diagnostics = ProviderConfig::from_value_with_env(&json!({}), no_env).unwrap_err();
        let attributes: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert!(attributes.contains(&"https_host"));
        assert!(attributes.contains(&"username"));
        assert!(attributes.contains(&"password"));
    }

    #[test]
    fn test_rejects_plain_http() {
        let diagnostics = ProviderConfig::from_value_with_env(
            &json!({"https_host": "http://localhost", "username": "u", "password": "p"}),
            no_env,
        )
        .unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("https_host"));
    }

    #[test]
    fn test_invalid_bool_from_env() {
        let diagnostics = ProviderConfig::from_value_with_env(
            &json!({"https_host": "https://h", "username": "u", "password": "p"}),
            |key| (key == "DSCONFIG_PROVIDER_INSECURE_TRUST_ALL_TLS").then(|| "maybe".to_string()),
        )
        .unwrap_err();
        assert!(diagnostics[0].summary.contains("DSCONFIG_PROVIDER_INSECURE_TRUST_ALL_TLS"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ProviderConfig {
            https_host: "https://h".into(),
            username: "u".into(),
            password: "hunter2".into(),
            insecure_trust_all_tls: false,
            product_version: Some("9.3.0.0".into()),
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
