//! Merging YAML overrides onto the environment configuration.

use std::path::PathBuf;

use super::env::{self, parse_provider};
use super::yaml::{ProviderYaml, YamlConfig};
use super::{AuthApiSecret, ServerConfig, TlsConfig};

/// Build the final configuration: environment (with defaults) as the base,
/// YAML values on top.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load()?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}

fn apply_provider(
    yaml: ProviderYaml,
    api_key: &mut Option<String>,
    model: &mut String,
    voice: &mut String,
    url: &mut String,
) {
    if let Some(value) = yaml.api_key.filter(|v| !v.is_empty()) {
        *api_key = Some(value);
    }
    if let Some(value) = yaml.model {
        *model = value;
    }
    if let Some(value) = yaml.voice {
        *voice = value;
    }
    if let Some(value) = yaml.url {
        *url = value;
    }
}

fn apply_yaml(
    config: &mut ServerConfig,
    yaml: YamlConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                _ => {
                    if let (Some(cert), Some(key)) = (tls.cert_path, tls.key_path) {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    } else if tls.enabled == Some(true) {
                        return Err("server.tls.enabled requires cert_path and key_path".into());
                    }
                }
            }
        }
    }

    if let Some(realtime) = yaml.realtime {
        if let Some(provider) = realtime.provider {
            config.realtime_provider = parse_provider(&provider)?;
        }
        if let Some(timeout) = realtime.setup_timeout_seconds {
            config.realtime_setup_timeout_seconds = timeout;
        }
        if let Some(relay) = realtime.relay_tool_calls {
            config.relay_tool_calls = relay;
        }
        if let Some(gemini) = realtime.gemini {
            apply_provider(
                gemini,
                &mut config.gemini_api_key,
                &mut config.gemini_model,
                &mut config.gemini_voice,
                &mut config.gemini_live_url,
            );
        }
        if let Some(openai) = realtime.openai {
            apply_provider(
                openai,
                &mut config.openai_api_key,
                &mut config.openai_realtime_model,
                &mut config.openai_realtime_voice,
                &mut config.openai_realtime_url,
            );
        }
    }

    if let Some(path) = yaml.catalog.and_then(|c| c.path) {
        config.catalog_path = Some(PathBuf::from(path));
    }

    if let Some(auth) = yaml.auth {
        if let Some(required) = auth.required {
            config.auth_required = required;
        }
        if !auth.api_secrets.is_empty() {
            config.auth_api_secrets = auth
                .api_secrets
                .into_iter()
                .map(|entry| AuthApiSecret {
                    id: entry.id,
                    secret: entry.secret,
                })
                .collect();
        } else if let Some(secret) = auth.api_secret {
            config.auth_api_secrets = vec![AuthApiSecret {
                id: "default".to_string(),
                secret,
            }];
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if let Some(max) = security.max_websocket_connections {
            config.max_websocket_connections = Some(max);
        }
        if let Some(per_ip) = security.max_connections_per_ip {
            config.max_connections_per_ip = per_ip;
        }
    }

    Ok(())
}
