use super::BridgeConfig;
use crate::error::{BridgeError, Result};
use std::str::FromStr;

/// Apply environment overrides on top of file/default values.
///
/// `lookup` maps a variable name to its value; `BridgeConfig::load` passes
/// `std::env::var`. A value that is set but unparseable is an error.
pub fn apply_env_overrides<F>(config: &mut BridgeConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("BROKER_URL") {
        config.broker.url = v;
    }
    if let Some(v) = lookup("BROKER_TOPIC") {
        config.broker.topic = v;
    }
    if let Some(v) = lookup("BROKER_CLIENT_ID") {
        config.broker.client_id = v;
    }
    if let Some(v) = lookup("WSBRIDGE_HOST") {
        config.listener.host = v;
    }
    if let Some(v) = lookup("WSBRIDGE_PORT") {
        config.listener.port = parse("WSBRIDGE_PORT", &v)?;
    }
    if let Some(v) = lookup("WSBRIDGE_MAX_CLIENTS") {
        config.fanout.max_clients = parse("WSBRIDGE_MAX_CLIENTS", &v)?;
    }

    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BridgeError::Config(format!("{} has invalid value '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_no_overrides_keeps_values() {
        let mut config = BridgeConfig::default();
        apply_env_overrides(&mut config, lookup_from(&[])).unwrap();
        assert_eq!(config.broker.url, "mqtt://localhost:1883");
        assert_eq!(config.listener.port, 8080);
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = BridgeConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("BROKER_URL", "mqtt://192.168.0.186:1883"),
                ("BROKER_TOPIC", "esp32/temp"),
                ("BROKER_CLIENT_ID", "bridge-7"),
                ("WSBRIDGE_HOST", "127.0.0.1"),
                ("WSBRIDGE_PORT", "9090"),
                ("WSBRIDGE_MAX_CLIENTS", "12"),
            ]),
        )
        .unwrap();

        assert_eq!(config.broker.url, "mqtt://192.168.0.186:1883");
        assert_eq!(config.broker.topic, "esp32/temp");
        assert_eq!(config.broker.client_id, "bridge-7");
        assert_eq!(config.listener.bind_addr(), "127.0.0.1:9090");
        assert_eq!(config.fanout.max_clients, 12);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let mut config = BridgeConfig::default();
        let err = apply_env_overrides(&mut config, lookup_from(&[("WSBRIDGE_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
        assert!(err.to_string().contains("WSBRIDGE_PORT"));
    }
}
