//! Connection configuration.

use std::path::PathBuf;

use crate::protocol::HttpError;

/// Options governing a [`HttpConnection`](super::HttpConnection).
///
/// `auto_reconnect` defaults to on: a send on a closed connection opens
/// a fresh transport instead of failing. Setting either certificate
/// option asks the connector for a TLS stream.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub auto_reconnect: bool,
    pub key_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { auto_reconnect: true, key_file: None, cert_file: None }
    }
}

impl ClientConfig {
    /// Builds a configuration from `(name, value)` option pairs, the
    /// form they arrive in from external configuration sources.
    ///
    /// # Errors
    ///
    /// [`HttpError::IllegalConfiguration`] naming the offending option
    /// when a name is unknown or a value does not parse.
    pub fn from_options<'a, I>(options: I) -> Result<Self, HttpError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (name, value) in options {
            match name {
                "auto_reconnect" => {
                    config.auto_reconnect = value
                        .parse()
                        .map_err(|_| HttpError::illegal_configuration(format!("{name}={value}")))?;
                }
                "key_file" => config.key_file = Some(PathBuf::from(value)),
                "cert_file" => config.cert_file = Some(PathBuf::from(value)),
                _ => return Err(HttpError::illegal_configuration(name)),
            }
        }
        Ok(config)
    }

    /// True when certificate options require an encrypted transport.
    pub fn wants_tls(&self) -> bool {
        self.key_file.is_some() || self.cert_file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert!(config.auto_reconnect);
        assert!(!config.wants_tls());
    }

    #[test]
    fn options_are_applied() {
        let config = ClientConfig::from_options([
            ("auto_reconnect", "false"),
            ("cert_file", "/etc/pki/client.pem"),
        ])
        .unwrap();

        assert!(!config.auto_reconnect);
        assert_eq!(config.cert_file.as_deref(), Some("/etc/pki/client.pem".as_ref()));
        assert!(config.wants_tls());
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = ClientConfig::from_options([("proxy", "http://proxy:3128")]).unwrap_err();
        assert!(matches!(err, HttpError::IllegalConfiguration { option } if option == "proxy"));
    }

    #[test]
    fn unparsable_value_is_rejected() {
        let err = ClientConfig::from_options([("auto_reconnect", "maybe")]).unwrap_err();
        assert!(matches!(err, HttpError::IllegalConfiguration { .. }));
    }
}
