//! TOML-backed configuration for a TCP adapter: a typed config-manager struct, scaled down
//! to the handful of settings a transport adapter actually needs.

use std::path::Path;

use serde::Deserialize;

use armi::error::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// `host:port` to bind (server) or dial (client).
    pub bind_addr: String,
    /// Upper bound enforced by the length-prefix framer on a single frame.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_max_frame_bytes() -> usize {
    1 << 20
}

impl TransportConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::codec(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let config = TransportConfig::from_toml_str(r#"bind_addr = "127.0.0.1:9000""#).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.max_frame_bytes, 1 << 20);
    }

    #[test]
    fn loads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"bind_addr = "127.0.0.1:9001""#).unwrap();
        let config = TransportConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9001");
    }

    #[test]
    fn overrides_max_frame_bytes() {
        let config = TransportConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:4000"
            max_frame_bytes = 4096
            "#,
        )
        .unwrap();
        assert_eq!(config.max_frame_bytes, 4096);
    }
}
