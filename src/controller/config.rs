use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bon::Builder;

/// AMS Net ID of the default TwinCAT runtime the simulator talks to.
pub const DEFAULT_AMS_NET_ID: AmsNetId = AmsNetId([192, 168, 19, 1, 1, 1]);
/// Port of the first PLC runtime.
pub const DEFAULT_AMS_PORT: u16 = 851;

/// Address of an ADS device, six dot separated octets like `192.168.19.1.1.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmsNetId(pub [u8; 6]);

impl fmt::Display for AmsNetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a}.{b}.{c}.{d}.{e}.{g}")
    }
}

/// Indicates that a string is not a valid AMS Net ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{input}' is not an AMS Net ID, expected six octets like 192.168.19.1.1.1")]
pub struct AmsNetIdParseError {
    pub input: String,
}

impl FromStr for AmsNetId {
    type Err = AmsNetIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AmsNetIdParseError {
            input: s.to_string(),
        };

        let mut octets = [0_u8; 6];
        let mut parts = s.trim().split('.');
        for octet in &mut octets {
            *octet = parts
                .next()
                .and_then(|part| part.parse().ok())
                .ok_or_else(err)?;
        }

        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Self(octets))
    }
}

/// Where to reach the controller.
///
/// A configuration is never edited while in use; reconfiguring builds a new one and a new
/// connection from it.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ConnectionConfig {
    #[builder(default = DEFAULT_AMS_NET_ID)]
    pub ams_net_id: AmsNetId,

    #[builder(default = DEFAULT_AMS_PORT)]
    pub ams_port: u16,

    /// Upper bound for any single request to the controller.
    #[builder(default = Duration::from_secs(1))]
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_net_id() {
        let net_id: AmsNetId = "5.80.201.232.1.1".parse().unwrap();
        assert_eq!(net_id, AmsNetId([5, 80, 201, 232, 1, 1]));
        assert_eq!(net_id.to_string(), "5.80.201.232.1.1");
    }

    #[test]
    fn test_parse_net_id_rejects_malformed() {
        for input in ["192.168.19.1", "192.168.19.1.1.1.1", "192.168.19.1.1.256", "a.b.c.d.e.f", ""] {
            assert!(input.parse::<AmsNetId>().is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();

        assert_eq!(config.ams_net_id, DEFAULT_AMS_NET_ID);
        assert_eq!(config.ams_port, 851);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }
}
