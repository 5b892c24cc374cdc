//! Outbound mail transport settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::MailConfig;

/// Configuration-store key holding the SMTP settings object.
pub const SMTP_CONFIG_KEY: &str = "smtp_config";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS on connect. When false the transport still upgrades
    /// opportunistically with STARTTLS.
    pub secure: bool,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: String,
}

impl TransportConfig {
    pub fn from_defaults(mail: &MailConfig) -> Self {
        Self {
            host: mail.smtp_host.clone(),
            port: mail.smtp_port,
            secure: false,
            user: None,
            pass: None,
            from: mail.from.clone(),
        }
    }

    /// Overlay the stored `smtp_config` object on the defaults. Missing,
    /// empty or unparsable fields keep the default value. The UI stores
    /// `port` either as a number or as a string.
    pub fn merge_stored(stored: &Value, defaults: &MailConfig) -> Self {
        let mut cfg = Self::from_defaults(defaults);

        if let Some(host) = non_empty_str(stored.get("host")) {
            cfg.host = host;
        }
        let port = match stored.get("port") {
            Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        if let Some(port) = port.filter(|p| *p != 0) {
            cfg.port = port;
        }
        cfg.secure = match stored.get("secure") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };
        cfg.user = non_empty_str(stored.get("user"));
        if cfg.user.is_some() {
            cfg.pass = stored.get("pass").and_then(Value::as_str).map(String::from);
        }
        if let Some(from) = non_empty_str(stored.get("from")) {
            cfg.from = from;
        }
        cfg
    }
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
