//! Parsing of `ups[@host[:port]]` collector options.

use sensor_framework::LabelSet;

use crate::error::UpscError;

/// Well-known upsd port.
pub const DEFAULT_PORT: u16 = 3493;

/// Host used when the options name no host.
pub const DEFAULT_HOST: &str = "localhost";

/// The UPS a collector instance talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsTarget {
    /// UPS name as known to upsd.
    pub ups: String,
    /// Host given by the operator, `None` for the local daemon.
    pub host: Option<String>,
    /// upsd port.
    pub port: u16,
}

impl UpsTarget {
    /// Parse `ups`, `ups@host` or `ups@host:port`.
    ///
    /// IPv6 hosts with a port are written in brackets: `ups@[::1]:3493`.
    pub fn parse(opts: &str) -> Result<Self, UpscError> {
        let invalid = |reason: &str| UpscError::InvalidOptions {
            opts: opts.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = opts.trim().split('@').collect();
        let (ups, host_port) = match parts.as_slice() {
            [ups] => (*ups, None),
            [ups, host_port] => (*ups, Some(*host_port)),
            _ => return Err(invalid("too many '@'")),
        };

        if ups.is_empty() {
            return Err(invalid("UPS name is empty"));
        }
        if ups.chars().any(char::is_whitespace) {
            return Err(invalid("UPS name contains whitespace"));
        }

        let (host, port) = match host_port {
            None => (None, DEFAULT_PORT),
            Some(host_port) => {
                let (host, port) = split_host_port(host_port).map_err(|r| invalid(&r))?;
                if host.is_empty() {
                    return Err(invalid("host is empty"));
                }
                (Some(host.to_string()), port)
            }
        };

        Ok(Self {
            ups: ups.to_string(),
            host,
            port,
        })
    }

    /// Host to connect to.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// `host:port` address suitable for connecting.
    pub fn address(&self) -> String {
        let host = self.host();
        if host.contains(':') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// Default label set: the UPS name, plus the host when one was given.
    ///
    /// The port is never part of the labels.
    pub fn labels(&self) -> LabelSet {
        let labels = LabelSet::new().with("ups", &self.ups);
        match &self.host {
            Some(host) => labels.with("host", host),
            None => labels,
        }
    }
}

fn split_host_port(input: &str) -> Result<(&str, u16), String> {
    let (host, port) = if let Some(rest) = input.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| "missing ']' after IPv6 host".to_string())?;
        match after {
            "" => (host, None),
            _ => match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(format!("unexpected '{}' after IPv6 host", after)),
            },
        }
    } else if input.matches(':').count() > 1 {
        // Bare IPv6 address without port
        (input, None)
    } else {
        match input.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (input, None),
        }
    };

    let port = match port {
        None => DEFAULT_PORT,
        Some(port) => port
            .parse::<u16>()
            .map_err(|e| format!("invalid port '{}': {}", port, e))?,
    };

    Ok((host, port))
}
