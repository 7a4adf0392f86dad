//! Output target addresses
//!
//! A target is a protocol tag plus an address string, parsed once from the
//! `out` lists of the configuration and immutable afterwards.

use std::fmt;

/// Wire protocol of an output target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Unknown,
    /// One CSV record per message on stdout
    Csv,
    Osc,
    Udp,
    /// A MIDI output port, addressed by (partial) port name
    Midi,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Unknown => write!(f, "unknown"),
            Protocol::Csv => write!(f, "csv"),
            Protocol::Osc => write!(f, "osc"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Midi => write!(f, "midi"),
        }
    }
}

/// Parsed output target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub protocol: Protocol,
    /// Protocol specific address: `host:port[/prefix]` for OSC, `host:port`
    /// for UDP, the port name for MIDI, empty for CSV
    pub address: String,
}

impl Target {
    pub fn new(protocol: Protocol, address: impl Into<String>) -> Self {
        Self {
            protocol,
            address: address.into(),
        }
    }

    /// Parse an address string such as `osc://localhost:8000/ctl`,
    /// `udp://10.0.0.2:9000`, `midi://IAC Bus 1` or `csv`.
    ///
    /// Never fails: anything unrecognised becomes an `Unknown` target that
    /// keeps the original text as its address.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if text.eq_ignore_ascii_case("csv") || text.eq_ignore_ascii_case("stdout") {
            return Self::new(Protocol::Csv, "");
        }

        let Some((scheme, rest)) = text.split_once(':') else {
            return Self::new(Protocol::Unknown, text);
        };
        let rest = rest.strip_prefix("//").unwrap_or(rest);

        match scheme.to_ascii_lowercase().as_str() {
            "csv" | "stdout" => Self::new(Protocol::Csv, rest),
            "osc" if !rest.is_empty() => Self::new(Protocol::Osc, rest),
            "udp" if !rest.is_empty() => Self::new(Protocol::Udp, rest),
            "midi" if !rest.is_empty() => Self::new(Protocol::Midi, rest),
            _ => Self::new(Protocol::Unknown, text),
        }
    }

    /// Socket part of a network address (`host:port`), without any OSC path
    pub fn socket_addr(&self) -> &str {
        match self.address.find('/') {
            Some(idx) => &self.address[..idx],
            None => &self.address,
        }
    }

    /// OSC path prefix (`/ctl` in `osc://host:9000/ctl`), empty when absent
    pub fn path_prefix(&self) -> &str {
        match self.address.find('/') {
            Some(idx) => self.address[idx..].trim_end_matches('/'),
            None => "",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.is_empty() {
            write!(f, "{}", self.protocol)
        } else {
            write!(f, "{}://{}", self.protocol, self.address)
        }
    }
}

/// Parse a list of address strings, keeping their order
pub fn parse_targets<S: AsRef<str>>(addresses: &[S]) -> Vec<Target> {
    addresses.iter().map(|a| Target::parse(a.as_ref())).collect()
}
