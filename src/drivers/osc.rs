//! OSC driver - one message per broadcast over UDP

use anyhow::{anyhow, Context, Result};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use tracing::trace;

use super::udp::LazySocket;
use crate::mapping::KeyValue;
use crate::target::Target;

pub struct OscDriver {
    socket: LazySocket,
}

impl OscDriver {
    pub fn new() -> Self {
        Self {
            socket: LazySocket::default(),
        }
    }

    pub fn send(&mut self, target: &Target, property: &str, value: &KeyValue) -> Result<()> {
        let packet = OscPacket::Message(message(target, property, value));
        let bytes = encoder::encode(&packet)
            .map_err(|e| anyhow!("Failed to encode OSC message: {:?}", e))?;

        self.socket
            .get()?
            .send_to(&bytes, target.socket_addr())
            .with_context(|| format!("Failed to send OSC to {}", target.socket_addr()))?;

        trace!("OSC → {} {} {}", target.socket_addr(), address(target, property), value);
        Ok(())
    }
}

impl Default for OscDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// OSC address: the target's path prefix joined with the property
pub fn address(target: &Target, property: &str) -> String {
    let property = property.trim_start_matches('/');
    format!("{}/{}", target.path_prefix(), property)
}

pub fn message(target: &Target, property: &str, value: &KeyValue) -> OscMessage {
    let args = match value {
        KeyValue::Bool(b) => vec![OscType::String(b.to_string())],
        KeyValue::Text(s) => vec![OscType::String(s.clone())],
        KeyValue::Int(n) => vec![OscType::Float(*n as f32)],
        KeyValue::Number(n) => vec![OscType::Float(*n)],
        KeyValue::Vector(v) | KeyValue::Color(v) => v.iter().map(|c| OscType::Float(*c)).collect(),
    };

    OscMessage {
        addr: address(target, property),
        args,
    }
}
