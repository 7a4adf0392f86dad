//! Console driver - CSV records on stdout
//!
//! One record per broadcast: the property followed by one field per value
//! component, e.g. `color,1,0,0.5,1`.

use anyhow::{Context, Result};
use std::io::{self, Write};

use crate::mapping::KeyValue;

pub struct ConsoleDriver<W: Write = io::Stdout> {
    writer: csv::Writer<W>,
}

impl ConsoleDriver<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleDriver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: record_writer(writer),
        }
    }

    pub fn send(&mut self, property: &str, value: &KeyValue) -> Result<()> {
        self.writer
            .write_record(record(property, value))
            .context("Failed to write CSV record")?;
        self.writer.flush().context("Failed to flush CSV output")?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

fn record_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(writer)
}

fn record(property: &str, value: &KeyValue) -> Vec<String> {
    std::iter::once(property.to_string())
        .chain(value.fields())
        .collect()
}

/// `property,v1[,v2..]` as one line of text
pub fn csv_line(property: &str, value: &KeyValue) -> Result<Vec<u8>> {
    let mut writer = record_writer(Vec::new());
    writer
        .write_record(record(property, value))
        .context("Failed to encode CSV record")?;
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to encode CSV record: {}", e.error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_per_value_kind() {
        let mut console = ConsoleDriver::new(Vec::new());
        console.send("play", &KeyValue::Text("on".into())).unwrap();
        console.send("fader", &KeyValue::Number(0.5)).unwrap();
        console
            .send("tint", &KeyValue::Color(vec![1.0, 0.0, 0.5, 1.0]))
            .unwrap();

        let out = String::from_utf8(console.get_ref().clone()).unwrap();
        assert_eq!(out, "play,on\nfader,0.5\ntint,1,0,0.5,1\n");
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let line = csv_line("label", &KeyValue::Text("a,b".into())).unwrap();
        assert_eq!(String::from_utf8(line).unwrap(), "label,\"a,b\"\n");
    }
}
