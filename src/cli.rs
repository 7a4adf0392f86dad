//! Command-line interface and REPL

use anyhow::{bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::gateway::Gateway;
use crate::midi;

const COMMANDS: &[(&str, &str)] = &[
    ("help", "Show this help"),
    ("devices", "List devices and their status"),
    ("get <device> <key>", "Show the live value of a key"),
    ("set <device> <key> <value>", "Inject an event (value 0-127)"),
    ("save <path>", "Write the running configuration as YAML"),
    ("quit", "Stop the gateway"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Devices,
    Get { device: String, key: u32 },
    Set { device: String, key: u32, value: f32 },
    Save { path: String },
    Quit,
}

impl Command {
    /// Parse one console line; `None` for a blank line.
    ///
    /// Device names may contain spaces, so numeric arguments are taken from
    /// the end of the line.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(None);
        }
        let verb = words.remove(0).to_lowercase();

        let command = match verb.as_str() {
            "help" | "?" => Command::Help,
            "devices" | "ls" => Command::Devices,
            "get" => {
                let Some((key, device)) = words.split_last() else {
                    bail!("usage: get <device> <key>");
                };
                Command::Get {
                    device: device_name(device)?,
                    key: key.parse().with_context(|| format!("Invalid key '{}'", key))?,
                }
            }
            "set" => {
                if words.len() < 3 {
                    bail!("usage: set <device> <key> <value>");
                }
                let value = words[words.len() - 1];
                let key = words[words.len() - 2];
                Command::Set {
                    device: device_name(&words[..words.len() - 2])?,
                    key: key.parse().with_context(|| format!("Invalid key '{}'", key))?,
                    value: value
                        .parse()
                        .with_context(|| format!("Invalid value '{}'", value))?,
                }
            }
            "save" => match words.as_slice() {
                [] => bail!("usage: save <path>"),
                path => Command::Save {
                    path: path.join(" "),
                },
            },
            "quit" | "exit" => Command::Quit,
            other => bail!("Unknown command '{}', try 'help'", other),
        };

        Ok(Some(command))
    }
}

fn device_name(words: &[&str]) -> Result<String> {
    if words.is_empty() {
        bail!("Missing device name");
    }
    Ok(words.join(" "))
}

/// Read console lines on a detached thread and forward parsed commands.
///
/// The thread is never joined: a `readline` blocked on the terminal must not
/// keep the runtime from shutting down on a signal.
pub fn spawn_repl(tx: mpsc::Sender<Command>) -> io::Result<thread::JoinHandle<()>> {
    spawn_reader(tx, || {
        let mut rl = DefaultEditor::new()?;
        Ok(move || {
            let line = rl.readline("surface> ");
            if let Ok(line) = &line {
                let _ = rl.add_history_entry(line.as_str());
            }
            line
        })
    })
}

fn spawn_reader<M, R>(tx: mpsc::Sender<Command>, make_reader: M) -> io::Result<thread::JoinHandle<()>>
where
    M: FnOnce() -> Result<R, ReadlineError> + Send + 'static,
    R: FnMut() -> Result<String, ReadlineError> + 'static,
{
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let mut read_line = match make_reader() {
                Ok(reader) => reader,
                Err(e) => {
                    warn!("Console unavailable: {}", e);
                    let _ = tx.blocking_send(Command::Quit);
                    return;
                }
            };

            loop {
                match read_line() {
                    Ok(line) => match Command::parse(&line) {
                        Ok(Some(command)) => {
                            let quit = command == Command::Quit;
                            if tx.blocking_send(command).is_err() || quit {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("{}", e.to_string().red()),
                    },
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                        let _ = tx.blocking_send(Command::Quit);
                        break;
                    }
                    Err(e) => {
                        warn!("Console error: {}", e);
                        let _ = tx.blocking_send(Command::Quit);
                        break;
                    }
                }
            }
            debug!("Console closed");
        })
}

/// Run one command against the gateway; `false` once the user quits
pub async fn execute(command: Command, gateway: &Gateway) -> Result<bool> {
    match command {
        Command::Help => {
            println!("{}", "Commands:".bold());
            for (usage, about) in COMMANDS {
                println!("  {:<28} {}", usage.cyan(), about);
            }
        }
        Command::Devices => {
            for line in gateway.describe_devices() {
                println!("  {}", line);
            }
        }
        Command::Get { device, key } => match gateway.query(&device, key)? {
            Some((name, state)) => {
                let value = state
                    .value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let when = state
                    .updated_at
                    .map(|t| t.format("%H:%M:%S%.3f").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "  {} = {} (raw {}, updated {})",
                    name.bold(),
                    value.green(),
                    state.value_raw,
                    when.dimmed()
                );
            }
            None => println!("  {}", format!("No binding for key {} on '{}'", key, device).yellow()),
        },
        Command::Set { device, key, value } => gateway.inject(&device, key, value)?,
        Command::Save { path } => {
            gateway.config().save(&path).await?;
            println!("  Saved to {}", path.green());
        }
        Command::Quit => return Ok(false),
    }

    Ok(true)
}

/// Print visible MIDI ports
pub fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    for (title, ports) in [
        ("Input Ports:", midi::list_input_ports()),
        ("Output Ports:", midi::list_output_ports()),
    ] {
        println!("\n{}", title.bold());
        match ports {
            Ok(ports) if ports.is_empty() => println!("  {}", "None found".dimmed()),
            Ok(ports) => {
                for port in ports {
                    println!("  {}", port);
                }
            }
            Err(e) => println!("  {}", format!("Unavailable: {}", e).red()),
        }
    }

    println!();
}
