use crate::domain::config::{FlowControlConfig, MuxConfig, ParityConfig};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for Sermux
#[derive(Parser, Debug)]
#[command(
    name = "sermux",
    version = env!("CARGO_PKG_VERSION"),
    about = "Share one serial device between many TCP clients",
    long_about = "A serial-to-TCP gateway: every line read from the serial device is broadcast to all connected clients, and everything a client sends is written to the device."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Command to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway until interrupted
    Run(RunArgs),
    /// List available serial ports
    Ports,
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

/// Overrides applied on top of the configuration file
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct RunArgs {
    /// TCP port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind the listener to
    #[arg(long)]
    pub bind: Option<String>,

    /// Serial device path
    #[arg(short, long)]
    pub device: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Parity (none, even, odd)
    #[arg(long, value_enum)]
    pub parity: Option<ParityArg>,

    /// Flow control (none, software, hardware)
    #[arg(long, value_enum)]
    pub flow_control: Option<FlowControlArg>,

    /// Readiness poll timeout in milliseconds
    #[arg(long)]
    pub poll_timeout_ms: Option<u64>,

    /// Serial read timeout in milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Initialization string sent to the device (escapes: \r \n \t \\)
    #[arg(long)]
    pub handshake: Option<String>,

    /// Do not send any initialization string
    #[arg(long, conflicts_with = "handshake")]
    pub no_handshake: bool,

    /// Maximum queued messages per client before the oldest are dropped
    #[arg(long)]
    pub max_pending: Option<usize>,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show effective configuration
    Show,
    /// Validate configuration
    Validate {
        /// Configuration file path
        file: Option<String>,
    },
    /// Create default configuration
    Init {
        /// Output file path
        #[arg(long)]
        path: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parity argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

/// Flow control argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FlowControlArg {
    None,
    Software,
    Hardware,
}

impl From<ParityArg> for ParityConfig {
    fn from(arg: ParityArg) -> Self {
        match arg {
            ParityArg::None => ParityConfig::None,
            ParityArg::Even => ParityConfig::Even,
            ParityArg::Odd => ParityConfig::Odd,
        }
    }
}

impl From<FlowControlArg> for FlowControlConfig {
    fn from(arg: FlowControlArg) -> Self {
        match arg {
            FlowControlArg::None => FlowControlConfig::None,
            FlowControlArg::Software => FlowControlConfig::Software,
            FlowControlArg::Hardware => FlowControlConfig::Hardware,
        }
    }
}

impl RunArgs {
    /// Apply command line overrides to a loaded configuration
    pub fn apply(&self, config: &mut MuxConfig) {
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(bind) = &self.bind {
            config.network.bind_host = bind.clone();
        }
        if let Some(timeout) = self.poll_timeout_ms {
            config.network.poll_timeout_ms = timeout;
        }
        if let Some(max_pending) = self.max_pending {
            config.network.max_pending_messages = Some(max_pending);
        }
        if let Some(device) = &self.device {
            config.serial.port = device.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(parity) = self.parity {
            config.serial.parity = parity.into();
        }
        if let Some(flow_control) = self.flow_control {
            config.serial.flow_control = flow_control.into();
        }
        if let Some(timeout) = self.read_timeout_ms {
            config.serial.read_timeout_ms = timeout;
        }
        if let Some(handshake) = &self.handshake {
            config.serial.handshake = unescape(handshake);
        }
        if self.no_handshake {
            config.serial.handshake.clear();
        }
    }
}

/// Expand the escapes a shell makes awkward to type.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let args = Args::try_parse_from(["sermux"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn test_run_overrides() {
        let args = Args::try_parse_from([
            "sermux", "run", "--port", "4000", "--device", "/dev/ttyUSB0", "--baud", "9600",
            "--handshake", "AT\\r", "--max-pending", "64",
        ])
        .unwrap();

        let Some(Command::Run(run)) = args.command else {
            panic!("expected run command");
        };
        let mut config = MuxConfig::default();
        run.apply(&mut config);

        assert_eq!(config.network.port, 4000);
        assert_eq!(config.network.max_pending_messages, Some(64));
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.handshake, "AT\r");
    }

    #[test]
    fn test_no_handshake_clears_default() {
        let args = Args::try_parse_from(["sermux", "run", "--no-handshake"]).unwrap();
        let Some(Command::Run(run)) = args.command else {
            panic!("expected run command");
        };
        let mut config = MuxConfig::default();
        run.apply(&mut config);
        assert!(config.serial.handshake.is_empty());
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("#43-52\\r"), "#43-52\r");
        assert_eq!(unescape("a\\\\b"), "a\\b");
        assert_eq!(unescape("keep\\x"), "keep\\x");
        assert_eq!(unescape("tail\\"), "tail\\");
    }
}
