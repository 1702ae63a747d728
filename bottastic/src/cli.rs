use bottastic_core::{BotConfig, ConnectionOptions};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bottastic")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Bot to run, as `module:ClassName` (e.g. bots:PingPongBot)
    pub bot: String,

    /// Hostname or address of a network-attached device (port defaults to 4403)
    #[arg(long, env = "BOTTASTIC_HOST", conflicts_with = "port")]
    pub host: Option<String>,

    /// Serial port of the device (auto-detected when neither --host nor --port is given)
    #[arg(short, long, env = "BOTTASTIC_PORT")]
    pub port: Option<String>,

    /// Bluetooth device name or MAC address
    #[arg(short = 'b', long, env = "BOTTASTIC_BLE", conflicts_with_all = ["host", "port"])]
    pub ble: Option<String>,

    /// Print every message the bot sends
    #[arg(
        long = "echo_sent",
        env = "BOTTASTIC_ECHO_SENT",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub echo_sent: bool,

    /// Print every message the bot receives
    #[arg(
        long = "echo_received",
        env = "BOTTASTIC_ECHO_RECEIVED",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub echo_received: bool,

    /// Channel used for runtime-level sends
    #[arg(short = 'c', long, env = "BOTTASTIC_DEFAULT_CHANNEL", default_value = "0")]
    pub default_channel: u32,

    /// Connection timeout in seconds
    #[arg(short = 't', long, env = "BOTTASTIC_TIMEOUT", default_value = "30")]
    pub timeout: u64,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            host: self.host.clone(),
            port: self.port.clone(),
            ble: self.ble.clone(),
            timeout: self.timeout_duration(),
        }
    }

    pub fn bot_config(&self) -> BotConfig {
        BotConfig {
            echo_sent: self.echo_sent,
            echo_received: self.echo_received,
            default_channel: self.default_channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_defaults() -> Result<()> {
        let cli = Cli::try_parse_from(["bottastic", "bots:PingPongBot"])?;

        assert_eq!(cli.bot, "bots:PingPongBot");
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(!cli.echo_sent);
        assert!(!cli.echo_received);
        assert_eq!(cli.default_channel, 0);
        assert_eq!(cli.timeout_duration(), Duration::from_secs(30));
        assert!(!cli.verbose);
        Ok(())
    }

    #[test]
    fn test_echo_flags_take_booleans() -> Result<()> {
        let cli = Cli::try_parse_from([
            "bottastic",
            "bots:SilentBot",
            "--echo_sent",
            "true",
            "--echo_received",
            "no",
        ])?;
        assert!(cli.echo_sent);
        assert!(!cli.echo_received);

        let cli = Cli::try_parse_from(["bottastic", "bots:SilentBot", "--echo_received"])?;
        assert!(cli.echo_received);

        let config = cli.bot_config();
        assert!(config.echo_received);
        assert!(!config.echo_sent);
        Ok(())
    }

    #[test]
    fn test_host_and_port_conflict() -> Result<()> {
        let result = Cli::try_parse_from([
            "bottastic",
            "bots:PingPongBot",
            "--host",
            "meshtastic.local",
            "--port",
            "/dev/ttyUSB0",
        ]);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_connection_options() -> Result<()> {
        let cli = Cli::try_parse_from([
            "bottastic",
            "bots:PingPongBot",
            "--host",
            "192.168.1.20",
            "-t",
            "5",
            "-c",
            "2",
        ])?;

        let options = cli.connection_options();
        assert_eq!(options.host.as_deref(), Some("192.168.1.20"));
        assert!(options.port.is_none());
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(cli.bot_config().default_channel, 2);
        Ok(())
    }

    #[test]
    fn test_bot_is_required() -> Result<()> {
        assert!(Cli::try_parse_from(["bottastic"]).is_err());
        Ok(())
    }
}
