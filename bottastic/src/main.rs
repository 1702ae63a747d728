mod cli;
mod registry;
mod utils;

use anyhow::{Context, Result};
use bottastic_core::{BotError, BotRuntime};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::Cli;
use crate::utils::{print_error, print_info, print_success};

enum Outcome {
    Finished(bottastic_core::Result<()>),
    Interrupted(std::io::Result<()>),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Set up logging
    setup_logging(&cli);

    let mut bot = registry::resolve(&cli.bot)?;

    let mut runtime = BotRuntime::new(cli.bot_config());
    runtime
        .connect(&cli.connection_options())
        .await
        .context("Failed to connect to Meshtastic device")?;
    print_success(format_args!("Running {}. Press Ctrl+C to stop.", cli.bot));

    let outcome = tokio::select! {
        result = runtime.run(bot.as_mut()) => Outcome::Finished(result),
        signal = tokio::signal::ctrl_c() => Outcome::Interrupted(signal),
    };

    finish(&mut runtime, outcome).await
}

/// Closes the device link and turns the run outcome into the exit status.
/// A failing close is only logged so it cannot mask the outcome.
async fn finish(runtime: &mut BotRuntime, outcome: Outcome) -> Result<()> {
    if let Err(e) = runtime.shutdown().await {
        warn!("Failed to close device connection: {e}");
    }

    match outcome {
        Outcome::Interrupted(signal) => {
            signal.context("Failed to listen for Ctrl+C")?;
            print_info("Bot stopped by user");
            Ok(())
        }
        Outcome::Finished(Ok(())) => Ok(()),
        Outcome::Finished(Err(e @ BotError::Connection(_))) => {
            print_error("Lost connection to the device");
            Err(e.into())
        }
        Outcome::Finished(Err(e)) => Err(anyhow::Error::from(e).context("Bot stopped")),
    }
}

fn setup_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info,meshtastic::connections::stream_buffer=warn")
        }
    });

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bottastic_core::connection::{MeshLink, OutgoingText};
    use bottastic_core::{BotConfig, RuntimeState};
    use tokio::sync::mpsc;

    /// Link whose disconnect always fails.
    struct BrokenCloseLink;

    #[async_trait]
    impl MeshLink for BrokenCloseLink {
        async fn send_text(&self, _packet: &OutgoingText) -> bottastic_core::Result<()> {
            Ok(())
        }

        async fn close(&self) -> bottastic_core::Result<()> {
            Err(BotError::Connection("Failed to disconnect: broken pipe".to_string()))
        }
    }

    fn attached_runtime() -> BotRuntime {
        let (_tx, rx) = mpsc::unbounded_channel();
        let mut runtime = BotRuntime::new(BotConfig::default());
        runtime.attach(Box::new(BrokenCloseLink), rx);
        runtime
    }

    #[tokio::test]
    async fn test_ctrl_c_exits_cleanly_despite_close_failure() -> Result<()> {
        let mut runtime = attached_runtime();

        finish(&mut runtime, Outcome::Interrupted(Ok(()))).await?;

        assert_eq!(runtime.state(), RuntimeState::Disconnected);
        Ok(())
    }

    #[tokio::test]
    async fn test_lost_link_is_reported_despite_close_failure() -> Result<()> {
        let mut runtime = attached_runtime();
        let lost = BotError::Connection("connection to device lost".to_string());

        let err = match finish(&mut runtime, Outcome::Finished(Err(lost))).await {
            Err(e) => e,
            Ok(()) => anyhow::bail!("a lost link must exit non-zero"),
        };
        assert_eq!(
            err.to_string(),
            "connection error: connection to device lost"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_handler_failure_exits_non_zero() -> Result<()> {
        let mut runtime = attached_runtime();
        let failure = BotError::Handler(anyhow::anyhow!("boom"));

        let result = finish(&mut runtime, Outcome::Finished(Err(failure))).await;

        let err = match result {
            Err(e) => e,
            Ok(()) => anyhow::bail!("a handler failure must exit non-zero"),
        };
        assert!(format!("{err:#}").contains("boom"));
        Ok(())
    }
}
