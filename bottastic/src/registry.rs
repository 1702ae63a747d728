//! Bots compiled into the binary, looked up by the name given on the command line.

use bottastic_core::bots::{PingPongBot, SilentBot};
use bottastic_core::{Bot, BotError};

type BotFactory = fn() -> Box<dyn Bot>;

fn ping_pong() -> Box<dyn Bot> {
    Box::new(PingPongBot)
}

fn silent() -> Box<dyn Bot> {
    Box::new(SilentBot)
}

const BOTS: &[(&str, BotFactory)] = &[("PingPongBot", ping_pong), ("SilentBot", silent)];

pub fn available_bots() -> Vec<&'static str> {
    BOTS.iter().map(|(name, _)| *name).collect()
}

/// Instantiates the bot named by a `module:ClassName` reference. The module
/// part is optional and ignored.
pub fn resolve(reference: &str) -> Result<Box<dyn Bot>, BotError> {
    let name = reference.rsplit(':').next().unwrap_or(reference).trim();

    BOTS.iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, factory)| factory())
        .ok_or_else(|| BotError::UnknownBot {
            name: name.to_string(),
            available: available_bots().join(", "),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_resolve_with_and_without_module() -> Result<()> {
        resolve("bots:PingPongBot")?;
        resolve("PingPongBot")?;
        resolve("my_bots.silent:SilentBot")?;
        Ok(())
    }

    #[test]
    fn test_unknown_bot_lists_available() -> Result<()> {
        match resolve("bots:EchoBot") {
            Err(BotError::UnknownBot { name, available }) => {
                assert_eq!(name, "EchoBot");
                assert_eq!(available, "PingPongBot, SilentBot");
            }
            Err(e) => anyhow::bail!("unexpected error: {e}"),
            Ok(_) => anyhow::bail!("EchoBot should not resolve"),
        }
        Ok(())
    }
}
