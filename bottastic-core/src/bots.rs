//! Bots that ship with the framework.

use async_trait::async_trait;

use crate::bot::{Bot, BotContext};
use crate::channel::MeshtasticChannel;
use crate::node::MeshtasticNode;

/// Answers `ping` with `pong!`, greeting the sender by long name when known.
/// Channel pings are answered on the same channel, direct pings privately.
#[derive(Debug, Default)]
pub struct PingPongBot;

fn is_ping(message: &str) -> bool {
    message.trim().eq_ignore_ascii_case("ping")
}

fn pong_for(node: &MeshtasticNode) -> String {
    match node.long_name() {
        Some(name) => format!("pong! hello, {name}"),
        None => "pong!".to_string(),
    }
}

#[async_trait]
impl Bot for PingPongBot {
    async fn handle_message(
        &mut self,
        _ctx: &BotContext<'_>,
        from_node: MeshtasticNode,
        message: &str,
        channel: MeshtasticChannel,
    ) -> anyhow::Result<()> {
        if is_ping(message) {
            channel.send_message(&pong_for(&from_node)).await?;
        }
        Ok(())
    }

    async fn handle_direct_message(
        &mut self,
        _ctx: &BotContext<'_>,
        from_node: MeshtasticNode,
        message: &str,
    ) -> anyhow::Result<()> {
        if is_ping(message) {
            from_node.send_message(&pong_for(&from_node)).await?;
        }
        Ok(())
    }
}

/// Does nothing. Useful for watching traffic with `--echo_received`.
#[derive(Debug, Default)]
pub struct SilentBot;

impl Bot for SilentBot {}
