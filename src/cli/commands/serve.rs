//! `agora serve`: run the fleet, the scheduler and the live feed.

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::cli::commands::context::AppContext;
use crate::domain::models::{Config, LiveEvent};
use crate::infrastructure::channel::{ChannelAgentFactory, ChannelHub, ReplySettings};
use crate::services::{
    ConversationDriver, ConversationScheduler, ConversationSettings, FleetRegistry, HumanReplyService, LiveUpdate,
    LiveUpdateBus, SchedulerSettings,
};

/// Name used for stdin lines without a `name:` prefix.
const DEFAULT_HUMAN_NAME: &str = "visitor";

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Use the scripted echo generator instead of the configured backend
    #[arg(long)]
    pub dry_run: bool,

    /// Seed the scheduler's random source
    #[arg(long)]
    pub seed: Option<u64>,

    /// Do not read human posts from stdin
    #[arg(long)]
    pub no_stdin: bool,
}

/// One-line rendering of a live event.
pub fn describe(event: &LiveEvent) -> String {
    match event {
        LiveEvent::ConversationStart { conversation_id, initiator, responder } => {
            format!("--- conversation #{conversation_id}: {initiator} <-> {responder}")
        }
        LiveEvent::Message { bot, content, conversation_type, .. } => format!("[{conversation_type}] {bot}: {content}"),
        LiveEvent::ConversationEnd { conversation_id, turns } => {
            format!("--- conversation #{conversation_id} complete ({turns} turns)")
        }
        LiveEvent::BotAdded { bot } => format!("+++ {} joined the channel", bot.name),
        LiveEvent::GradingComplete { run_id, graded } => format!("*** grading run {run_id}: {graded} agent(s) graded"),
    }
}

/// Split `name: text` into its parts; lines without a name use the default.
pub fn parse_human_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(':') {
        Some((name, text)) if !name.trim().is_empty() && !name.contains(' ') && !text.trim().is_empty() => {
            Some((name.trim().to_string(), text.trim().to_string()))
        }
        _ => Some((DEFAULT_HUMAN_NAME.to_string(), line.to_string())),
    }
}

fn spawn_feed(bus: &LiveUpdateBus, json_mode: bool) -> JoinHandle<()> {
    let mut updates = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => print_update(&update, json_mode),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "live feed fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_update(update: &LiveUpdate, json_mode: bool) {
    if json_mode {
        match serde_json::to_string(update) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize live update"),
        }
    } else {
        println!("{}", describe(&update.event));
    }
}

fn spawn_stdin_posts(hub: Arc<ChannelHub>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Some((name, text)) = parse_human_line(&line) else {
                        continue;
                    };
                    if let Err(e) = hub.post_human(name, text) {
                        tracing::warn!(error = %e, "human post rejected");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    })
}

pub async fn execute(args: ServeArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let config = &ctx.config;
    let channel_name = config.fleet.channel_name.clone();

    let generator = ctx.text_generator(args.dry_run)?;
    let bus = Arc::new(LiveUpdateBus::default());
    let hub = Arc::new(ChannelHub::new(channel_name.clone()));

    let human_replies = Arc::new(HumanReplyService::new(ctx.conversations.clone(), bus.clone(), channel_name.clone()));
    let factory = ChannelAgentFactory::new(
        hub.clone(),
        channel_name.clone(),
        generator.clone(),
        ReplySettings::from(&config.llm),
    )
    .with_human_replies(human_replies);
    let fleet = Arc::new(
        FleetRegistry::new(ctx.agents.clone(), Arc::new(factory), config.fleet.shutdown_grace())
            .with_live_updates(bus.clone()),
    );

    let feed = spawn_feed(&bus, json_mode);
    let stdin = (!args.no_stdin).then(|| spawn_stdin_posts(hub.clone()));

    let started = fleet.start_all().await.context("Failed to start the fleet")?;
    tracing::info!(
        agents = started,
        channel = %channel_name,
        generator = generator.name(),
        "serving; press Ctrl-C to stop"
    );

    let driver = ConversationDriver::new(
        ctx.conversations.clone(),
        bus.clone(),
        ConversationSettings::from_config(&config.scheduler, channel_name.clone()),
    );
    let mut scheduler = ConversationScheduler::new(
        fleet.clone(),
        ctx.conversations.clone(),
        driver,
        SchedulerSettings::from(&config.scheduler),
    );
    if let Some(seed) = args.seed {
        scheduler = scheduler.with_seed(seed);
    }
    let scheduler = Arc::new(scheduler);
    let scheduler_task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    let mut sync = tokio::time::interval(config.fleet.sync_interval());
    sync.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("shutdown requested");
                break;
            }
            _ = sync.tick() => {
                if let Err(e) = fleet.reconcile().await {
                    tracing::error!(error = %e, "fleet sync failed");
                }
            }
        }
    }

    scheduler.stop();
    if let Err(e) = scheduler_task.await {
        tracing::error!(error = %e, "scheduler task ended abnormally");
    }
    fleet.stop_all().await;
    hub.close();

    if let Some(stdin) = stdin {
        stdin.abort();
    }
    feed.abort();

    let stats = scheduler.stats();
    tracing::info!(
        iterations = stats.iterations,
        completed = stats.conversations_completed,
        failed = stats.conversations_failed,
        skipped = stats.skipped,
        "serve stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ConversationId, ConversationKind};

    #[test]
    fn test_parse_human_line() {
        assert_eq!(parse_human_line("dana: what do you sell?"), Some(("dana".into(), "what do you sell?".into())));
        assert_eq!(parse_human_line("hello there"), Some(("visitor".into(), "hello there".into())));
        assert_eq!(
            parse_human_line("note this: it has a colon"),
            Some(("visitor".into(), "note this: it has a colon".into()))
        );
        assert_eq!(parse_human_line("   "), None);
    }

    #[test]
    fn test_describe_message() {
        let event = LiveEvent::Message {
            conversation_id: Some(ConversationId(3)),
            bot: "LatteBot".into(),
            content: "Try our oat latte!".into(),
            conversation_type: ConversationKind::AgentAgent,
        };
        assert_eq!(describe(&event), "[agent-agent] LatteBot: Try our oat latte!");
    }
}
