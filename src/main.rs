use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use log::info;
use placeholder_rust::config::{PlaceholderConfig, SenderFallback};
use placeholder_rust::placeholder::policy::GracePeriod;
use placeholder_rust::types::{
    Aci, FailedEnvelope, RecoveredContent, RecoveredEnvelope, ServiceAddress, Timestamp,
};
use placeholder_rust::{Clock, ManualClock, MemoryMessageStore, MessageProcessor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "placeholder-demo")]
#[command(about = "Walk a placeholder through its lifecycle against the in-memory store")]
struct Args {
    /// JSON PlaceholderConfig to use instead of the 48h default
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Utc::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PlaceholderConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PlaceholderConfig::new(
            GracePeriod::from_secs(48 * 3600)?,
            SenderFallback::StableIdentityOnly,
        ),
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(config))
}

async fn run(config: PlaceholderConfig) -> anyhow::Result<()> {
    let start = Timestamp::from_millis(1_700_000_000_000);
    let clock = Arc::new(ManualClock::new(start));
    let processor = MessageProcessor::new(
        Arc::new(MemoryMessageStore::new()),
        config,
        clock.clone(),
    );
    let grace = config.grace_period.as_duration();
    let sender = ServiceAddress::from_aci(
        Aci::parse("5b7e1c2a-0d6f-4c38-9a4e-2f1b3c4d5e6f")
            .ok_or_else(|| anyhow::anyhow!("invalid demo ACI"))?,
    );

    // Two envelopes fail to decrypt.
    let mut placeholders = Vec::new();
    for offset in [1_000, 2_000] {
        let envelope = FailedEnvelope {
            timestamp: start.saturating_sub(Duration::from_millis(offset)),
            sender: sender.clone(),
            untrusted_group_id: None,
        };
        if let Some(placeholder) = processor.handle_decryption_failure(&envelope).await? {
            info!(
                "Placeholder {}: \"{}\"",
                placeholder.row_id(),
                placeholder.preview_text(clock.now())
            );
            placeholders.push(placeholder);
        }
    }

    // The first retry lands just inside the grace period.
    clock.advance(grace.saturating_sub(Duration::from_secs(60)));
    let outcome = processor
        .handle_decrypted_envelope(RecoveredEnvelope {
            sender: sender.clone(),
            timestamp: start.saturating_sub(Duration::from_millis(1_000)),
            untrusted_group_id: None,
            content: RecoveredContent::text("made it in time"),
        })
        .await?;
    info!("Retry inside grace period: {outcome:?}");

    // The second one arrives after it has closed.
    clock.advance(Duration::from_secs(120));
    let outcome = processor
        .handle_decrypted_envelope(RecoveredEnvelope {
            sender,
            timestamp: start.saturating_sub(Duration::from_millis(2_000)),
            untrusted_group_id: None,
            content: RecoveredContent::text("too late"),
        })
        .await?;
    info!("Retry after grace period: {outcome:?}");

    if let Some(first) = placeholders.first() {
        for interaction in processor.thread_history(first.thread_id()).await? {
            let text = match interaction.as_placeholder() {
                Some(p) => p.preview_text(clock.now()),
                None => interaction
                    .content()
                    .and_then(|c| c.body.clone())
                    .unwrap_or_default(),
            };
            info!("  {} {}", interaction.row_id(), text);
        }
    }
    Ok(())
}
