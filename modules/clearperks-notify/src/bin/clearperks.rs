use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use clearperks_common::{Config, ContentKind, DeviceToken};
use clearperks_notify::{DeviceTokenStore, FcmClient, InMemoryStore, PushDeliverer, PushMessage, PushSettings};
use clearperks_signals::feed::FeedEntry;
use clearperks_signals::{derive_view, IngestRequest, Ingestor, RelevanceScorer, TagSignalExtractor};

#[derive(Parser)]
#[command(name = "clearperks")]
#[command(about = "Benefits content classification and push tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify and score a piece of text, printing the result as JSON
    Classify {
        text: String,

        /// Estimated savings in dollars
        #[arg(long)]
        savings: Option<f64>,

        /// Disable confidence jitter
        #[arg(long)]
        deterministic: bool,
    },

    /// Send one push to the given device tokens
    Push {
        #[arg(long = "token", required = true)]
        tokens: Vec<String>,

        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,
    },

    /// Check that push delivery is configured
    CheckPush,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("clearperks=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Classify {
            text,
            savings,
            deterministic,
        } => classify(&config, text, savings, deterministic),
        Command::Push {
            tokens,
            title,
            body,
        } => push(&config, tokens, title, body).await,
        Command::CheckPush => check_push(&config),
    }
}

fn classify(config: &Config, text: String, savings: Option<f64>, deterministic: bool) -> Result<()> {
    let extractor = if deterministic {
        TagSignalExtractor::deterministic()
    } else {
        TagSignalExtractor::new()
    };
    let ingestor = Ingestor::new(extractor, RelevanceScorer::new(config.freshness_max_days));

    let mut request = IngestRequest::new(ContentKind::Recommendation, text, "");
    request.estimated_savings = savings;

    let now = Utc::now();
    let item = ingestor.ingest(request, now);
    let entry = FeedEntry {
        view: derive_view(&item, now),
        item,
    };

    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

async fn push(config: &Config, tokens: Vec<String>, title: String, body: String) -> Result<()> {
    let Some(provider) = FcmClient::from_config(config) else {
        bail!("Push is not configured. Run `clearperks check-push` for details.");
    };
    config.log_redacted();

    // Stand-in user owning the given tokens, so delivery and pruning run
    // exactly as they do for real users.
    let store = Arc::new(InMemoryStore::new());
    let user_id = Uuid::new_v4();
    store.add_user(user_id);
    for token in tokens {
        store
            .insert_device(&DeviceToken::new(user_id, token, None, Utc::now()))
            .await?;
    }

    let deliverer = PushDeliverer::new(
        Arc::new(provider),
        store.clone(),
        PushSettings::from_config(config),
    );
    let report = deliverer
        .send_to_user(user_id, &PushMessage::new(title, body))
        .await;

    info!(
        success = report.success_count,
        failed = report.failure_count,
        pruned = report.pruned,
        "Push finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn check_push(config: &Config) -> Result<()> {
    config.log_redacted();

    let mut problems = Vec::new();
    if !config.push_enabled {
        problems.push("PUSH_ENABLED is false");
    }
    if config.fcm_project_id.is_none() {
        problems.push("FCM_PROJECT_ID is not set");
    }
    if config.fcm_access_token.is_none() {
        problems.push("FCM_ACCESS_TOKEN is not set");
    }

    if problems.is_empty() {
        println!(
            "Push configured: project {}, batch size {}, timeout {}s",
            config.fcm_project_id.as_deref().unwrap_or_default(),
            config.push_batch_size,
            config.push_timeout.as_secs()
        );
        return Ok(());
    }

    for problem in &problems {
        println!("- {problem}");
    }
    bail!("Push is not configured ({} problem(s))", problems.len())
}
