//! Terminal consumer of a running relay

use anyhow::{bail, Context, Result};
use ixen_agent::{build_classifier, Classifier};
use ixen_core::{Category, IxenConfig, IxenError, RelayMessage};
use ixen_dashboard::{ClassificationRequest, DashboardState, NoticeLevel};
use ixen_relay::FrameDecoder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

type Outcome = (ClassificationRequest, Result<Category, IxenError>);

/// How long to wait for in-flight classifications once the stream ends
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(server: &str, username: &str, config: IxenConfig) -> Result<()> {
    let mut state = DashboardState::new(config.dashboard.clone());
    if state.begin_connect(username).is_err() {
        print_notices(&mut state);
        bail!("Username is required");
    }
    let creator = state.creator().unwrap_or_default().to_string();

    let classifier = build_classifier(&config.classifier);
    info!("Watching @{} via {} ({} classifier)", creator, server, classifier.name());

    let url = format!("{}/api/live", server.trim_end_matches('/'));
    let mut response = reqwest::Client::new()
        .get(&url)
        .query(&[("username", creator.as_str())])
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    if !response.status().is_success() {
        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        bail!(
            "Server refused the stream ({}): {}",
            status,
            body["error"].as_str().unwrap_or("unknown error")
        );
    }

    let (outcome_tx, mut outcomes) = mpsc::unbounded_channel::<Outcome>();
    let mut decoder = FrameDecoder::new();
    let mut in_flight = 0usize;

    loop {
        tokio::select! {
            chunk = response.chunk() => {
                let Some(bytes) = chunk.context("Stream read failed")? else {
                    debug!("Stream ended");
                    break;
                };
                for frame in decoder.push(&bytes) {
                    let message = frame.into_message()?;
                    print_frame(&message);
                    if let Some(request) = state.apply(message) {
                        in_flight += 1;
                        spawn_classification(Arc::clone(&classifier), request, outcome_tx.clone());
                    }
                }
                print_notices(&mut state);
            }
            Some(outcome) = outcomes.recv() => {
                in_flight -= 1;
                file_outcome(&mut state, outcome);
            }
            _ = tokio::signal::ctrl_c() => {
                state.disconnect();
                print_notices(&mut state);
                return Ok(());
            }
        }
    }

    // Let comments already sent to the classifier land
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while in_flight > 0 {
        match tokio::time::timeout_at(deadline, outcomes.recv()).await {
            Ok(Some(outcome)) => {
                in_flight -= 1;
                file_outcome(&mut state, outcome);
            }
            _ => break,
        }
    }

    print_summary(&state);
    Ok(())
}

fn spawn_classification(
    classifier: Arc<dyn Classifier>,
    request: ClassificationRequest,
    results: mpsc::UnboundedSender<Outcome>,
) {
    tokio::spawn(async move {
        let outcome = classifier.classify(&request.text).await;
        let _ = results.send((request, outcome));
    });
}

fn file_outcome(state: &mut DashboardState, (request, outcome): Outcome) {
    let category = outcome.as_ref().ok().copied();
    let speaker = request.speaker_id.clone();
    let text = request.text.clone();

    if state.record_classification(request, outcome) {
        if let Some(category) = category {
            println!("  [{}] {}: {}", category, speaker, text);
        }
    }
    print_notices(state);
}

fn print_frame(message: &RelayMessage) {
    match message {
        RelayMessage::Comment(c) => println!("{}: {}", c.unique_id, c.comment),
        RelayMessage::Gift(g) => println!("* {} sent {} x{}", g.unique_id, g.gift_name, g.repeat_count),
        _ => {}
    }
}

fn print_notices(state: &mut DashboardState) {
    for notice in state.take_notices() {
        let marker = match notice.level {
            NoticeLevel::Info => "--",
            NoticeLevel::Error => "!!",
        };
        println!("{} {}: {}", marker, notice.title, notice.description);
    }
}

fn print_summary(state: &DashboardState) {
    println!();
    println!("Status: {:?}", state.status());
    println!("Live feed: {} comments", state.live().len());
    for category in Category::ALL {
        let filed = state.category(category).map_or(0, |feed| feed.len());
        println!("{}: {}", category, filed);
    }
    println!("Gifts: {}", state.gifts().len());
}
