use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Deserializer};

use crate::{
    config::RosterSettings,
    db::{
        models::{RosterEntry, UpsertOutcome},
        OperatorStore,
    },
    rpc::RateGovernor,
};

/// Maximum retries for a roster page
const MAX_RETRIES: u32 = 3;

/// Delay between retries (exponential backoff base)
const RETRY_DELAY_MS: u64 = 100;

/// Timeout for a single roster request (30 seconds)
const ROSTER_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// One operator as listed by the roster service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterNode {
    #[serde(alias = "operator")]
    operator_address: String,
    #[serde(default, deserialize_with = "deserialize_status")]
    status: bool,
    #[serde(default, deserialize_with = "deserialize_text")]
    rewards: String,
    #[serde(default, deserialize_with = "deserialize_number")]
    fee: f64,
    #[serde(default, deserialize_with = "deserialize_number")]
    uptime: f64,
}

/// The roster is served either wrapped as `{"nodes": [...]}` or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RosterPage {
    Wrapped { nodes: Vec<RosterNode> },
    Bare(Vec<RosterNode>),
}

impl RosterPage {
    fn into_nodes(self) -> Vec<RosterNode> {
        match self {
            RosterPage::Wrapped { nodes } => nodes,
            RosterPage::Bare(nodes) => nodes,
        }
    }
}

impl From<RosterNode> for RosterEntry {
    fn from(node: RosterNode) -> Self {
        RosterEntry {
            operator_address: node.operator_address.to_lowercase(),
            active: node.status,
            rewards: if node.rewards.is_empty() {
                "0".to_string()
            } else {
                node.rewards
            },
            fee: node.fee,
            uptime: node.uptime,
        }
    }
}

/// Counts reported after a roster refresh.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RosterReport {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub store_errors: usize,
}

/// Paginated client for the operator roster service.
#[derive(Clone)]
pub struct RosterClient {
    http: reqwest::Client,
    settings: RosterSettings,
    governor: Arc<RateGovernor>,
}

impl RosterClient {
    pub fn new(settings: RosterSettings, governor: Arc<RateGovernor>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(ROSTER_CALL_TIMEOUT)
            .build()
            .context("Failed to build roster HTTP client")?;

        Ok(Self {
            http,
            settings,
            governor,
        })
    }

    /// Fetch every roster page until a short or empty page, or until a page
    /// brings no operator not already seen. Endpoints that ignore the paging
    /// parameters return the full list every time and stop on page two.
    pub async fn fetch_roster(&self) -> Result<Vec<RosterEntry>> {
        let mut entries = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();

        for page in 1..=self.settings.max_pages {
            let nodes = self.fetch_page_with_retry(page).await?;
            let count = nodes.len();

            let mut added = 0;
            for entry in nodes.into_iter().map(RosterEntry::from) {
                if seen.insert(entry.operator_address.clone()) {
                    entries.push(entry);
                    added += 1;
                }
            }

            if count < self.settings.page_size {
                return Ok(entries);
            }
            if added == 0 {
                debug!(
                    "[ROSTER] Page {} repeated known operators, endpoint ignores paging",
                    page
                );
                return Ok(entries);
            }
        }

        warn!(
            "[ROSTER] Stopped after {} pages, roster may be truncated",
            self.settings.max_pages
        );
        Ok(entries)
    }

    /// Fetch a page with retry logic
    async fn fetch_page_with_retry(&self, page: usize) -> Result<Vec<RosterNode>> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match self.fetch_page(page).await {
                Ok(nodes) => return Ok(nodes),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES - 1 {
                        let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(attempt));
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("roster page {} failed", page))
            .context(format!("Failed to fetch roster page {}", page)))
    }

    async fn fetch_page(&self, page: usize) -> Result<Vec<RosterNode>> {
        self.governor.admit().await;

        let response = self
            .http
            .get(&self.settings.url)
            .query(&[("page", page), ("per_page", self.settings.page_size)])
            .send()
            .await?
            .error_for_status()?;

        let page: RosterPage = response.json().await?;
        Ok(page.into_nodes())
    }

    /// Fetch the roster and write each entry's metadata to the store.
    pub async fn refresh_roster<S: OperatorStore>(&self, store: &S) -> Result<RosterReport> {
        let entries = self.fetch_roster().await?;
        info!("[ROSTER] {} operators known", entries.len());

        Ok(apply_roster(store, &entries).await)
    }
}

/// Upsert roster metadata, never touching delegated counts.
pub async fn apply_roster<S: OperatorStore>(store: &S, entries: &[RosterEntry]) -> RosterReport {
    let mut report = RosterReport {
        total: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        match store.upsert_roster_entry(entry).await {
            Ok(UpsertOutcome::Created) => report.created += 1,
            Ok(UpsertOutcome::Changed) => report.updated += 1,
            Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
            Err(e) => {
                warn!(
                    "[ROSTER] Failed to store operator {}: {}",
                    entry.operator_address, e
                );
                report.store_errors += 1;
            },
        }
    }

    info!(
        "[ROSTER] {} updated, {} new, {} unchanged, {} failed",
        report.updated, report.created, report.unchanged, report.store_errors
    );

    report
}

fn deserialize_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => {
            matches!(s.to_lowercase().as_str(), "active" | "online" | "true" | "up")
        },
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    })
}

fn deserialize_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn deserialize_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    })
}
