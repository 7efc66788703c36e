//! Run a sync session against the in-memory remote store.

use anyhow::{Context, Result};
use cloudsync_session::{AccountStatus, SessionConfig, SyncSession, SyncState};
use cloudsync_types::{ChangeToken, Record, RecordId, ZoneId};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::remote::InMemoryRemote;

/// Zone every simulated record lives in.
const SIMULATION_ZONE: &str = "Simulation";

/// Parameters of one simulation run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Records to save.
    pub records: usize,
    /// Largest batch the remote store accepts.
    pub batch_limit: usize,
    /// Calls the remote store fails transiently before answering.
    pub transient_failures: usize,
    /// Make the remote store reject every call as unauthenticated.
    pub unauthenticated: bool,
    /// Give up if the session has not settled after this long.
    pub timeout: Duration,
}

/// Progress reported by the session callbacks.
#[derive(Debug)]
enum Progress {
    Saved(usize),
    Fetched {
        changed: usize,
        deleted: usize,
        change_token: Option<ChangeToken>,
    },
}

/// What the run achieved.
#[derive(Debug, Default)]
struct Outcome {
    saved: usize,
    fetched_changed: usize,
    fetched_deleted: usize,
    pages: usize,
    change_token: Option<ChangeToken>,
}

/// Run the simulate command.
pub async fn run(config: SessionConfig, options: Options) -> Result<()> {
    let mut remote = InMemoryRemote::new(options.batch_limit, options.transient_failures);
    if options.unauthenticated {
        remote = remote.unauthenticated();
    }

    println!(
        "Simulating {} record(s) against a remote store (batch limit {}, {} transient failure(s))...",
        options.records, options.batch_limit, options.transient_failures
    );

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let fetched_tx = progress_tx.clone();
    let session = SyncSession::builder(remote)
        .config(config)
        .on_records_modified(move |saved, _deleted| {
            let _ = progress_tx.send(Progress::Saved(saved.len()));
        })
        .on_records_fetched(move |changed, deleted, token| {
            let _ = fetched_tx.send(Progress::Fetched {
                changed: changed.len(),
                deleted: deleted.len(),
                change_token: token.cloned(),
            });
        })
        .on_zone_created(|zone, created| {
            tracing::info!("Zone {} ready (created: {})", zone, created);
        })
        .build();

    session.set_account_status(AccountStatus::Available)?;
    session
        .wait_for(|s| !s.is_halted())
        .await
        .context("Session closed before it became available")?;

    let started = Instant::now();
    let zone = ZoneId::new(SIMULATION_ZONE);
    session.create_zone(zone.clone())?;
    session.modify(make_records(&zone, options.records), vec![])?;
    session.fetch()?;

    let mut outcome = Outcome::default();
    let mut states = session.subscribe();
    let settled = tokio::time::timeout(options.timeout, async {
        loop {
            tokio::select! {
                Some(progress) = progress_rx.recv() => outcome.record(progress),
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if is_settled(&session.state(), &outcome) {
                break;
            }
        }
    })
    .await;

    let state = session.state();
    let stats = session.handler().stats();

    println!();
    println!("=== cloudsync simulate ===");
    println!();
    println!("Remote:");
    println!("  Calls:              {}", stats.calls);
    println!("  Transient failures: {}", stats.transient_failures);
    println!("  Rejected batches:   {}", stats.rejected_batches);
    println!("  Stored records:     {}", session.handler().record_count());
    println!();
    println!("Session:");
    println!("  Saved:   {} of {}", outcome.saved, options.records);
    println!(
        "  Fetched: {} changed, {} deleted ({} page(s))",
        outcome.fetched_changed, outcome.fetched_deleted, outcome.pages
    );
    match &outcome.change_token {
        Some(token) => println!("  Token:   {}", token),
        None => println!("  Token:   (none)"),
    }
    println!("  Elapsed: {:?}", started.elapsed());

    if settled.is_err() {
        println!("  Status:  TIMED OUT");
        anyhow::bail!("Session did not settle within {:?}", options.timeout);
    }
    if state.is_halted() {
        println!(
            "  Status:  HALTED ({} pending work(s))",
            state.pending_work().len()
        );
        anyhow::bail!("Session halted before all work completed");
    }
    println!("  Status:  COMPLETE");

    Ok(())
}

impl Outcome {
    fn record(&mut self, progress: Progress) {
        match progress {
            Progress::Saved(count) => self.saved += count,
            Progress::Fetched {
                changed,
                deleted,
                change_token,
            } => {
                self.fetched_changed += changed;
                self.fetched_deleted += deleted;
                self.pages += 1;
                self.change_token = change_token;
            }
        }
    }
}

/// The run is over once the session halts, or once the fetch has delivered
/// at least one page and nothing is left to do.
fn is_settled(state: &SyncState, outcome: &Outcome) -> bool {
    state.is_halted()
        || (outcome.pages > 0 && state.is_idle() && state.pending_work().is_empty())
}

fn make_records(zone: &ZoneId, count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::new(
                RecordId::with_name(zone.clone(), &format!("record-{:04}", i)),
                "SimulatedItem",
                format!("payload {}", i).into_bytes(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 10;
        config.logging.log_events = false;
        config
    }

    fn options(records: usize, batch_limit: usize) -> Options {
        Options {
            records,
            batch_limit,
            transient_failures: 0,
            unauthenticated: false,
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn records_are_named_in_order() {
        let zone = ZoneId::new(SIMULATION_ZONE);
        let records = make_records(&zone, 3);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id.name(), "record-0000");
        assert_eq!(records[2].id.name(), "record-0002");
    }

    #[test]
    fn settles_only_after_a_fetched_page() {
        let idle = SyncState::with_halted(false);
        assert!(!is_settled(&idle, &Outcome::default()));

        let outcome = Outcome {
            pages: 1,
            ..Default::default()
        };
        assert!(is_settled(&idle, &outcome));
        assert!(is_settled(&SyncState::new(), &Outcome::default()));
    }

    #[tokio::test]
    async fn simulate_completes_with_splits_and_retries() {
        let mut opts = options(10, 3);
        opts.transient_failures = 2;
        run(fast_config(), opts).await.unwrap();
    }

    #[tokio::test]
    async fn simulate_fails_when_unauthenticated() {
        let mut opts = options(5, 10);
        opts.unauthenticated = true;
        let err = run(fast_config(), opts).await.unwrap_err();
        assert!(err.to_string().contains("halted"));
    }
}
