//! Orchestrates the event pipeline: read a log entry, look up the
//! user, run its handler, run its rules, and feed any rule that fired
//! back into the tripwire.

use feature_core::repository::{EventLog, LogEntry, UserRepository};
use feature_core::types::Event;
use feature_core::{Error, Result};
use feature_rules::{handler_for_event, rules_for_event, Rule, RuleOutcome};
use feature_tripwire::TripwireController;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// One pass over a single log entry: decode, dispatch to its handler,
/// run its rules, and record any rule that actually fired against the
/// tripwire. Pure enough to unit-test without a live stream.
///
/// Returns `Ok(())` once the entry's handler and rules have completed —
/// the caller acks on `Ok` and on any `Err` that is *not*
/// [`Error::BackingStoreTransient`].
pub async fn process_entry(
    entry: &LogEntry,
    user_repo: &dyn UserRepository,
    tripwire: &TripwireController,
) -> Result<()> {
    let event_properties = serde_json::from_str(&entry.event_properties_json)?;
    let event = Event::validate_new(entry.name.clone(), event_properties)?;

    let handler = handler_for_event(&event.name).ok_or_else(|| {
        Error::UnknownEventName(event.name.clone())
    })?;

    let user_id = event.user_id()?;
    let mut user = match user_repo.get(&user_id).await {
        Ok(user) => user,
        Err(Error::UserNotFound(_)) => user_repo.create(&user_id).await?,
        Err(e) => return Err(e),
    };

    handler.handle(&event, &mut user)?;
    user_repo.save(&user).await?;

    let total_users = user_repo.count().await?;
    for rule in rules_for_event(&event.name) {
        let outcome = rule.process(tripwire, user_repo, &mut user).await?;
        if outcome == RuleOutcome::Applied {
            tripwire
                .record_and_recompute(rule.name(), &user_id, total_users)
                .await?;
            info!(rule = rule.name(), user_id = %user_id, "rule applied");
        }
    }

    Ok(())
}

/// Whether a failed entry should be acknowledged (dropped) or left
/// pending for redelivery. Only a transient backing-store error earns
/// a retry; everything else is a poison pill.
fn should_ack_on_error(err: &Error) -> bool {
    !matches!(err, Error::BackingStoreTransient(_))
}

/// Drives the read -> process -> ack loop against a live `EventLog`,
/// tolerating a bad poll by logging and retrying rather than
/// unwinding the whole task.
pub struct StreamConsumer {
    log: Arc<dyn EventLog>,
    user_repo: Arc<dyn UserRepository>,
    tripwire: Arc<TripwireController>,
    read_count: usize,
    block_ms: usize,
    retry_delay: Duration,
}

impl StreamConsumer {
    pub fn new(
        log: Arc<dyn EventLog>,
        user_repo: Arc<dyn UserRepository>,
        tripwire: Arc<TripwireController>,
        read_count: usize,
        block_ms: usize,
    ) -> Self {
        Self {
            log,
            user_repo,
            tripwire,
            read_count,
            block_ms,
            retry_delay: Duration::from_secs(2),
        }
    }

    /// Run until `shutdown` is signalled. `ensure_group` is called
    /// once up front; a failure there is fatal, since there is no
    /// group to read from without it.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.start().await?;
        self.serve(shutdown).await
    }

    /// Create the consumer group (tolerating "already exists") and
    /// load the tripwire's disabled-bit cache. Split out from [`run`]
    /// so callers can signal readiness once startup succeeds, before
    /// entering the read loop.
    pub async fn start(&self) -> Result<()> {
        self.log.ensure_group().await?;
        self.tripwire.load().await
    }

    /// The read -> process -> ack loop, assuming [`start`] has already
    /// run.
    pub async fn serve(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                info!("stream consumer shutting down");
                return Ok(());
            }

            tokio::select! {
                _ = shutdown.changed() => continue,
                result = self.log.read_group(self.read_count, self.block_ms) => {
                    match result {
                        Ok(entries) => self.process_batch(&entries).await,
                        Err(e) => {
                            warn!(error = %e, "read_group failed, retrying");
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                }
            }
        }
    }

    async fn process_batch(&self, entries: &[LogEntry]) {
        for entry in entries {
            match process_entry(entry, self.user_repo.as_ref(), self.tripwire.as_ref()).await {
                Ok(()) => {
                    if let Err(e) = self.log.ack(&entry.id).await {
                        error!(id = %entry.id, error = %e, "failed to ack processed entry");
                    }
                }
                Err(e) if should_ack_on_error(&e) => {
                    warn!(id = %entry.id, error = %e, "dropping unprocessable entry");
                    if let Err(ack_err) = self.log.ack(&entry.id).await {
                        error!(id = %entry.id, error = %ack_err, "failed to ack dropped entry");
                    }
                }
                Err(e) => {
                    debug!(id = %entry.id, error = %e, "transient failure, leaving entry pending");
                }
            }
        }
    }
}
