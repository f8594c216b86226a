//! The fetch, compare, persist, notify loop.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::diff::Diff;
use crate::fetch::{Fetch, FetchError};
use crate::snapshot::SnapshotStore;
use crate::webhook::{self, Notify, WebhookError};

/// Consecutive unsuccessful cycles after which failures are logged as warnings.
const REPEATED_FAILURE_THRESHOLD: u32 = 3;

/// What happened during a cycle that ran to completion.
#[derive(Debug)]
pub enum CycleOutcome {
    /// There was no snapshot yet, so the fetched page became the snapshot.
    Bootstrapped,

    /// The fetched page matched the snapshot.
    Unchanged,

    /// The page changed; the snapshot was replaced and a notification sent.
    Notified { changed_lines: usize },

    /// The page couldn't be fetched. Nothing was touched.
    Skipped(FetchError),
}

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("failed to read snapshot")]
    ReadSnapshot(#[source] io::Error),

    #[error("failed to write snapshot")]
    WriteSnapshot(#[source] io::Error),

    #[error("failed to deliver notification")]
    Notify(#[from] WebhookError),
}

pub type CycleResult = Result<CycleOutcome, CycleError>;

pub struct Monitor<F, N> {
    url: Url,
    store: SnapshotStore,
    fetcher: F,
    notifier: N,
}

impl<F: Fetch, N: Notify> Monitor<F, N> {
    pub fn new(url: Url, store: SnapshotStore, fetcher: F, notifier: N) -> Self {
        Self {
            url,
            store,
            fetcher,
            notifier,
        }
    }

    /// Runs a single cycle without sleeping or logging its outcome.
    pub fn run_cycle(&self) -> CycleResult {
        let text = match self.fetcher.fetch(&self.url) {
            Ok(text) => text,
            Err(err) => return Ok(CycleOutcome::Skipped(err)),
        };

        let stored = match self.store.load().map_err(CycleError::ReadSnapshot)? {
            Some(stored) => stored,
            None => {
                self.store
                    .store(&text)
                    .map_err(CycleError::WriteSnapshot)?;
                return Ok(CycleOutcome::Bootstrapped);
            }
        };

        let diff = Diff::between(&stored, &text);
        if diff.is_empty() {
            return Ok(CycleOutcome::Unchanged);
        }

        let message = webhook::format_diff_message(&diff, webhook::DISCORD_MESSAGE_LIMIT);

        // The snapshot is replaced before delivery; a failed delivery is not retried.
        self.store
            .store(&text)
            .map_err(CycleError::WriteSnapshot)?;
        self.notifier.notify(&message)?;

        Ok(CycleOutcome::Notified {
            changed_lines: diff.changed_lines(),
        })
    }

    /// Runs a single cycle, containing any panic raised inside of it.
    pub fn run_cycle_contained(&self) -> std::thread::Result<CycleResult> {
        panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle()))
    }

    /// Runs cycles forever, sleeping for `interval` after each one no matter
    /// how it went.
    pub fn run_forever(&self, interval: Duration) -> ! {
        let mut failures = 0;
        let mut number: u64 = 0;

        loop {
            number += 1;

            let cycle_span = tracing::info_span!("cycle", number);
            let _enter = cycle_span.enter();

            report(self.run_cycle_contained(), &mut failures, self.store.path());

            tracing::trace!("sleeping for {:?}", interval);
            std::thread::sleep(interval);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Logs the result of a cycle and keeps track of consecutive failures.
fn report(result: std::thread::Result<CycleResult>, failures: &mut u32, path: &Path) {
    let succeeded = !matches!(
        result,
        Ok(Ok(CycleOutcome::Skipped(_))) | Ok(Err(_)) | Err(_)
    );

    match result {
        Ok(Ok(CycleOutcome::Bootstrapped)) => {
            tracing::info!(
                ?path,
                "no snapshot found, wrote page contents and skipped this cycle"
            );
        }
        Ok(Ok(CycleOutcome::Unchanged)) => {
            tracing::info!("no update");
        }
        Ok(Ok(CycleOutcome::Notified { changed_lines })) => {
            tracing::info!(
                changed_lines,
                ?path,
                "differences found, overwrote snapshot and sent notification"
            );
        }
        Ok(Ok(CycleOutcome::Skipped(err))) => {
            tracing::error!("request failed, skipping: {:?}", err);
        }
        Ok(Err(err)) => {
            tracing::error!("cycle failed: {:?}", err);
        }
        Err(payload) => {
            tracing::error!("cycle panicked: {}", panic_message(payload.as_ref()));
        }
    }

    if succeeded {
        if *failures >= REPEATED_FAILURE_THRESHOLD {
            tracing::info!("recovered after {} failed cycles", failures);
        }
        *failures = 0;
    } else {
        *failures = failures.saturating_add(1);
        if *failures >= REPEATED_FAILURE_THRESHOLD {
            tracing::warn!(
                failures = *failures,
                "cycles keep failing, still polling at the configured interval"
            );
        }
    }
}
