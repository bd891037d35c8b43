//! Per-account collection cycle
//!
//! One cycle fetches the account's list timeline above the stored
//! watermark, reshares every post whose text matches the criterion term,
//! and persists the highest post id seen. On the very first cycle the
//! backfill guard suppresses reshares of posts the account already
//! reshared before the service was activated.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;

use crate::matcher::Matcher;
use crate::model::{Credentials, CycleReport, PostId};
use crate::ports::{
    CredentialStore, ReshareError, Resharer, StoreError, TimelineError, TimelineSource,
    WatermarkStore,
};

/// Errors from a collection cycle. All of them abort the cycle with the
/// watermark unchanged; the account is retried on the next dispatch.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("stored pattern failed to compile: {0}")]
    Pattern(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("timeline error: {0}")]
    Timeline(#[from] TimelineError),
    #[error("reshare error: {0}")]
    Reshare(#[from] ReshareError),
}

impl CollectError {
    /// Whether the cycle died on rejected credentials rather than a
    /// transient failure. Affects logging only; neither case
    /// de-registers the account.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            CollectError::Store(StoreError::NotFound(_))
                | CollectError::Timeline(TimelineError::Auth(_))
                | CollectError::Reshare(ReshareError::Auth(_))
        )
    }
}

/// First-run backfill guard: snapshot the post ids the account has
/// already reshared, so the initial unbounded fetch cannot trigger a
/// reshare storm over historical matches.
async fn backfill_guard<T: TimelineSource + ?Sized>(
    timeline: &T,
    credentials: &Credentials,
    handle: &str,
) -> Result<HashSet<PostId>, TimelineError> {
    let history = timeline.reshare_history(credentials, handle).await?;
    tracing::info!(
        handle = %handle,
        already_reshared = history.len(),
        "First cycle for account, snapshotted reshare history"
    );
    Ok(history)
}

/// Orchestrates one account's collection cycle.
pub struct Collector<C, W, T, R>
where
    C: CredentialStore + ?Sized,
    W: WatermarkStore + ?Sized,
    T: TimelineSource + ?Sized,
    R: Resharer + ?Sized,
{
    credentials: Arc<C>,
    watermarks: Arc<W>,
    timeline: Arc<T>,
    resharer: Arc<R>,
    dry_run: bool,
}

impl<C, W, T, R> Collector<C, W, T, R>
where
    C: CredentialStore + ?Sized,
    W: WatermarkStore + ?Sized,
    T: TimelineSource + ?Sized,
    R: Resharer + ?Sized,
{
    pub fn new(
        credentials: Arc<C>,
        watermarks: Arc<W>,
        timeline: Arc<T>,
        resharer: Arc<R>,
        dry_run: bool,
    ) -> Self {
        Self {
            credentials,
            watermarks,
            timeline,
            resharer,
            dry_run,
        }
    }

    /// Run one cycle for the account. Any error aborts the cycle before
    /// the watermark write, leaving the account to be retried with the
    /// same watermark on the next dispatch.
    pub async fn collect(
        &self,
        handle: &str,
        term: &str,
        list_id: &str,
    ) -> Result<CycleReport, CollectError> {
        let matcher = Matcher::new(term).map_err(|e| CollectError::Pattern(e.to_string()))?;

        let credentials = self.credentials.credentials(handle).await?;
        let watermark = self.watermarks.watermark(handle).await?;

        let already_reshared = match watermark {
            None => backfill_guard(self.timeline.as_ref(), &credentials, handle).await?,
            Some(_) => HashSet::new(),
        };

        tracing::info!(
            handle = %handle,
            list_id = %list_id,
            watermark = ?watermark,
            "Fetching list timeline"
        );

        let mut posts = self
            .timeline
            .fetch(&credentials, handle, list_id, watermark)
            .await?;

        let mut report = CycleReport::default();
        let mut max_seen: Option<PostId> = None;

        while let Some(post) = posts.next().await {
            let post = post?;
            report.seen += 1;
            // Max across the whole cycle; pages may arrive out of id order.
            max_seen = Some(max_seen.map_or(post.id, |m| m.max(post.id)));

            if !matcher.matches(&post.text) {
                continue;
            }

            if already_reshared.contains(&post.id) {
                tracing::debug!(handle = %handle, post_id = post.id, "Already reshared before first cycle, skipping");
                report.suppressed += 1;
                continue;
            }

            if self.dry_run {
                tracing::info!(
                    handle = %handle,
                    post_id = post.id,
                    author = %post.author,
                    "[DRY RUN] Would reshare"
                );
            } else {
                self.resharer
                    .reshare(&credentials, handle, post.id)
                    .await?;
                tracing::info!(handle = %handle, post_id = post.id, author = %post.author, "Reshared");
            }
            report.reshared.push(post.id);
        }

        // Compared once, after the stream is exhausted. Never advances on
        // an aborted cycle, never moves backwards.
        if let Some(max_seen) = max_seen {
            if watermark.is_none_or(|w| max_seen > w) {
                self.watermarks.set_watermark(handle, max_seen).await?;
                report.new_watermark = Some(max_seen);
                tracing::debug!(handle = %handle, watermark = max_seen, "Advanced watermark");
            }
        }

        Ok(report)
    }
}
