//! One poll cycle: accounts → session → feed → per-post pipeline → stats.
//!
//! A cycle never returns an error. Failures become counters in [`CycleStats`];
//! only a missing session or feed ends a cycle early.

use crate::config::{PollSettings, Settings};
use crate::dedup::Deduplicator;
use crate::domain::post::CandidatePost;
use crate::domain::stats::CycleStats;
use crate::domain::summary::SignalSummary;
use crate::error::{SignalError, Stage};
use crate::extract::FallbackSignal;
use crate::feed::{BirdFeedSource, FeedSource, SessionProvider, StoredSessionProvider};
use crate::format;
use crate::llm::{AnthropicSummarizer, Summarizer};
use crate::notify::{Notifier, TelegramNotifier};
use crate::retry::{call_with_retry, RetryOutcome};
use crate::storage::SignalStore;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// What happened to a single candidate post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PostReport {
    duplicate: bool,
    processed: bool,
    notified: bool,
    errors: u32,
}

impl PostReport {
    fn duplicate() -> Self {
        Self {
            duplicate: true,
            ..Self::default()
        }
    }

    fn failed() -> Self {
        Self {
            errors: 1,
            ..Self::default()
        }
    }
}

fn absorb(stats: &mut CycleStats, report: PostReport) {
    stats.posts_skipped_duplicate += u32::from(report.duplicate);
    stats.posts_processed += u32::from(report.processed);
    stats.notifications_sent += u32::from(report.notified);
    stats.errors += report.errors;
}

#[derive(Clone)]
pub struct PollOrchestrator {
    store: Arc<dyn SignalStore>,
    dedup: Deduplicator,
    sessions: Arc<dyn SessionProvider>,
    feed: Arc<dyn FeedSource>,
    summarizer: Arc<dyn Summarizer>,
    notifier: Arc<dyn Notifier>,
    settings: PollSettings,
}

impl PollOrchestrator {
    pub fn new(
        store: Arc<dyn SignalStore>,
        sessions: Arc<dyn SessionProvider>,
        feed: Arc<dyn FeedSource>,
        summarizer: Arc<dyn Summarizer>,
        notifier: Arc<dyn Notifier>,
        settings: PollSettings,
    ) -> Self {
        Self {
            dedup: Deduplicator::new(Arc::clone(&store)),
            store,
            sessions,
            feed,
            summarizer,
            notifier,
            settings,
        }
    }

    /// Production wiring: stored session, `bird` feed, Anthropic, Telegram.
    pub fn from_settings(
        settings: &Settings,
        poll: PollSettings,
        store: Arc<dyn SignalStore>,
    ) -> anyhow::Result<Self> {
        let sessions = StoredSessionProvider::from_settings(settings, Arc::clone(&store));
        let feed = BirdFeedSource::from_env(poll.posts_per_account);
        let summarizer = AnthropicSummarizer::from_settings(settings, poll.call_timeout)?;
        let notifier = TelegramNotifier::from_settings(settings)?;
        Ok(Self::new(
            store,
            Arc::new(sessions),
            Arc::new(feed),
            Arc::new(summarizer),
            Arc::new(notifier),
            poll,
        ))
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn SignalStore> {
        Arc::clone(&self.store)
    }

    pub async fn run_cycle(&self) -> CycleStats {
        let cycle_id = uuid::Uuid::new_v4();
        let stats = self
            .cycle()
            .instrument(tracing::info_span!("poll_cycle", %cycle_id))
            .await;
        tracing::info!(
            %cycle_id,
            posts_fetched = stats.posts_fetched,
            posts_processed = stats.posts_processed,
            posts_skipped_duplicate = stats.posts_skipped_duplicate,
            notifications_sent = stats.notifications_sent,
            errors = stats.errors,
            "poll cycle complete"
        );
        stats
    }

    async fn cycle(&self) -> CycleStats {
        let mut stats = CycleStats::default();

        let accounts = match self.store.list_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                tracing::error!(error = %err, "failed to load tracked accounts");
                stats.errors += 1;
                return stats;
            }
        };
        if accounts.is_empty() {
            tracing::info!("no tracked accounts; nothing to poll");
            return stats;
        }
        let handles: BTreeSet<String> = accounts.into_iter().map(|a| a.handle).collect();
        tracing::info!(tracked = handles.len(), "starting poll cycle");

        let session = bounded(
            Stage::Session,
            self.settings.call_timeout,
            self.sessions.session(),
        )
        .await;
        let session = match session {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(error = %err, "failed to obtain feed session");
                stats.errors += 1;
                return stats;
            }
        };

        // The feed makes one external call per handle.
        let per_handle = u32::try_from(handles.len()).unwrap_or(u32::MAX);
        let feed_timeout = self.settings.call_timeout.saturating_mul(per_handle);
        let fetched = bounded(
            Stage::Feed,
            feed_timeout,
            self.feed.fetch(&session, &handles, self.settings.max_posts),
        )
        .await;
        let mut posts = match fetched {
            Ok(posts) => posts,
            Err(err) => {
                tracing::error!(source = self.feed.source_name(), error = %err, "failed to fetch feed");
                stats.errors += 1;
                if err.is_session_rejected() {
                    self.sessions.invalidate().await;
                }
                return stats;
            }
        };
        posts.truncate(self.settings.max_posts);
        stats.posts_fetched = u32::try_from(posts.len()).unwrap_or(u32::MAX);

        for post in posts {
            let post_id = post.id.clone();
            let this = self.clone();
            let span = tracing::info_span!("post", post_id = %post_id, handle = %post.author);
            let task = tokio::spawn(async move { this.process_post(post).await }.instrument(span));
            let report = match task.await {
                Ok(report) => report,
                Err(join_err) => {
                    tracing::error!(%post_id, error = %join_err, "post processing aborted");
                    PostReport::failed()
                }
            };
            absorb(&mut stats, report);
        }

        stats
    }

    async fn process_post(&self, post: CandidatePost) -> PostReport {
        match self.dedup.is_processed(&post.id).await {
            Ok(true) => {
                tracing::debug!("skipping already processed post");
                return PostReport::duplicate();
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(error = %err, "dedup check failed; leaving post for next cycle");
                return PostReport::failed();
            }
        }
        tracing::info!(retweet = post.is_retweet, reply = post.is_reply, "processing new post");

        let fallback = FallbackSignal::from_text(&post.text);
        let summary = self.summarize(&post).await;

        let chunks = format::format(
            &post,
            summary.as_ref(),
            &fallback.tickers,
            &fallback.actions,
            self.notifier.max_message_chars(),
        );
        let notified = self.deliver(&chunks).await;

        let mut report = PostReport {
            notified,
            errors: u32::from(!notified),
            ..PostReport::default()
        };

        match self.dedup.mark_processed(&post, summary.as_ref()).await {
            Ok(_) => {
                report.processed = true;
                if let Err(err) = self.store.update_last_seen(&post.author, &post.id).await {
                    tracing::error!(error = %err, "failed to advance last-seen marker");
                    report.errors += 1;
                }
            }
            Err(SignalError::Conflict { .. }) => {
                tracing::warn!("post was recorded concurrently; counting as duplicate");
                report.duplicate = true;
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    notified,
                    "failed to record processed post; it will be picked up again next cycle"
                );
                report.errors += 1;
            }
        }

        report
    }

    async fn summarize(&self, post: &CandidatePost) -> Option<SignalSummary> {
        let summarizer = &*self.summarizer;
        let (text, author) = (post.text.as_str(), post.author.as_str());
        let outcome = call_with_retry(self.settings.summary_retry(), Stage::Summarize, move || {
            summarizer.summarize(text, author)
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { value, .. } => Some(value),
            RetryOutcome::Failed {
                attempts,
                last_error,
            } => {
                tracing::warn!(
                    provider = summarizer.provider_name(),
                    attempts,
                    error = %last_error,
                    "summary unavailable; using fallback extraction"
                );
                None
            }
        }
    }

    /// Sends every chunk in order; stops at the first chunk that exhausts its retries.
    async fn deliver(&self, chunks: &[String]) -> bool {
        let notifier = &*self.notifier;
        for (idx, chunk) in chunks.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.settings.chunk_pause).await;
            }
            let chunk = chunk.as_str();
            let outcome = call_with_retry(self.settings.notify_retry(), Stage::Notify, move || {
                notifier.send(chunk)
            })
            .await;

            if let RetryOutcome::Failed {
                attempts,
                last_error,
            } = outcome
            {
                tracing::error!(
                    sink = notifier.sink_name(),
                    chunk = idx + 1,
                    chunks = chunks.len(),
                    attempts,
                    error = %last_error,
                    "notification failed"
                );
                return false;
            }
        }
        true
    }
}

async fn bounded<T, F>(stage: Stage, limit: Duration, fut: F) -> Result<T, SignalError>
where
    F: Future<Output = Result<T, SignalError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SignalError::transient(
            stage,
            format!("timed out after {limit:?}"),
        )),
    }
}
