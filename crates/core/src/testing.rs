//! In-memory collaborators for unit tests.

use crate::domain::account::TrackedAccount;
use crate::domain::post::{is_newer_post_id, CandidatePost, ProcessedPost};
use crate::domain::summary::{Action, Confidence, SignalSummary, TimeHorizon};
use crate::error::{SignalError, Stage};
use crate::feed::{FeedSource, Session, SessionProvider};
use crate::llm::Summarizer;
use crate::notify::Notifier;
use crate::storage::{AddAccountOutcome, CycleLease, SignalStore};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub fn candidate(id: &str, author: &str, text: &str) -> CandidatePost {
    CandidatePost {
        id: id.to_string(),
        author: author.to_string(),
        text: text.to_string(),
        url: CandidatePost::canonical_url(author, id),
        retrieved_at: Utc::now(),
        is_retweet: false,
        is_reply: false,
    }
}

pub fn sample_summary() -> SignalSummary {
    SignalSummary {
        summary_bullets: vec!["Author is adding to TSLA ahead of deliveries".to_string()],
        tickers: vec!["TSLA".to_string()],
        action: Action::Add,
        time_horizon: TimeHorizon::Weeks,
        confidence: Confidence::Medium,
        key_claims: vec![],
        risks_or_unknowns: vec!["Delivery miss".to_string()],
        what_to_verify: vec![],
    }
}

fn storage_failure(context: &'static str) -> SignalError {
    SignalError::storage(context)(sqlx::Error::PoolTimedOut)
}

#[derive(Default)]
struct Durable {
    accounts: BTreeMap<String, TrackedAccount>,
    processed: BTreeMap<String, ProcessedPost>,
    session: Option<Session>,
}

#[derive(Default)]
struct Faults {
    fail_list: bool,
    fail_inserts: bool,
    fail_last_seen: bool,
}

/// Store whose durable half survives [`MemoryStore::restart`]. Clones share
/// everything, like two processes on one database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    durable: Arc<Mutex<Durable>>,
    faults: Arc<Mutex<Faults>>,
    cycle_locked: Arc<AtomicBool>,
}

struct MemoryLease(Arc<AtomicBool>);

#[async_trait::async_trait]
impl CycleLease for MemoryLease {
    async fn release(self: Box<Self>) {}
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MemoryStore {
    /// A fresh handle over the same durable state, as after a process restart.
    pub fn restart(&self) -> Self {
        Self {
            durable: Arc::clone(&self.durable),
            faults: Arc::default(),
            cycle_locked: Arc::default(),
        }
    }

    pub fn fail_list(&self, on: bool) {
        self.faults.lock().unwrap().fail_list = on;
    }

    pub fn fail_inserts(&self, on: bool) {
        self.faults.lock().unwrap().fail_inserts = on;
    }

    pub fn fail_last_seen(&self, on: bool) {
        self.faults.lock().unwrap().fail_last_seen = on;
    }

    pub fn processed_count(&self) -> usize {
        self.durable.lock().unwrap().processed.len()
    }

    pub fn processed(&self, post_id: &str) -> Option<ProcessedPost> {
        self.durable.lock().unwrap().processed.get(post_id).cloned()
    }

    pub fn account(&self, handle: &str) -> Option<TrackedAccount> {
        self.durable.lock().unwrap().accounts.get(handle).cloned()
    }
}

#[async_trait::async_trait]
impl SignalStore for MemoryStore {
    async fn list_accounts(&self) -> Result<Vec<TrackedAccount>, SignalError> {
        if self.faults.lock().unwrap().fail_list {
            return Err(storage_failure("select tracked_accounts"));
        }
        Ok(self.durable.lock().unwrap().accounts.values().cloned().collect())
    }

    async fn add_account(
        &self,
        handle: &str,
        user_id: Option<&str>,
    ) -> Result<AddAccountOutcome, SignalError> {
        let mut durable = self.durable.lock().unwrap();
        if durable.accounts.contains_key(handle) {
            return Ok(AddAccountOutcome::AlreadyTracked);
        }
        let now = Utc::now();
        let account = TrackedAccount {
            handle: handle.to_string(),
            user_id: user_id.map(str::to_string),
            last_seen_post_id: None,
            created_at: now,
            updated_at: now,
        };
        durable.accounts.insert(handle.to_string(), account.clone());
        Ok(AddAccountOutcome::Added(account))
    }

    async fn remove_account(&self, handle: &str) -> Result<bool, SignalError> {
        Ok(self.durable.lock().unwrap().accounts.remove(handle).is_some())
    }

    async fn update_last_seen(&self, handle: &str, post_id: &str) -> Result<(), SignalError> {
        if self.faults.lock().unwrap().fail_last_seen {
            return Err(storage_failure("update tracked_accounts.last_seen_post_id"));
        }
        if let Some(account) = self.durable.lock().unwrap().accounts.get_mut(handle) {
            let newer = account
                .last_seen_post_id
                .as_deref()
                .map_or(true, |current| is_newer_post_id(post_id, current));
            if newer {
                account.last_seen_post_id = Some(post_id.to_string());
                account.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn is_processed(&self, post_id: &str) -> Result<bool, SignalError> {
        Ok(self.durable.lock().unwrap().processed.contains_key(post_id))
    }

    async fn insert_processed(&self, post: &ProcessedPost) -> Result<(), SignalError> {
        if self.faults.lock().unwrap().fail_inserts {
            return Err(storage_failure("insert processed_posts"));
        }
        let mut durable = self.durable.lock().unwrap();
        if durable.processed.contains_key(&post.post_id) {
            return Err(SignalError::Conflict {
                post_id: post.post_id.clone(),
            });
        }
        durable.processed.insert(post.post_id.clone(), post.clone());
        Ok(())
    }

    async fn try_lock_cycle(&self) -> Result<Option<Box<dyn CycleLease>>, SignalError> {
        if self.cycle_locked.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(Box::new(MemoryLease(Arc::clone(&self.cycle_locked)))))
    }

    async fn load_session(&self) -> Result<Option<Session>, SignalError> {
        Ok(self.durable.lock().unwrap().session.clone())
    }

    async fn save_session(&self, session: &Session) -> Result<(), SignalError> {
        self.durable.lock().unwrap().session = Some(session.clone());
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), SignalError> {
        self.durable.lock().unwrap().session = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSessions {
    pub fail: bool,
    pub calls: AtomicU32,
    pub invalidations: AtomicU32,
}

#[async_trait::async_trait]
impl SessionProvider for FakeSessions {
    async fn session(&self) -> Result<Session, SignalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SignalError::transient(Stage::Session, "login page unreachable"));
        }
        Ok(Session {
            auth_token: "auth".to_string(),
            ct0: "ct0".to_string(),
        })
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Feed returning a fixed batch, or failing at `fail_stage`.
#[derive(Default)]
pub struct FakeFeed {
    pub posts: Vec<CandidatePost>,
    pub fail_stage: Option<Stage>,
    pub calls: AtomicU32,
    pub last_handles: Mutex<Option<BTreeSet<String>>>,
}

impl FakeFeed {
    pub fn returning(posts: Vec<CandidatePost>) -> Self {
        Self {
            posts,
            ..Self::default()
        }
    }

    pub fn failing(stage: Stage) -> Self {
        Self {
            fail_stage: Some(stage),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl FeedSource for FakeFeed {
    fn source_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch(
        &self,
        _session: &Session,
        handles: &BTreeSet<String>,
        max_posts: usize,
    ) -> Result<Vec<CandidatePost>, SignalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_handles.lock().unwrap() = Some(handles.clone());
        if let Some(stage) = self.fail_stage {
            return Err(SignalError::transient(stage, "timeline request failed"));
        }
        Ok(self.posts.iter().take(max_posts).cloned().collect())
    }
}

pub enum SummaryScript {
    Succeed(SignalSummary),
    FailParse,
    /// Fails this many times with a transient error, then succeeds.
    FlakyThen(u32, SignalSummary),
    PanicOn(String),
    /// Succeeds after sleeping this long.
    Slow(std::time::Duration, SignalSummary),
}

pub struct FakeSummarizer {
    pub script: SummaryScript,
    pub calls: AtomicU32,
}

impl FakeSummarizer {
    pub fn new(script: SummaryScript) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait::async_trait]
impl Summarizer for FakeSummarizer {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn summarize(&self, text: &str, _author: &str) -> Result<SignalSummary, SignalError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            SummaryScript::Succeed(summary) => Ok(summary.clone()),
            SummaryScript::FailParse => Err(SignalError::parse(Stage::Summarize, "not json")),
            SummaryScript::FlakyThen(failures, summary) => {
                if n < *failures {
                    Err(SignalError::transient(Stage::Summarize, "HTTP 529"))
                } else {
                    Ok(summary.clone())
                }
            }
            SummaryScript::Slow(delay, summary) => {
                tokio::time::sleep(*delay).await;
                Ok(summary.clone())
            }
            SummaryScript::PanicOn(trigger) => {
                if text.contains(trigger.as_str()) {
                    panic!("summarizer blew up on {trigger}");
                }
                Ok(sample_summary())
            }
        }
    }
}

pub struct FakeNotifier {
    pub fail: bool,
    pub max_chars: usize,
    pub calls: AtomicU32,
    pub sent: Mutex<Vec<String>>,
}

impl FakeNotifier {
    pub fn accepting() -> Self {
        Self {
            fail: false,
            max_chars: 4096,
            calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::accepting()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for FakeNotifier {
    fn sink_name(&self) -> &'static str {
        "fake"
    }

    fn max_message_chars(&self) -> usize {
        self.max_chars
    }

    async fn send(&self, message: &str) -> Result<(), SignalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SignalError::transient(Stage::Notify, "HTTP 502"));
        }
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
}
