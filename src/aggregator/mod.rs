//! Aggregation façade: the two operations collaborators call
//!
//! Producers call [`Aggregator::submit`]; the publish side registers a
//! [`Publisher`] (or a plain callback through [`Aggregator::on_snapshot`])
//! and gets a [`SchedulerHandle`] back. The sample buffer itself is never
//! handed out.

mod policy;

pub use policy::{InvalidSamplePolicy, PolicyDecision};

use crate::buffer::SampleBuffer;
use crate::error::AggregateError;
use crate::publish::{CallbackPublisher, Publisher};
use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
use crate::snapshot::Snapshot;
use crate::types::{UserId, ValidationError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Predicate deciding whether a user may submit at all
///
/// Authorization lives with the caller; this is only the injection point.
pub type SubmitGuard = Arc<dyn Fn(&UserId) -> bool + Send + Sync>;

/// Reasons a submission is refused
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum SubmitError {
    #[error("invalid user: {0}")]
    InvalidUser(#[from] ValidationError),

    #[error("user '{user}' is not allowed to submit")]
    NotAllowed { user: UserId },

    #[error(transparent)]
    Rejected(#[from] AggregateError),
}

/// What happened to an accepted submission
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubmitOutcome {
    /// Value buffered as submitted
    Buffered,
    /// Non-finite value clamped to the given bound, then buffered
    Clamped(f64),
    /// Non-finite value dropped by the `ignore` policy
    Ignored,
}

struct AggregatorInner {
    buffer: Arc<SampleBuffer>,
    policy: InvalidSamplePolicy,
    guard: Option<SubmitGuard>,
}

/// Owns the sample buffer and mediates every access to it
///
/// Cheap to clone; clones share the same buffer.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<AggregatorInner>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("policy", &self.inner.policy)
            .field("guarded", &self.inner.guard.is_some())
            .field("buffered_users", &self.inner.buffer.len())
            .finish()
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(InvalidSamplePolicy::default())
    }
}

impl Aggregator {
    /// Create an aggregator with an empty buffer
    #[must_use]
    pub fn new(policy: InvalidSamplePolicy) -> Self {
        Self::builder().policy(policy).build()
    }

    #[must_use]
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::default()
    }

    /// Configured invalid-sample policy
    #[must_use]
    pub fn policy(&self) -> InvalidSamplePolicy {
        self.inner.policy
    }

    /// Submit one sample for `user`
    ///
    /// # Errors
    /// - [`SubmitError::InvalidUser`] if `user` is empty or whitespace
    /// - [`SubmitError::NotAllowed`] if the guard refuses the user
    /// - [`SubmitError::Rejected`] if the value is non-finite and the policy rejects it
    pub fn submit(&self, user: &str, value: f64) -> Result<SubmitOutcome, SubmitError> {
        let user = UserId::try_from(user)?;
        self.submit_for(&user, value)
    }

    /// Submit one sample for an already validated user
    ///
    /// # Errors
    /// See [`Aggregator::submit`].
    pub fn submit_for(&self, user: &UserId, value: f64) -> Result<SubmitOutcome, SubmitError> {
        if let Some(guard) = &self.inner.guard
            && !guard(user)
        {
            debug!(user = %user, "Submission from user not on the allow list");
            return Err(SubmitError::NotAllowed { user: user.clone() });
        }

        let (value, outcome) = match self.inner.policy.apply(value) {
            PolicyDecision::Accept(v) => (v, SubmitOutcome::Buffered),
            PolicyDecision::Clamped(v) => (v, SubmitOutcome::Clamped(v)),
            PolicyDecision::Drop => {
                debug!(user = %user, value, "Ignoring non-finite sample");
                return Ok(SubmitOutcome::Ignored);
            }
            PolicyDecision::Reject => {
                return Err(AggregateError::InvalidSample {
                    user: user.to_string(),
                    value,
                }
                .into());
            }
        };

        self.inner.buffer.submit(user, value)?;
        trace!(user = %user, value, "Sample buffered");
        Ok(outcome)
    }

    /// Number of users with samples waiting for the next tick
    #[must_use]
    pub fn buffered_users(&self) -> usize {
        self.inner.buffer.len()
    }

    /// Number of samples waiting for the next tick
    #[must_use]
    pub fn buffered_samples(&self) -> usize {
        self.inner.buffer.sample_count()
    }

    /// Start the periodic cycle, delivering snapshots to `publisher`
    #[must_use]
    pub fn start<P>(&self, config: SchedulerConfig, publisher: P) -> SchedulerHandle
    where
        P: Publisher + 'static,
    {
        self.start_shared(config, Arc::new(publisher))
    }

    /// Start the periodic cycle with an already shared publisher
    #[must_use]
    pub fn start_shared(
        &self,
        config: SchedulerConfig,
        publisher: Arc<dyn Publisher>,
    ) -> SchedulerHandle {
        Scheduler::spawn(Arc::clone(&self.inner.buffer), config, publisher)
    }

    /// Start the periodic cycle, invoking `callback` once per tick
    ///
    /// The callback also receives empty snapshots. Errors it returns are
    /// logged and do not stop later ticks.
    #[must_use]
    pub fn on_snapshot<F>(&self, config: SchedulerConfig, callback: F) -> SchedulerHandle
    where
        F: Fn(&Snapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.start(config, CallbackPublisher::new("on_snapshot", callback))
    }
}

/// Builder for [`Aggregator`]
#[derive(Default)]
pub struct AggregatorBuilder {
    policy: InvalidSamplePolicy,
    guard: Option<SubmitGuard>,
}

impl AggregatorBuilder {
    #[must_use]
    pub fn policy(mut self, policy: InvalidSamplePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Refuse submissions from users the predicate rejects
    #[must_use]
    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&UserId) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    #[must_use]
    pub fn build(self) -> Aggregator {
        Aggregator {
            inner: Arc::new(AggregatorInner {
                buffer: Arc::new(SampleBuffer::new()),
                policy: self.policy,
                guard: self.guard,
            }),
        }
    }
}
