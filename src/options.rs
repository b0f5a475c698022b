//! # Request options.
//!
//! Provides [`Options`], the per-orchestrator policy record, and [`RatePolicy`],
//! the rate-limiting mode derived from it.
//!
//! Options are used in two ways:
//! 1. **Construction**: `Orchestrator::new(op, options)` or `OrchestratorBuilder::with_options`
//! 2. **Updates**: `Orchestrator::update_options(|opts| ...)` edits a copy which then
//!    replaces the current record
//!
//! ## Sentinel values
//! - `debounce_interval`, `throttle_interval`, `polling_interval` of `Some(0s)` are
//!   treated as `None` (disabled) and normalized away.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RequestError;

/// Hook invoked synchronously before each execution with its arguments.
pub type BeforeHook<A> = Arc<dyn Fn(&A) + Send + Sync>;
/// Hook invoked with the formatted result and the arguments that produced it.
pub type SuccessHook<R, A> = Arc<dyn Fn(&R, &A) + Send + Sync>;
/// Hook invoked with the failure and the arguments that produced it.
pub type ErrorHook<A> = Arc<dyn Fn(&RequestError, &A) + Send + Sync>;
/// Hook invoked after success, failure or cache hit.
pub type FinallyHook = Arc<dyn Fn() + Send + Sync>;
/// Maps a raw operation result to the value handed to callers.
pub type Formatter<R, A> = Arc<dyn Fn(R, &A) -> R + Send + Sync>;

/// Default persisted-cache lifetime (5 minutes).
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);
/// Default minimum spacing between focus-triggered refreshes.
pub const DEFAULT_FOCUS_TIMESPAN: Duration = Duration::from_secs(5);

/// Policy record for one orchestrator.
///
/// ## Field semantics
/// - `cache_key`: identifies both the persisted-cache slot and the shared in-flight slot
/// - `cache_time`: TTL used when writing successful results to the cache
/// - `persisted`: read the cache before executing (a hit skips the operation)
/// - `debounce_interval` / `throttle_interval`: route `run` through a rate adapter
///   (debounce wins if both are set)
/// - `polling_interval`: re-run with the same arguments after each settlement
/// - `polling_when_hidden`: keep polling while the page is hidden
/// - `refresh_on_window_focus` / `focus_timespan`: refresh on focus, at most once per span
/// - `default_params`: initial arguments used by `refresh` before the first `run`
pub struct Options<R, A> {
    /// Shared/persisted identity of the request.
    pub cache_key: Option<String>,
    /// Persisted entry lifetime.
    pub cache_time: Duration,
    /// Whether a warm persisted entry short-circuits execution.
    pub persisted: bool,
    /// Result formatter (identity when absent).
    pub format_result: Option<Formatter<R, A>>,
    /// Called before every execution.
    pub on_before: Option<BeforeHook<A>>,
    /// Called with each current successful result.
    pub on_success: Option<SuccessHook<R, A>>,
    /// Called with each current failure.
    pub on_error: Option<ErrorHook<A>>,
    /// Called after each current settlement.
    pub on_finally: Option<FinallyHook>,
    /// Trailing-edge debounce for `run`.
    pub debounce_interval: Option<Duration>,
    /// Leading+trailing throttle for `run`.
    pub throttle_interval: Option<Duration>,
    /// Delay between a settlement and the next automatic run.
    pub polling_interval: Option<Duration>,
    /// Keep polling while the page is hidden.
    pub polling_when_hidden: bool,
    /// Refresh when the window regains focus.
    ///
    /// A focus before the first `run` only refreshes when `default_params` is set.
    pub refresh_on_window_focus: bool,
    /// Minimum spacing between focus-triggered refreshes.
    pub focus_timespan: Duration,
    /// Arguments assumed as "current" until the first `run`.
    pub default_params: Option<A>,
}

impl<R, A> Options<R, A> {
    /// Returns the debounce interval, if enabled.
    #[inline]
    pub fn debounce(&self) -> Option<Duration> {
        self.debounce_interval.filter(|d| !d.is_zero())
    }

    /// Returns the throttle interval, if enabled.
    #[inline]
    pub fn throttle(&self) -> Option<Duration> {
        self.throttle_interval.filter(|d| !d.is_zero())
    }

    /// Returns the polling interval, if enabled.
    #[inline]
    pub fn polling(&self) -> Option<Duration> {
        self.polling_interval.filter(|d| !d.is_zero())
    }

    /// Returns the rate-limiting mode these options ask for.
    pub fn rate_policy(&self) -> RatePolicy {
        match (self.debounce(), self.throttle()) {
            (Some(wait), _) => RatePolicy::Debounce(wait),
            (None, Some(wait)) => RatePolicy::Throttle(wait),
            (None, None) => RatePolicy::Immediate,
        }
    }

    /// Drops zero-valued interval sentinels.
    pub fn normalized(mut self) -> Self {
        self.debounce_interval = self.debounce();
        self.throttle_interval = self.throttle();
        self.polling_interval = self.polling();
        self
    }

    /// Applies the formatter, or returns `raw` unchanged.
    pub(crate) fn format(&self, raw: R, args: &A) -> R {
        match &self.format_result {
            Some(f) => f(raw, args),
            None => raw,
        }
    }

    /// Sets the cache key.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Sets the persisted-cache TTL.
    pub fn with_cache_time(mut self, ttl: Duration) -> Self {
        self.cache_time = ttl;
        self
    }

    /// Enables or disables reading the persisted cache before executing.
    pub fn with_persisted(mut self, persisted: bool) -> Self {
        self.persisted = persisted;
        self
    }

    /// Sets the result formatter.
    pub fn with_format_result(mut self, f: impl Fn(R, &A) -> R + Send + Sync + 'static) -> Self {
        self.format_result = Some(Arc::new(f));
        self
    }

    /// Sets the `on_before` hook.
    pub fn with_on_before(mut self, f: impl Fn(&A) + Send + Sync + 'static) -> Self {
        self.on_before = Some(Arc::new(f));
        self
    }

    /// Sets the `on_success` hook.
    pub fn with_on_success(mut self, f: impl Fn(&R, &A) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Sets the `on_error` hook.
    pub fn with_on_error(mut self, f: impl Fn(&RequestError, &A) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Sets the `on_finally` hook.
    pub fn with_on_finally(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_finally = Some(Arc::new(f));
        self
    }

    /// Debounces `run` by `wait`.
    pub fn with_debounce(mut self, wait: Duration) -> Self {
        self.debounce_interval = Some(wait);
        self
    }

    /// Throttles `run` to once per `wait`.
    pub fn with_throttle(mut self, wait: Duration) -> Self {
        self.throttle_interval = Some(wait);
        self
    }

    /// Polls every `interval` after each settlement.
    pub fn with_polling(mut self, interval: Duration) -> Self {
        self.polling_interval = Some(interval);
        self
    }

    /// Keeps (or stops) polling while the page is hidden.
    pub fn with_polling_when_hidden(mut self, enabled: bool) -> Self {
        self.polling_when_hidden = enabled;
        self
    }

    /// Refreshes on window focus, at most once per `timespan`.
    ///
    /// Pair with [`Options::with_default_params`] to refresh before the first `run`.
    pub fn with_refresh_on_focus(mut self, timespan: Duration) -> Self {
        self.refresh_on_window_focus = true;
        self.focus_timespan = timespan;
        self
    }

    /// Sets the initial "current" arguments.
    pub fn with_default_params(mut self, params: A) -> Self {
        self.default_params = Some(params);
        self
    }
}

impl<R, A> Default for Options<R, A> {
    /// Default options:
    ///
    /// - `cache_time = 5min`
    /// - `persisted = false`
    /// - `polling_when_hidden = true`
    /// - `refresh_on_window_focus = false`
    /// - `focus_timespan = 5s`
    /// - everything else unset
    fn default() -> Self {
        Self {
            cache_key: None,
            cache_time: DEFAULT_CACHE_TIME,
            persisted: false,
            format_result: None,
            on_before: None,
            on_success: None,
            on_error: None,
            on_finally: None,
            debounce_interval: None,
            throttle_interval: None,
            polling_interval: None,
            polling_when_hidden: true,
            refresh_on_window_focus: false,
            focus_timespan: DEFAULT_FOCUS_TIMESPAN,
            default_params: None,
        }
    }
}

impl<R, A: Clone> Clone for Options<R, A> {
    fn clone(&self) -> Self {
        Self {
            cache_key: self.cache_key.clone(),
            cache_time: self.cache_time,
            persisted: self.persisted,
            format_result: self.format_result.clone(),
            on_before: self.on_before.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            on_finally: self.on_finally.clone(),
            debounce_interval: self.debounce_interval,
            throttle_interval: self.throttle_interval,
            polling_interval: self.polling_interval,
            polling_when_hidden: self.polling_when_hidden,
            refresh_on_window_focus: self.refresh_on_window_focus,
            focus_timespan: self.focus_timespan,
            default_params: self.default_params.clone(),
        }
    }
}

impl<R, A> fmt::Debug for Options<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("cache_key", &self.cache_key)
            .field("cache_time", &self.cache_time)
            .field("persisted", &self.persisted)
            .field("debounce_interval", &self.debounce_interval)
            .field("throttle_interval", &self.throttle_interval)
            .field("polling_interval", &self.polling_interval)
            .field("polling_when_hidden", &self.polling_when_hidden)
            .field("refresh_on_window_focus", &self.refresh_on_window_focus)
            .field("focus_timespan", &self.focus_timespan)
            .finish_non_exhaustive()
    }
}

/// How `run` reaches the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatePolicy {
    /// Every `run` executes immediately.
    Immediate,
    /// Calls collapse into one trailing execution after `wait` of quiet.
    Debounce(Duration),
    /// At most one execution per `wait`, leading and trailing.
    Throttle(Duration),
}

impl Default for RatePolicy {
    /// Returns [`RatePolicy::Immediate`].
    fn default() -> Self {
        RatePolicy::Immediate
    }
}
