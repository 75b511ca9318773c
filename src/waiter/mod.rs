//! Bounded waiting for an external response.
//!
//! A [`Waiter`] subscribes to a [`SignalBus`] and settles exactly once: with
//! the payload of the first matching signal, with a timeout, or with a
//! failure. Settling always detaches the bus receiver and drops the timer
//! before control returns to the caller.

pub mod bus;

use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::error::WaiterError;

pub use bus::{Signal, SignalBus};

type Matcher = Box<dyn Fn(&Signal) -> bool + Send + Sync>;
type Extractor = Box<dyn Fn(&Signal) -> String + Send + Sync>;

/// Where a waiter is in its lifecycle. Leaves `Pending` at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaiterState {
    Pending,
    Resolved(String),
    TimedOut,
    Failed(WaiterError),
}

impl WaiterState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, WaiterState::Pending)
    }
}

/// Waits up to a fixed duration for a signal accepted by its matcher.
///
/// The deadline is armed at construction, so time spent sending the request
/// counts against it. Dropping the waiter (or the future returned by
/// [`Waiter::wait`]) detaches it from the bus immediately.
pub struct Waiter {
    receiver: Option<broadcast::Receiver<Signal>>,
    matcher: Matcher,
    extractor: Extractor,
    timeout: Duration,
    deadline: Instant,
    state: WaiterState,
}

impl Waiter {
    /// Subscribe to `bus` and arm a deadline `timeout` from now.
    pub fn new<M, E>(bus: &SignalBus, matcher: M, extractor: E, timeout: Duration) -> Self
    where
        M: Fn(&Signal) -> bool + Send + Sync + 'static,
        E: Fn(&Signal) -> String + Send + Sync + 'static,
    {
        Self {
            receiver: Some(bus.subscribe()),
            matcher: Box::new(matcher),
            extractor: Box::new(extractor),
            timeout,
            deadline: Instant::now() + timeout,
            state: WaiterState::Pending,
        }
    }

    /// Waiter for the signal whose id is exactly `id`, yielding its content.
    pub fn for_id(bus: &SignalBus, id: impl Into<String>, timeout: Duration) -> Self {
        let id = id.into();
        Self::new(
            bus,
            move |signal| signal.id == id,
            |signal| signal.content.clone(),
            timeout,
        )
    }

    pub fn state(&self) -> &WaiterState {
        &self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the waiter still holds a bus subscription.
    pub fn is_listening(&self) -> bool {
        self.receiver.is_some()
    }

    /// Wait for settlement.
    ///
    /// On a settled waiter this returns the recorded outcome again without
    /// listening or arming anything.
    pub async fn wait(&mut self) -> Result<String, WaiterError> {
        if self.state.is_settled() {
            return self.outcome();
        }

        let Some(mut receiver) = self.receiver.take() else {
            self.state = WaiterState::Failed(WaiterError::Cancelled);
            return self.outcome();
        };
        // Stays recorded if this future is dropped before settling.
        self.state = WaiterState::Failed(WaiterError::Cancelled);

        let timer = sleep_until(self.deadline);
        tokio::pin!(timer);

        let settled = loop {
            tokio::select! {
                biased;

                received = receiver.recv() => match received {
                    Ok(signal) => {
                        if !(self.matcher)(&signal) {
                            continue;
                        }
                        let payload = (self.extractor)(&signal);
                        if payload.trim().is_empty() {
                            break WaiterState::Failed(WaiterError::EmptyResponse);
                        }
                        break WaiterState::Resolved(payload);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Waiter lagged behind the signal bus, skipped {} signals", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        break WaiterState::Failed(WaiterError::Transport(
                            "signal bus closed".to_string(),
                        ));
                    }
                },

                _ = &mut timer => break WaiterState::TimedOut,
            }
        };

        drop(receiver);
        debug!("Waiter settled: {:?}", settled);
        self.state = settled;
        self.outcome()
    }

    /// Give up on a pending waiter, detaching it from the bus.
    pub fn cancel(&mut self) {
        if self.state.is_settled() {
            return;
        }
        self.receiver = None;
        self.state = WaiterState::Failed(WaiterError::Cancelled);
        debug!("Waiter cancelled");
    }

    fn outcome(&self) -> Result<String, WaiterError> {
        match &self.state {
            WaiterState::Resolved(payload) => Ok(payload.clone()),
            WaiterState::TimedOut => Err(WaiterError::Timeout(self.timeout)),
            WaiterState::Failed(e) => Err(e.clone()),
            WaiterState::Pending => Err(WaiterError::Cancelled),
        }
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("listening", &self.is_listening())
            .field("timeout", &self.timeout)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "assistant-response-1";

    fn response(content: &str) -> Signal {
        Signal::new(ID, content)
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_signal() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, ID, Duration::from_millis(50));
        assert_eq!(bus.listener_count(), 1);

        let start = Instant::now();
        let result = waiter.wait().await;

        assert_eq!(result, Err(WaiterError::Timeout(Duration::from_millis(50))));
        assert_eq!(start.elapsed(), Duration::from_millis(50));
        assert_eq!(waiter.state(), &WaiterState::TimedOut);
        assert!(!waiter.is_listening());
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_on_matching_signal() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, ID, Duration::from_millis(50));

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(response("result"));
        });

        let start = Instant::now();
        assert_eq!(waiter.wait().await, Ok("result".to_string()));
        assert_eq!(start.elapsed(), Duration::from_millis(10));
        assert_eq!(bus.listener_count(), 0);

        // Past the original deadline nothing changes.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(waiter.state(), &WaiterState::Resolved("result".to_string()));
        assert_eq!(waiter.wait().await, Ok("result".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_non_matching_signals() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, ID, Duration::from_millis(50));

        bus.publish(Signal::new("editor-1", "unrelated"));
        bus.publish(response("wanted"));

        assert_eq!(waiter.wait().await, Ok("wanted".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_payload_fails() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, ID, Duration::from_millis(50));

        bus.publish(response("  \n "));

        assert_eq!(waiter.wait().await, Err(WaiterError::EmptyResponse));
        assert_eq!(
            waiter.state(),
            &WaiterState::Failed(WaiterError::EmptyResponse)
        );
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_match_settles_later_ones_ignored() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, ID, Duration::from_millis(50));

        bus.publish(response("first"));
        bus.publish(response("second"));

        assert_eq!(waiter.wait().await, Ok("first".to_string()));
        assert_eq!(bus.publish(response("third")), 0);
        assert_eq!(waiter.wait().await, Ok("first".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_at_deadline_settles_once() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, ID, Duration::from_millis(50));

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            publisher.publish(response("late"));
        });

        let first = waiter.wait().await;
        let state = waiter.state().clone();
        assert!(matches!(
            state,
            WaiterState::Resolved(_) | WaiterState::TimedOut
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(waiter.state(), &state);
        assert_eq!(waiter.wait().await, first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_bus_fails_with_transport_error() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, ID, Duration::from_secs(5));
        drop(bus);

        assert!(matches!(waiter.wait().await, Err(WaiterError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_detaches_listener() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, ID, Duration::from_millis(50));
        assert_eq!(bus.listener_count(), 1);

        waiter.cancel();
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(waiter.state(), &WaiterState::Failed(WaiterError::Cancelled));

        bus.publish(response("too late"));
        assert_eq!(waiter.wait().await, Err(WaiterError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_wait_future_detaches_listener() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, ID, Duration::from_secs(30));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), waiter.wait()).await;
        assert!(abandoned.is_err());
        assert_eq!(bus.listener_count(), 0);
        assert!(!waiter.is_listening());
        assert_eq!(waiter.state(), &WaiterState::Failed(WaiterError::Cancelled));

        bus.publish(response("after abandon"));
        assert_eq!(waiter.wait().await, Err(WaiterError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_must_match_exactly() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::for_id(&bus, "assistant-response-2", Duration::from_millis(50));

        bus.publish(Signal::new("assistant-response-1", "stale"));
        bus.publish(Signal::new("assistant-response-21", "other"));
        bus.publish(Signal::new("assistant-response-2", "mine"));

        assert_eq!(waiter.wait().await, Ok("mine".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_matcher_and_extractor() {
        let bus = SignalBus::default();
        let mut waiter = Waiter::new(
            &bus,
            |s| s.id == "exact",
            |s| s.content.to_uppercase(),
            Duration::from_millis(50),
        );

        bus.publish(Signal::new("exact-not", "no"));
        bus.publish(Signal::new("exact", "yes"));

        assert_eq!(waiter.wait().await, Ok("YES".to_string()));
    }
}
