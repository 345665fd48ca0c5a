use crate::config::config::ExpectationConfig;
use crate::models::endpoints::expectation::{Expectation, ExpectationError, UnmetExpectation};
use crate::models::message::{Body, Message};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// A passive endpoint recording every delivered message in arrival order.
///
/// Appends happen under a mutex so concurrent pipeline runs never lose a
/// delivery. Every append wakes pending [`assert_satisfied`] calls, which
/// otherwise re-check on a fixed poll interval.
///
/// [`assert_satisfied`]: CaptureEndpoint::assert_satisfied
#[derive(Debug)]
pub struct CaptureEndpoint {
    name: String,
    received: Mutex<Vec<Message>>,
    expectations: Mutex<Vec<Expectation>>,
    notify: Notify,
    timing: ExpectationConfig,
}

impl CaptureEndpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_timing(name, ExpectationConfig::default())
    }

    pub fn with_timing(name: impl Into<String>, timing: ExpectationConfig) -> Self {
        Self {
            name: name.into(),
            received: Mutex::new(Vec::new()),
            expectations: Mutex::new(Vec::new()),
            notify: Notify::new(),
            timing,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receive(&self, message: Message) {
        let count = {
            let mut received = lock(&self.received);
            received.push(message);
            received.len()
        };
        tracing::debug!("Capture '{}' received message #{}", self.name, count);
        self.notify.notify_waiters();
    }

    pub fn count(&self) -> usize {
        lock(&self.received).len()
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.received).clone()
    }

    /// Body text of each message in arrival order; `None` for empty bodies.
    pub fn bodies(&self) -> Vec<Option<String>> {
        lock(&self.received).iter().map(|m| m.body.to_text()).collect()
    }

    /// Distinct values seen for `key`, in order of first arrival.
    pub fn received_header_values(&self, key: &str) -> Vec<Value> {
        let mut values: Vec<Value> = Vec::new();
        for message in lock(&self.received).iter() {
            if let Some(value) = message.header(key) {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        values
    }

    /// Drop received messages and declared expectations.
    pub fn reset(&self) {
        lock(&self.received).clear();
        lock(&self.expectations).clear();
    }

    pub fn expect(&self, expectation: Expectation) {
        lock(&self.expectations).push(expectation);
    }

    pub fn expect_message_count(&self, count: usize) {
        self.expect(Expectation::MessageCount(count));
    }

    pub fn expect_minimum_message_count(&self, count: usize) {
        self.expect(Expectation::MinimumMessageCount(count));
    }

    pub fn expect_bodies_received<I>(&self, bodies: I)
    where
        I: IntoIterator,
        I::Item: Into<Body>,
    {
        self.expect(Expectation::Bodies {
            expected: expected_bodies(bodies),
            ordered: true,
        });
    }

    pub fn expect_bodies_received_in_any_order<I>(&self, bodies: I)
    where
        I: IntoIterator,
        I::Item: Into<Body>,
    {
        self.expect(Expectation::Bodies {
            expected: expected_bodies(bodies),
            ordered: false,
        });
    }

    pub fn expect_header_received(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.expect(Expectation::Header {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Expectations that do not hold right now, with what was observed.
    pub fn unmet_expectations(&self) -> Vec<UnmetExpectation> {
        let expectations = lock(&self.expectations).clone();
        let received = lock(&self.received);
        expectations
            .into_iter()
            .filter_map(|expectation| match expectation.check(&received) {
                Ok(()) => None,
                Err(observed) => Some(UnmetExpectation {
                    expectation,
                    observed,
                }),
            })
            .collect()
    }

    pub async fn assert_satisfied(&self) -> Result<(), ExpectationError> {
        self.assert_satisfied_within(self.timing.timeout()).await
    }

    /// Wait until every declared expectation holds, or fail once `timeout`
    /// has elapsed. Dropping the future abandons the wait.
    pub async fn assert_satisfied_within(&self, timeout: Duration) -> Result<(), ExpectationError> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            // Register before checking so an append in between still wakes us.
            let notified = self.notify.notified();

            let failures = self.unmet_expectations();
            if failures.is_empty() {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                let error = ExpectationError::Unsatisfied {
                    endpoint: self.name.clone(),
                    waited_ms: now.duration_since(started).as_millis(),
                    failures,
                };
                tracing::warn!("{}", error);
                return Err(error);
            }

            let wait = self.timing.poll_interval().min(deadline - now);
            let _ = tokio::time::timeout(wait, notified).await;
        }
    }
}

fn expected_bodies<I>(bodies: I) -> Vec<Option<String>>
where
    I: IntoIterator,
    I::Item: Into<Body>,
{
    bodies.into_iter().map(|b| b.into().to_text()).collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
