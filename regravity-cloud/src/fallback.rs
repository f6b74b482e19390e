//! Attempt-in-order combinator
//!
//! Notification strategies and change-request storage tiers are both an
//! ordered list of labeled steps. [`first_success`] runs them one at a time,
//! stops at the first `Ok`, and keeps every failure for the caller.
//!
//! ```text
//! step[0] ── Err ──▶ step[1] ── Err ──▶ step[2] ── Err ──▶ Exhausted { attempts }
//!    │                  │                  │
//!    Ok                 Ok                 Ok
//!    ▼                  ▼                  ▼
//!                 Succeeded { label, value, failures }
//! ```

use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;

/// One labeled step. Lazy: nothing runs until the combinator calls it.
pub struct Step<'a, T, E> {
    pub label: &'static str,
    run: Box<dyn FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a>,
}

impl<'a, T, E> Step<'a, T, E> {
    pub fn new<F, Fut>(label: &'static str, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self {
            label,
            run: Box::new(move || f().boxed()),
        }
    }
}

/// A failed step
#[derive(Debug)]
pub struct Attempt<E> {
    pub label: &'static str,
    pub error: E,
}

#[derive(Debug)]
pub struct Succeeded<T, E> {
    pub label: &'static str,
    pub value: T,
    /// Steps that failed before this one, in order
    pub failures: Vec<Attempt<E>>,
}

/// Every step failed
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: Vec<Attempt<E>>,
}

impl<E> Exhausted<E> {
    /// The most recent failure
    pub fn last(&self) -> Option<&Attempt<E>> {
        self.attempts.last()
    }

    pub fn into_last(self) -> Option<Attempt<E>> {
        self.attempts.into_iter().last()
    }
}

/// Run `steps` strictly in order and return the first success.
///
/// A step only starts after the previous one has resolved. Failures are
/// logged at `warn` with `context` and the step label.
pub async fn first_success<'a, T, E>(
    context: &str,
    steps: Vec<Step<'a, T, E>>,
) -> Result<Succeeded<T, E>, Exhausted<E>>
where
    E: Display,
{
    let mut failures = Vec::with_capacity(steps.len());

    for step in steps {
        match (step.run)().await {
            Ok(value) => {
                tracing::info!(context, strategy = step.label, "Step succeeded");
                return Ok(Succeeded {
                    label: step.label,
                    value,
                    failures,
                });
            }
            Err(error) => {
                tracing::warn!(context, strategy = step.label, %error, "Step failed");
                failures.push(Attempt {
                    label: step.label,
                    error,
                });
            }
        }
    }

    Err(Exhausted { attempts: failures })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_step(
        log: &Arc<Mutex<Vec<&'static str>>>,
        label: &'static str,
        ok: bool,
    ) -> Step<'static, &'static str, String> {
        let log = log.clone();
        Step::new(label, move || async move {
            log.lock().unwrap().push(label);
            if ok {
                Ok(label)
            } else {
                Err(format!("{label} failed"))
            }
        })
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            recording_step(&log, "one", false),
            recording_step(&log, "two", true),
            recording_step(&log, "three", true),
        ];

        let result = first_success("test", steps).await.unwrap();
        assert_eq!(result.label, "two");
        assert_eq!(result.value, "two");
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].error, "one failed");
        assert_eq!(*log.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_exhausted_keeps_every_failure_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            recording_step(&log, "one", false),
            recording_step(&log, "two", false),
        ];

        let exhausted = first_success("test", steps).await.unwrap_err();
        let labels: Vec<_> = exhausted.attempts.iter().map(|a| a.label).collect();
        assert_eq!(labels, vec!["one", "two"]);
        assert_eq!(exhausted.last().unwrap().error, "two failed");
    }

    #[tokio::test]
    async fn test_steps_are_lazy() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let steps = vec![
            recording_step(&log, "one", true),
            recording_step(&log, "two", true),
        ];
        assert!(log.lock().unwrap().is_empty());

        first_success("test", steps).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["one"]);
    }

    #[tokio::test]
    async fn test_empty_is_exhausted() {
        let steps: Vec<Step<'static, (), String>> = Vec::new();
        let exhausted = first_success("test", steps).await.unwrap_err();
        assert!(exhausted.last().is_none());
    }
}
