//! Email verification challenges
//!
//! One live challenge per `(email, purpose)`. A challenge is
//!
//! ```text
//! issued ──verify ok──▶ consumed (removed)
//!    │──600s──────────▶ expired
//!    │──resend ≥60s───▶ superseded (replaced)
//!    └──5 mismatches──▶ discarded
//! ```
//!
//! While a code is being delivered its slot is reserved, so a concurrent
//! issue for the same key is throttled instead of sending a second code.
//! Challenges are held in memory only, never persisted.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::VerificationPurpose;
use shared::util::now_millis;
use std::sync::Arc;

use crate::email::Notifier;

/// Code lifetime
pub const CODE_TTL_MS: i64 = 600_000;
/// Minimum gap between two issues for the same email and purpose
pub const RESEND_AFTER_MS: i64 = 60_000;
/// Mismatches tolerated before the challenge is discarded
pub const MAX_ATTEMPTS: u32 = 5;

const CODE_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Challenge {
    code: String,
    issued_at: i64,
    mismatches: u32,
}

#[derive(Debug)]
enum Slot {
    Live(Challenge),
    /// A new code is on its way; the previous one stays usable until it lands
    Sending {
        started_at: i64,
        previous: Option<Challenge>,
    },
}

impl Slot {
    fn challenge_mut(&mut self) -> Option<&mut Challenge> {
        match self {
            Self::Live(challenge) => Some(challenge),
            Self::Sending { previous, .. } => previous.as_mut(),
        }
    }
}

type Challenges = DashMap<(String, VerificationPurpose), Slot>;

/// Held across delivery; dropping it without `commit` restores the slot
struct Reservation<'a> {
    challenges: &'a Challenges,
    key: Option<(String, VerificationPurpose)>,
}

impl Reservation<'_> {
    fn commit(mut self, challenge: Challenge) {
        if let Some(key) = self.key.take() {
            self.challenges.insert(key, Slot::Live(challenge));
        }
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        if let Entry::Occupied(mut entry) = self.challenges.entry(key)
            && let Slot::Sending { previous, .. } = entry.get_mut()
        {
            match previous.take() {
                Some(previous) => {
                    entry.insert(Slot::Live(previous));
                }
                None => {
                    entry.remove();
                }
            }
        }
    }
}

/// What the client learns about an issued challenge (never the code)
#[derive(Debug, Clone, Serialize)]
pub struct IssuedChallenge {
    pub email: String,
    pub purpose: VerificationPurpose,
    pub delivery_method: &'static str,
    pub expires_in_secs: i64,
    pub resend_after_secs: i64,
}

#[derive(Clone)]
pub struct VerificationService {
    notifier: Notifier,
    challenges: Arc<Challenges>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Six ASCII digits after trimming
fn normalize_code(code: &str) -> Option<&str> {
    let code = code.trim();
    (code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())).then_some(code)
}

fn secs_ceil(ms: i64) -> i64 {
    (ms + 999) / 1000
}

fn resend_too_soon(elapsed: i64) -> AppError {
    let wait = secs_ceil(RESEND_AFTER_MS - elapsed).max(1);
    AppError::with_message(
        ErrorCode::VerificationResendTooSoon,
        format!("Please wait {wait} seconds before requesting a new code"),
    )
    .with_detail("retry_after_secs", wait)
}

impl VerificationService {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            notifier,
            challenges: Arc::new(DashMap::new()),
        }
    }

    pub async fn issue(
        &self,
        email: &str,
        display_name: &str,
        purpose: VerificationPurpose,
    ) -> Result<IssuedChallenge, AppError> {
        self.issue_at(email, display_name, purpose, now_millis())
            .await
    }

    /// Issue (or re-issue) a challenge. A re-issue within 60s of the previous
    /// one, or while another delivery for the key is in flight, is refused;
    /// after that it replaces the old code.
    ///
    /// The challenge is stored only once delivery succeeded.
    pub async fn issue_at(
        &self,
        email: &str,
        display_name: &str,
        purpose: VerificationPurpose,
        now: i64,
    ) -> Result<IssuedChallenge, AppError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::with_message(
                ErrorCode::InvalidFormat,
                "A valid email address is required",
            ));
        }
        let key = (email.clone(), purpose);
        let reservation = self.reserve(key, now)?;

        let name = if display_name.trim().is_empty() {
            email.as_str()
        } else {
            display_name.trim()
        };
        let delivery = self
            .notifier
            .send_verification_code(&email, name, purpose)
            .await?;

        reservation.commit(Challenge {
            code: delivery.code,
            issued_at: now,
            mismatches: 0,
        });
        tracing::info!(email = %email, purpose = %purpose, method = delivery.delivery_method, "Verification code issued");

        Ok(IssuedChallenge {
            email,
            purpose,
            delivery_method: delivery.delivery_method,
            expires_in_secs: CODE_TTL_MS / 1000,
            resend_after_secs: RESEND_AFTER_MS / 1000,
        })
    }

    /// Claim the slot for a new code, or refuse when throttled
    fn reserve(
        &self,
        key: (String, VerificationPurpose),
        now: i64,
    ) -> Result<Reservation<'_>, AppError> {
        match self.challenges.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let previous = match entry.get() {
                    Slot::Sending { started_at, .. } => {
                        return Err(resend_too_soon(now - started_at));
                    }
                    Slot::Live(existing) if now - existing.issued_at < RESEND_AFTER_MS => {
                        return Err(resend_too_soon(now - existing.issued_at));
                    }
                    Slot::Live(existing) => existing.clone(),
                };
                entry.insert(Slot::Sending {
                    started_at: now,
                    previous: Some(previous),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(Slot::Sending {
                    started_at: now,
                    previous: None,
                });
            }
        }
        Ok(Reservation {
            challenges: &self.challenges,
            key: Some(key),
        })
    }

    pub async fn resend(
        &self,
        email: &str,
        display_name: &str,
        purpose: VerificationPurpose,
    ) -> Result<IssuedChallenge, AppError> {
        self.resend_at(email, display_name, purpose, now_millis())
            .await
    }

    /// Resend requires an earlier challenge for the same email and purpose
    pub async fn resend_at(
        &self,
        email: &str,
        display_name: &str,
        purpose: VerificationPurpose,
        now: i64,
    ) -> Result<IssuedChallenge, AppError> {
        let key = (normalize_email(email), purpose);
        if !self.challenges.contains_key(&key) {
            return Err(AppError::new(ErrorCode::VerificationNotIssued));
        }
        self.issue_at(email, display_name, purpose, now).await
    }

    pub fn verify(
        &self,
        email: &str,
        purpose: VerificationPurpose,
        entered: &str,
    ) -> Result<(), AppError> {
        self.verify_at(email, purpose, entered, now_millis())
    }

    /// Check `entered` against the live challenge. Order of checks:
    /// format, existence, expiry, attempts, equality. A match consumes the
    /// challenge.
    pub fn verify_at(
        &self,
        email: &str,
        purpose: VerificationPurpose,
        entered: &str,
        now: i64,
    ) -> Result<(), AppError> {
        let entered = normalize_code(entered)
            .ok_or_else(|| AppError::new(ErrorCode::VerificationCodeInvalidFormat))?;
        let email = normalize_email(email);

        let Entry::Occupied(mut entry) = self.challenges.entry((email.clone(), purpose)) else {
            return Err(AppError::new(ErrorCode::VerificationNotIssued));
        };
        let challenge = entry
            .get_mut()
            .challenge_mut()
            .ok_or_else(|| AppError::new(ErrorCode::VerificationNotIssued))?;

        let outcome = if now - challenge.issued_at >= CODE_TTL_MS {
            Err(AppError::new(ErrorCode::VerificationCodeExpired))
        } else if challenge.code.trim() == entered {
            tracing::info!(email = %email, purpose = %purpose, "Verification code accepted");
            Ok(())
        } else {
            challenge.mismatches += 1;
            let remaining = MAX_ATTEMPTS.saturating_sub(challenge.mismatches);
            if remaining > 0 {
                return Err(AppError::new(ErrorCode::VerificationCodeMismatch)
                    .with_detail("remaining_attempts", remaining));
            }
            tracing::warn!(email = %email, purpose = %purpose, "Verification challenge discarded after too many attempts");
            Err(AppError::new(ErrorCode::TooManyAttempts))
        };

        // The challenge is spent: consumed, expired or discarded
        if let Slot::Sending { previous, .. } = entry.get_mut() {
            *previous = None;
        } else {
            entry.remove();
        }
        outcome
    }

    /// Drop challenges past their TTL
    pub fn prune_expired(&self, now: i64) {
        self.challenges.retain(|_, slot| match slot {
            Slot::Live(challenge) => now - challenge.issued_at < CODE_TTL_MS,
            Slot::Sending { previous, .. } => {
                if previous
                    .as_ref()
                    .is_some_and(|c| now - c.issued_at >= CODE_TTL_MS)
                {
                    *previous = None;
                }
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::MockTransport;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const T0: i64 = 1_700_000_000_000;

    /// Codes 100001, 100002, ... in issue order
    fn service(transport: Arc<MockTransport>) -> VerificationService {
        let counter = Arc::new(AtomicU32::new(0));
        let notifier = Notifier::new(transport, &Config::for_tests()).with_code_source(move || {
            format!("{:06}", 100_001 + counter.fetch_add(1, Ordering::SeqCst))
        });
        VerificationService::new(notifier)
    }

    fn code(err: AppError) -> ErrorCode {
        err.code
    }

    #[tokio::test]
    async fn test_mismatch_then_match_then_no_replay() {
        let svc = service(Arc::new(MockTransport::succeeding()));
        svc.issue_at("Ann@Acme.test ", "Ann", VerificationPurpose::Signup, T0)
            .await
            .unwrap();

        let err = svc
            .verify_at("ann@acme.test", VerificationPurpose::Signup, "999999", T0 + 1_000)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationCodeMismatch);

        svc.verify_at("ann@acme.test", VerificationPurpose::Signup, " 100001 ", T0 + 2_000)
            .unwrap();

        let err = svc
            .verify_at("ann@acme.test", VerificationPurpose::Signup, "100001", T0 + 3_000)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationNotIssued);
    }

    #[tokio::test]
    async fn test_format_checked_before_existence() {
        let svc = service(Arc::new(MockTransport::succeeding()));
        for bad in ["12345", "1234567", "12a456", "", "１２３４５６"] {
            let err = svc
                .verify_at("nobody@acme.test", VerificationPurpose::Login, bad, T0)
                .unwrap_err();
            assert_eq!(code(err), ErrorCode::VerificationCodeInvalidFormat, "{bad:?}");
        }
        let err = svc
            .verify_at("nobody@acme.test", VerificationPurpose::Login, "123456", T0)
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::VerificationNotIssued);
    }

    #[tokio::test]
    async fn test_resend_throttle_and_supersede() {
        let svc = service(Arc::new(MockTransport::succeeding()));
        svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0)
            .await
            .unwrap();

        let err = svc
            .resend_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0 + 30_000)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationResendTooSoon);
        assert_eq!(err.details.unwrap()["retry_after_secs"], 30);

        let issued = svc
            .resend_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0 + 61_000)
            .await
            .unwrap();
        assert_eq!(issued.expires_in_secs, 600);

        let err = svc
            .verify_at("ann@acme.test", VerificationPurpose::Signup, "100001", T0 + 62_000)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationCodeMismatch);
        svc.verify_at("ann@acme.test", VerificationPurpose::Signup, "100002", T0 + 63_000)
            .unwrap();
    }

    #[tokio::test]
    async fn test_purposes_are_independent() {
        let svc = service(Arc::new(MockTransport::succeeding()));
        svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0)
            .await
            .unwrap();
        svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Login, T0)
            .await
            .unwrap();

        svc.verify_at("ann@acme.test", VerificationPurpose::Login, "100002", T0 + 1)
            .unwrap();
        svc.verify_at("ann@acme.test", VerificationPurpose::Signup, "100001", T0 + 2)
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let svc = service(Arc::new(MockTransport::succeeding()));
        svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0)
            .await
            .unwrap();

        let err = svc
            .verify_at("ann@acme.test", VerificationPurpose::Signup, "100001", T0 + CODE_TTL_MS)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationCodeExpired);
        let err = svc
            .verify_at("ann@acme.test", VerificationPurpose::Signup, "100001", T0 + CODE_TTL_MS + 1)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationNotIssued);
    }

    #[tokio::test]
    async fn test_too_many_attempts_discards() {
        let svc = service(Arc::new(MockTransport::succeeding()));
        svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0)
            .await
            .unwrap();

        for _ in 0..MAX_ATTEMPTS - 1 {
            let err = svc
                .verify_at("ann@acme.test", VerificationPurpose::Signup, "000000", T0 + 1)
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::VerificationCodeMismatch);
        }
        let err = svc
            .verify_at("ann@acme.test", VerificationPurpose::Signup, "000000", T0 + 1)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TooManyAttempts);
        let err = svc
            .verify_at("ann@acme.test", VerificationPurpose::Signup, "100001", T0 + 1)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationNotIssued);
    }

    #[tokio::test]
    async fn test_failed_delivery_stores_nothing() {
        let svc = service(Arc::new(MockTransport::failing_with_messages(["a", "b", "c"])));
        let err = svc
            .issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DeliveryFailed);

        let err = svc
            .verify_at("ann@acme.test", VerificationPurpose::Signup, "100001", T0 + 1)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationNotIssued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_issue_sends_one_code() {
        let transport = Arc::new(MockTransport::succeeding().with_latency(Duration::from_secs(1)));
        let svc = service(transport.clone());
        let (a, b, c) = tokio::join!(
            svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0),
            svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0),
            svc.issue_at("Ann@acme.test", "Ann", VerificationPurpose::Signup, T0 + 500),
        );
        let results = [a, b, c];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.into_iter().filter_map(Result::err) {
            assert_eq!(err.code, ErrorCode::VerificationResendTooSoon);
        }
        assert_eq!(transport.calls().len(), 1);

        svc.verify_at("ann@acme.test", VerificationPurpose::Signup, "100001", T0 + 1)
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_resend_keeps_previous_code() {
        // First issue gets through, every strategy of the resend fails
        let svc = service(Arc::new(MockTransport::scripted([
            true, false, false, false,
        ])));
        svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0)
            .await
            .unwrap();
        let err = svc
            .resend_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0 + 61_000)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DeliveryFailed);

        svc.verify_at("ann@acme.test", VerificationPurpose::Signup, "100001", T0 + 62_000)
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_delivery_releases_the_slot() {
        let svc = service(Arc::new(
            MockTransport::succeeding().with_latency(Duration::from_secs(1)),
        ));
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(svc.challenges.is_empty());

        svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0 + 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let svc = service(Arc::new(MockTransport::succeeding()));
        svc.issue_at("ann@acme.test", "Ann", VerificationPurpose::Signup, T0)
            .await
            .unwrap();
        svc.prune_expired(T0 + CODE_TTL_MS - 1);
        assert_eq!(svc.challenges.len(), 1);
        svc.prune_expired(T0 + CODE_TTL_MS);
        assert!(svc.challenges.is_empty());
    }
}
