use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, warn};

use super::Navigation;
use crate::gatehouse::coordinator::Coordinator;

/// Default pause between verification checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

const RESEND_OK: &str = "Verification email sent successfully! Please check your inbox.";
const RESEND_FAILED: &str = "Failed to send verification email. Please try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Verified,
    Cancelled,
}

/// Background loop asking the coordinator whether the signed-in user's email
/// is verified. Stops on the first positive answer or once cancelled; check
/// failures are logged and polling continues.
#[derive(Debug)]
pub struct VerificationPoller {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<PollOutcome>,
}

impl VerificationPoller {
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(coordinator: Arc<Coordinator>, every: Duration) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(poll(coordinator, every, Arc::clone(&cancelled)));
        Self { cancelled, handle }
    }

    /// Stop after the check in flight, if any.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub async fn finished(mut self) -> PollOutcome {
        self.wait().await
    }

    /// Wait for the loop to end. Dropping this future leaves the loop
    /// running; it must not be awaited again once it has completed.
    async fn wait(&mut self) -> PollOutcome {
        match (&mut self.handle).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("verification poller failed: {err}");
                PollOutcome::Cancelled
            }
        }
    }
}

async fn poll(coordinator: Arc<Coordinator>, every: Duration, cancelled: Arc<AtomicBool>) -> PollOutcome {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if cancelled.load(Ordering::Acquire) {
            return PollOutcome::Cancelled;
        }

        match coordinator.check_email_verification().await {
            Ok(true) => {
                if cancelled.load(Ordering::Acquire) {
                    return PollOutcome::Cancelled;
                }
                debug!("email verified");
                return PollOutcome::Verified;
            }
            Ok(false) => {}
            Err(err) => warn!("Error checking email verification: {err}"),
        }
    }
}

/// Result of opening the pending-verification screen.
#[derive(Debug)]
pub enum Opening {
    Waiting(PendingVerification),
    Redirect(Navigation),
}

#[derive(Debug)]
pub struct PendingVerification {
    coordinator: Arc<Coordinator>,
    user_email: String,
    poller: Option<VerificationPoller>,
    resend_message: String,
    resending: bool,
}

impl PendingVerification {
    /// Without a session the user belongs on the login screen; otherwise
    /// polling starts right away.
    #[must_use]
    pub fn open(coordinator: Arc<Coordinator>, every: Duration) -> Opening {
        let Some(session) = coordinator.current_session() else {
            return Opening::Redirect(Navigation::Login);
        };

        let poller = VerificationPoller::spawn(Arc::clone(&coordinator), every);
        Opening::Waiting(Self {
            coordinator,
            user_email: session.email.unwrap_or_default(),
            poller: Some(poller),
            resend_message: String::new(),
            resending: false,
        })
    }

    #[must_use]
    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    #[must_use]
    pub fn resend_message(&self) -> &str {
        &self.resend_message
    }

    #[must_use]
    pub const fn is_resending(&self) -> bool {
        self.resending
    }

    /// Wait for the poll loop. `Some(Dashboard)` once the email is verified,
    /// `None` when polling was stopped first.
    pub async fn verified(&mut self) -> Option<Navigation> {
        let outcome = self.poller.as_mut()?.wait().await;
        self.poller = None;
        match outcome {
            PollOutcome::Verified => Some(Navigation::Dashboard),
            PollOutcome::Cancelled => None,
        }
    }

    pub async fn resend(&mut self) {
        self.resending = true;
        self.resend_message.clear();

        self.resend_message = match self.coordinator.send_email_verification().await {
            Ok(()) => RESEND_OK,
            Err(err) => {
                error!("Error resending verification email: {err}");
                RESEND_FAILED
            }
        }
        .to_string();

        self.resending = false;
    }

    /// Sign out; failures are logged and swallowed.
    pub async fn sign_out(&mut self) -> Option<Navigation> {
        self.dispose();
        match self.coordinator.sign_out().await {
            Ok(()) => Some(Navigation::Login),
            Err(err) => {
                error!("Error signing out: {err}");
                None
            }
        }
    }

    /// Stop polling. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(poller) = &self.poller {
            poller.cancel();
        }
    }
}

impl Drop for PendingVerification {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatehouse::{
        identity::{IdentityProvider, ProviderError},
        memory::{MemoryIdentityProvider, MemoryProfileStore},
    };
    use anyhow::{bail, Result};
    use secrecy::SecretString;

    fn setup() -> (Arc<MemoryIdentityProvider>, Arc<Coordinator>) {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let coordinator = Arc::new(Coordinator::start(
            provider.clone(),
            Arc::new(MemoryProfileStore::new()),
        ));
        (provider, coordinator)
    }

    async fn signed_in(provider: &MemoryIdentityProvider, email: &str) -> Result<()> {
        provider
            .create_account(email, &SecretString::from("secret1".to_string()))
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn no_session_redirects_to_login() {
        let (_provider, coordinator) = setup();
        match PendingVerification::open(coordinator, POLL_INTERVAL) {
            Opening::Redirect(to) => assert_eq!(to, Navigation::Login),
            Opening::Waiting(_) => panic!("expected a redirect"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn verified_email_navigates_to_dashboard() -> Result<()> {
        let (provider, coordinator) = setup();
        signed_in(&provider, "p@example.com").await?;

        let Opening::Waiting(mut screen) = PendingVerification::open(coordinator, POLL_INTERVAL)
        else {
            bail!("expected the waiting screen");
        };
        assert_eq!(screen.user_email(), "p@example.com");

        tokio::time::sleep(POLL_INTERVAL * 2).await;
        provider.confirm_email("p@example.com");

        assert_eq!(screen.verified().await, Some(Navigation::Dashboard));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn poll_survives_check_failures() -> Result<()> {
        let (provider, coordinator) = setup();
        signed_in(&provider, "q@example.com").await?;

        let poller = VerificationPoller::spawn(coordinator, POLL_INTERVAL);
        provider.fail_next(ProviderError::other("auth/network-request-failed", "offline"));
        tokio::time::sleep(POLL_INTERVAL + Duration::from_millis(10)).await;
        provider.confirm_email("q@example.com");

        assert_eq!(poller.finished().await, PollOutcome::Verified);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_stops_polling() -> Result<()> {
        let (provider, coordinator) = setup();
        signed_in(&provider, "r@example.com").await?;

        let Opening::Waiting(mut screen) = PendingVerification::open(coordinator, POLL_INTERVAL)
        else {
            bail!("expected the waiting screen");
        };
        screen.dispose();
        screen.dispose();
        provider.confirm_email("r@example.com");

        assert_eq!(screen.verified().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn resend_reports_outcome() -> Result<()> {
        let (provider, coordinator) = setup();
        signed_in(&provider, "s@example.com").await?;

        let Opening::Waiting(mut screen) = PendingVerification::open(coordinator, POLL_INTERVAL)
        else {
            bail!("expected the waiting screen");
        };

        screen.resend().await;
        assert_eq!(screen.resend_message(), RESEND_OK);
        assert_eq!(provider.verification_requests(), 1);

        provider.fail_next(ProviderError::other("auth/internal-error", "boom"));
        screen.resend().await;
        assert_eq!(screen.resend_message(), RESEND_FAILED);
        assert!(!screen.is_resending());
        Ok(())
    }

    #[tokio::test]
    async fn sign_out_swallows_failures() -> Result<()> {
        let (provider, coordinator) = setup();
        signed_in(&provider, "t@example.com").await?;

        let Opening::Waiting(mut screen) =
            PendingVerification::open(Arc::clone(&coordinator), POLL_INTERVAL)
        else {
            bail!("expected the waiting screen");
        };

        provider.fail_next(ProviderError::other("auth/internal-error", "boom"));
        assert_eq!(screen.sign_out().await, None);
        assert!(coordinator.current_session().is_some());

        assert_eq!(screen.sign_out().await, Some(Navigation::Login));
        assert!(coordinator.current_session().is_none());
        Ok(())
    }
}
