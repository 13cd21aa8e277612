//! Background session refresher
//!
//! Keeps the active role's access token from lapsing while the user is idle
//! and no request would otherwise hit the 401 path.

use crate::error::Result;
use crate::session::SessionManager;
use crate::types::TokenKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct SessionRefresher {
    session: Arc<SessionManager>,
    interval: Duration,
}

impl SessionRefresher {
    /// Refresher using the session's configured interval (55 minutes by default)
    pub fn new(session: Arc<SessionManager>) -> Self {
        let interval = session.config().refresh_interval();
        Self { session, interval }
    }

    pub fn with_interval(session: Arc<SessionManager>, interval: Duration) -> Self {
        Self { session, interval }
    }

    /// Run one proactive refresh for the currently active role.
    ///
    /// A missing refresh token counts as a failure: the role is logged out
    /// just as for a rejected refresh.
    pub async fn tick(&self) -> Result<()> {
        let role = self.session.token_store().resolve_active_role();
        debug!(role = %role, "Proactive token refresh");
        self.session.refresh(role).await?;
        Ok(())
    }

    /// Spawn the refresh loop.
    ///
    /// The first round runs immediately and is skipped when there is nothing
    /// to refresh; later rounds follow the interval. Stop the returned
    /// handle (or drop it) when the owning context goes away.
    pub fn start(self) -> RefresherHandle {
        info!(interval_secs = %self.interval.as_secs(), "Started session refresher");

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // first tick completes immediately
            interval.tick().await;
            let store = self.session.token_store();
            if store
                .get_token(store.resolve_active_role(), TokenKind::Refresh)
                .is_some()
            {
                if let Err(e) = self.tick().await {
                    warn!(error = %e, "Initial session refresh failed");
                }
            }

            loop {
                interval.tick().await;
                match self.tick().await {
                    Ok(()) => info!("Session refresh successful"),
                    Err(e) => warn!(error = %e, "Session refresh failed"),
                }
            }
        });

        RefresherHandle { task: Some(task) }
    }
}

/// Owns the spawned refresh loop; the timer dies with it.
pub struct RefresherHandle {
    task: Option<JoinHandle<()>>,
}

impl RefresherHandle {
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Stopped session refresher");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
