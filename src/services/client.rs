//! Boundary to the SWAMP web service.
//!
//! The HTTP transport lives behind [`SwampConnector`] and [`SwampSession`];
//! everything in this crate talks to those traits. [`SessionPool`] owns the
//! authenticated session shared by consecutive builds.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::Credentials;
use crate::errors::SwampError;
use crate::models::assessment::{AssessmentRecord, RunHandle};

/// Creates authenticated sessions.
#[async_trait]
pub trait SwampConnector: Send + Sync {
    async fn login(
        &self,
        credentials: &Credentials,
        host_url: &str,
    ) -> Result<Arc<dyn SwampSession>, SwampError>;
}

/// Operations available on an authenticated session.
#[async_trait]
pub trait SwampSession: Send + Sync {
    /// Whether the service still accepts this session.
    async fn is_authenticated(&self) -> bool;

    /// Full name of a project, or `None` when it does not exist.
    async fn project_name(&self, project_id: &str) -> Result<Option<String>, SwampError>;

    async fn tool_name(&self, tool_id: &str, project_id: &str) -> Result<String, SwampError>;

    async fn platform_name(&self, platform_id: &str) -> Result<String, SwampError>;

    /// Upload an archive plus its `package.conf`, returning the package version id.
    async fn upload_package(
        &self,
        config_path: &Path,
        archive_path: &Path,
        project_id: &str,
        new_package: bool,
    ) -> Result<String, SwampError>;

    async fn has_tool_permission(
        &self,
        tool_id: &str,
        project_id: &str,
        package_version_id: &str,
    ) -> Result<bool, SwampError>;

    async fn run_assessment(
        &self,
        package_version_id: &str,
        tool_id: &str,
        project_id: &str,
        platform_id: &str,
    ) -> Result<RunHandle, SwampError>;

    /// Every assessment record of the project, in one call.
    async fn assessment_records(
        &self,
        project_id: &str,
    ) -> Result<Vec<AssessmentRecord>, SwampError>;

    /// Download a result document to `dest`.
    async fn fetch_results(
        &self,
        project_id: &str,
        result_id: &str,
        dest: &Path,
    ) -> Result<(), SwampError>;

    async fn logout(&self) -> Result<(), SwampError>;
}

/// Lazily created session reused across builds.
///
/// A missing session triggers a login; a session the service no longer
/// accepts triggers a fresh one.
pub struct SessionPool {
    connector: Arc<dyn SwampConnector>,
    credentials: Credentials,
    host_url: String,
    current: Mutex<Option<Arc<dyn SwampSession>>>,
}

impl SessionPool {
    pub fn new(
        connector: Arc<dyn SwampConnector>,
        credentials: Credentials,
        host_url: &str,
    ) -> Self {
        Self {
            connector,
            credentials,
            host_url: host_url.to_string(),
            current: Mutex::new(None),
        }
    }

    /// Return the cached session, logging in when needed.
    pub async fn acquire(&self) -> Result<Arc<dyn SwampSession>, SwampError> {
        let mut current = self.current.lock().await;
        if let Some(session) = current.as_ref() {
            if session.is_authenticated().await {
                return Ok(Arc::clone(session));
            }
            tracing::warn!(host = %self.host_url, "SWAMP session expired, logging in again");
        }

        tracing::info!(
            host = %self.host_url,
            user = %self.credentials.username,
            "Logging in to SWAMP"
        );
        let session = self
            .connector
            .login(&self.credentials, &self.host_url)
            .await?;
        *current = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Forget the cached session without logging out.
    pub async fn invalidate(&self) {
        self.current.lock().await.take();
    }

    /// Log out and forget the cached session.
    pub async fn close(&self) -> Result<(), SwampError> {
        let session = self.current.lock().await.take();
        if let Some(session) = session {
            tracing::debug!("Logging out of SWAMP");
            session.logout().await?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::fake::{FakeConnector, FakeSession};
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            username: "ci".into(),
            password: "pw".into(),
        }
    }

    #[tokio::test]
    async fn acquire_logs_in_once_and_reuses_session() {
        let connector = FakeConnector::new(FakeSession::new());
        let pool = SessionPool::new(connector.clone(), credentials(), "https://swamp.test");

        pool.acquire().await.unwrap();
        pool.acquire().await.unwrap();
        assert_eq!(connector.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_session_triggers_new_login() {
        let session = FakeSession::new();
        let connector = FakeConnector::new(session.clone());
        let pool = SessionPool::new(connector.clone(), credentials(), "https://swamp.test");

        pool.acquire().await.unwrap();
        session.expired.store(true, Ordering::SeqCst);
        pool.acquire().await.unwrap();
        assert_eq!(connector.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_logs_out_and_forgets() {
        let session = FakeSession::new();
        let connector = FakeConnector::new(session.clone());
        let pool = SessionPool::new(connector.clone(), credentials(), "https://swamp.test");

        pool.acquire().await.unwrap();
        pool.close().await.unwrap();
        assert!(session.logged_out.load(Ordering::SeqCst));

        pool.acquire().await.unwrap();
        assert_eq!(connector.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_login_without_logout() {
        let session = FakeSession::new();
        let connector = FakeConnector::new(session.clone());
        let pool = SessionPool::new(connector.clone(), credentials(), "https://swamp.test");

        pool.acquire().await.unwrap();
        pool.invalidate().await;
        assert!(!session.logged_out.load(Ordering::SeqCst));

        pool.acquire().await.unwrap();
        assert_eq!(connector.logins.load(Ordering::SeqCst), 2);

        pool.invalidate().await;
        pool.close().await.unwrap();
        assert!(!session.logged_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn login_failure_is_an_auth_error() {
        let connector = Arc::new(FakeConnector {
            session: FakeSession::new(),
            logins: Default::default(),
            reject: true,
        });
        let pool = SessionPool::new(connector, credentials(), "https://swamp.test");
        let err = pool.acquire().await.err().unwrap();
        assert!(matches!(err, SwampError::Auth(_)));
    }
}
