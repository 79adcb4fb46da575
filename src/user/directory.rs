use std::time::Duration;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use reqwest::StatusCode;

use crate::user::model::User;
use crate::user::source::UserSource;
use crate::utils::config::UserDirectoryConfig;
use crate::utils::error::CustomError;

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Outcome of a single directory request.
#[derive(Debug, PartialEq)]
enum Attempt {
    Transient(String),
    Final(CustomError),
}

/// Authoritative, remote user lookup over HTTP.
pub struct UserDirectoryClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_attempts: u32,
}

impl UserDirectoryClient {
    pub fn new(config: &UserDirectoryConfig) -> Result<Self, CustomError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CustomError::InternalServerError(format!("user directory client: {e}")))?;

        Ok(UserDirectoryClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            max_attempts: config.retries.max(1),
        })
    }

    async fn fetch_once(&self, id: i64) -> Result<User, Attempt> {
        let url = format!("{}/users/{}", self.base_url, id);

        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    Attempt::Transient(e.to_string())
                } else {
                    Attempt::Final(CustomError::InternalServerError(e.to_string()))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<User>().await.map_err(|e| {
                Attempt::Final(CustomError::InternalServerError(format!(
                    "user directory returned an unreadable body: {e}"
                )))
            });
        }

        Err(classify_status(status))
    }
}

fn classify_status(status: StatusCode) -> Attempt {
    match status {
        StatusCode::NOT_FOUND => Attempt::Final(CustomError::UserNotFoundError),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Attempt::Final(
            CustomError::ValidationError("user directory rejected the id".to_string()),
        ),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            Attempt::Transient(status.to_string())
        }
        s if s.is_server_error() => Attempt::Transient(s.to_string()),
        s => Attempt::Final(CustomError::InternalServerError(format!(
            "user directory answered {s}"
        ))),
    }
}

/// Doubling delays without jitter. The attempt count bounds the loop, not elapsed time.
fn retry_policy() -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: BACKOFF_BASE,
        initial_interval: BACKOFF_BASE,
        randomization_factor: 0.0,
        multiplier: 2.0,
        max_interval: BACKOFF_MAX,
        max_elapsed_time: None,
        ..Default::default()
    }
}

#[async_trait]
impl UserSource for UserDirectoryClient {
    fn name(&self) -> &'static str {
        "user-directory"
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User, CustomError> {
        let mut policy = retry_policy();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(id).await {
                Ok(user) => return Ok(user),
                Err(Attempt::Final(e)) => return Err(e),
                Err(Attempt::Transient(detail)) => {
                    if attempt >= self.max_attempts {
                        return Err(CustomError::InternalServerError(format!(
                            "user directory unavailable after {attempt} attempts: {detail}"
                        )));
                    }
                    log::debug!("user directory attempt {} failed: {}", attempt, detail);
                    let delay = policy.next_backoff().unwrap_or(BACKOFF_MAX);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
