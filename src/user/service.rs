use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::user::model::User;
use crate::user::source::UserSource;
use crate::utils::error::CustomError;

/// What to do after a user source fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Try the next source without noise.
    Quiet,
    /// Try the next source, logging the failure.
    Logged,
    /// Give up and return this error.
    Stop,
}

/// Decides which failures move on to the next source and which are final.
/// By default every failure moves on; only the last source's error is
/// reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPolicy {
    pub stop_on_invalid_argument: bool,
}

impl FallbackPolicy {
    pub fn decide(&self, err: &CustomError) -> Fallback {
        match err {
            e if e.is_not_found() => Fallback::Quiet,
            CustomError::ValidationError(..) | CustomError::InvalidIdError(..)
                if self.stop_on_invalid_argument =>
            {
                Fallback::Stop
            }
            _ => Fallback::Logged,
        }
    }
}

/// Resolves the author snapshot for new comments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<User, CustomError>;
}

/// Ordered chain of user sources, cheapest first. A hit on a later source is
/// written back to the earlier sources that missed, in the background.
pub struct UserService {
    sources: Vec<Arc<dyn UserSource>>,
    policy: FallbackPolicy,
    repair_timeout: Duration,
}

impl UserService {
    pub fn new(
        sources: Vec<Arc<dyn UserSource>>,
        policy: FallbackPolicy,
        repair_timeout: Duration,
    ) -> Self {
        UserService {
            sources,
            policy,
            repair_timeout,
        }
    }

    /// Stores a fresh snapshot in the local cache (user-updated events).
    pub async fn update(&self, user: User) -> Result<(), CustomError> {
        if user.id <= 0 {
            return Err(CustomError::ValidationError(format!(
                "user id must be positive, got {}",
                user.id
            )));
        }

        let cache = self
            .sources
            .iter()
            .find(|source| source.accepts_repair())
            .ok_or_else(|| {
                CustomError::InternalServerError("no writable user source".to_string())
            })?;

        cache.save_user(&user).await.map_err(public_error)
    }

    fn schedule_repair(&self, missed: Vec<Arc<dyn UserSource>>, user: &User) {
        for source in missed.into_iter().filter(|s| s.accepts_repair()) {
            let user = user.clone();
            let timeout = self.repair_timeout;

            // Detached: the caller already has its answer.
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, source.save_user(&user)).await {
                    Ok(Ok(())) => {
                        log::debug!("repaired user {} in {}", user.id, source.name());
                    }
                    Ok(Err(e)) => {
                        log::warn!("failed to repair user {} in {}: {}", user.id, source.name(), e);
                    }
                    Err(_) => {
                        log::warn!(
                            "repairing user {} in {} timed out after {:?}",
                            user.id,
                            source.name(),
                            timeout
                        );
                    }
                }
            });
        }
    }
}

#[async_trait]
impl UserResolver for UserService {
    async fn get_user(&self, id: i64) -> Result<User, CustomError> {
        let mut missed: Vec<Arc<dyn UserSource>> = Vec::new();
        let mut last_error = None;

        for source in &self.sources {
            match source.get_user_by_id(id).await {
                Ok(user) => {
                    self.schedule_repair(missed, &user);
                    return Ok(user);
                }
                Err(err) => {
                    match self.policy.decide(&err) {
                        Fallback::Stop => return Err(public_error(err)),
                        Fallback::Quiet => {}
                        Fallback::Logged => {
                            log::warn!("user source {} failed: {}", source.name(), err)
                        }
                    }
                    missed.push(source.clone());
                    last_error = Some(err);
                }
            }
        }

        Err(public_error(last_error.unwrap_or_else(|| {
            CustomError::InternalServerError("no user sources configured".to_string())
        })))
    }
}

/// Keeps not-found and invalid-argument, hides everything else.
fn public_error(err: CustomError) -> CustomError {
    match err {
        e @ (CustomError::UserNotFoundError
        | CustomError::ValidationError(..)
        | CustomError::InvalidIdError(..)) => e,
        other => {
            log::error!("user resolution failed: {}", other);
            CustomError::InternalServerError("user resolution failed".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::user::source::MockUserSource;

    fn alice() -> User {
        User {
            id: 7,
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            avatar_url: "https://cdn.example/alice.png".into(),
        }
    }

    fn remote(result: Result<User, CustomError>) -> Arc<dyn UserSource> {
        let mut source = MockUserSource::new();
        source.expect_name().return_const("remote");
        source.expect_accepts_repair().return_const(false);
        source
            .expect_get_user_by_id()
            .returning(move |_| result.clone());
        Arc::new(source)
    }

    fn service(sources: Vec<Arc<dyn UserSource>>) -> UserService {
        UserService::new(sources, FallbackPolicy::default(), Duration::from_secs(5))
    }

    #[actix_web::test]
    async fn primary_hit_skips_the_remote() {
        let local = Arc::new(MemoryStore::with_users([alice()]));
        let mut untouched = MockUserSource::new();
        untouched.expect_get_user_by_id().never();

        let users = service(vec![local as Arc<dyn UserSource>, Arc::new(untouched)]);

        assert_eq!(users.get_user(7).await.unwrap(), alice());
    }

    #[actix_web::test]
    async fn fallback_hit_is_returned_and_repaired_into_the_primary() {
        let local = Arc::new(MemoryStore::default());
        let users = service(vec![local.clone() as Arc<dyn UserSource>, remote(Ok(alice()))]);

        assert_eq!(users.get_user(7).await.unwrap(), alice());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(local.user(7), Some(alice()));
    }

    struct SlowCache;

    #[async_trait]
    impl UserSource for SlowCache {
        fn name(&self) -> &'static str {
            "slow-cache"
        }

        async fn get_user_by_id(&self, _id: i64) -> Result<User, CustomError> {
            Err(CustomError::UserNotFoundError)
        }

        fn accepts_repair(&self) -> bool {
            true
        }

        async fn save_user(&self, _user: &User) -> Result<(), CustomError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }
    }

    #[actix_web::test]
    async fn slow_repair_never_blocks_the_caller() {
        let users = UserService::new(
            vec![Arc::new(SlowCache) as Arc<dyn UserSource>, remote(Ok(alice()))],
            FallbackPolicy::default(),
            Duration::from_millis(50),
        );

        let resolved = tokio::time::timeout(Duration::from_millis(500), users.get_user(7))
            .await
            .expect("get_user must not wait for the repair");
        assert_eq!(resolved.unwrap(), alice());

        // The repair gives up on its own deadline.
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[actix_web::test]
    async fn unexpected_failures_collapse_to_internal() {
        let mut primary = MockUserSource::new();
        primary.expect_name().return_const("cache");
        primary
            .expect_get_user_by_id()
            .returning(|_| Err(CustomError::InternalServerError("connection reset".into())));

        let users = service(vec![
            Arc::new(primary) as Arc<dyn UserSource>,
            remote(Err(CustomError::InternalServerError("deadline exceeded".into()))),
        ]);

        let err = users.get_user(7).await.unwrap_err();
        assert!(matches!(err, CustomError::InternalServerError(ref m) if !m.contains("deadline")));
    }

    #[actix_web::test]
    async fn not_found_everywhere_stays_not_found() {
        let users = service(vec![
            Arc::new(MemoryStore::default()) as Arc<dyn UserSource>,
            remote(Err(CustomError::UserNotFoundError)),
        ]);

        assert_eq!(
            users.get_user(7).await,
            Err(CustomError::UserNotFoundError)
        );
    }

    #[actix_web::test]
    async fn invalid_argument_from_the_primary_still_tries_the_secondary() {
        let mut primary = MockUserSource::new();
        primary.expect_name().return_const("cache");
        primary.expect_accepts_repair().return_const(false);
        primary
            .expect_get_user_by_id()
            .returning(|_| Err(CustomError::InvalidIdError("bad id".into())));

        let users = service(vec![
            Arc::new(primary) as Arc<dyn UserSource>,
            remote(Ok(alice())),
        ]);

        assert_eq!(users.get_user(7).await.unwrap(), alice());
    }

    #[actix_web::test]
    async fn the_last_source_decides_the_error() {
        let mut primary = MockUserSource::new();
        primary.expect_name().return_const("cache");
        primary
            .expect_get_user_by_id()
            .returning(|_| Err(CustomError::ValidationError("bad id".into())));

        let users = service(vec![
            Arc::new(primary) as Arc<dyn UserSource>,
            remote(Err(CustomError::UserNotFoundError)),
        ]);

        assert_eq!(users.get_user(7).await, Err(CustomError::UserNotFoundError));
    }

    #[actix_web::test]
    async fn strict_policy_stops_on_invalid_argument() {
        let mut primary = MockUserSource::new();
        primary.expect_name().return_const("cache");
        primary
            .expect_get_user_by_id()
            .returning(|_| Err(CustomError::ValidationError("bad id".into())));
        let mut secondary = MockUserSource::new();
        secondary.expect_get_user_by_id().never();

        let users = UserService::new(
            vec![Arc::new(primary) as Arc<dyn UserSource>, Arc::new(secondary)],
            FallbackPolicy {
                stop_on_invalid_argument: true,
            },
            Duration::from_secs(5),
        );

        assert_eq!(
            users.get_user(-1).await,
            Err(CustomError::ValidationError("bad id".into()))
        );
    }

    #[actix_web::test]
    async fn update_writes_the_local_cache() {
        let local = Arc::new(MemoryStore::default());
        let users = service(vec![
            remote(Err(CustomError::UserNotFoundError)),
            local.clone() as Arc<dyn UserSource>,
        ]);

        users.update(alice()).await.unwrap();
        assert_eq!(local.user(7), Some(alice()));

        assert!(matches!(
            users.update(User::default()).await,
            Err(CustomError::ValidationError(..))
        ));
    }

    #[test]
    fn policy_classifies_failures() {
        let policy = FallbackPolicy::default();

        assert_eq!(policy.decide(&CustomError::UserNotFoundError), Fallback::Quiet);
        assert_eq!(
            policy.decide(&CustomError::InternalServerError("x".into())),
            Fallback::Logged
        );
        assert_eq!(
            policy.decide(&CustomError::ValidationError("x".into())),
            Fallback::Logged
        );

        let strict = FallbackPolicy {
            stop_on_invalid_argument: true,
        };
        assert_eq!(
            strict.decide(&CustomError::InvalidIdError("x".into())),
            Fallback::Stop
        );
    }
}
