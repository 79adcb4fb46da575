use std::sync::Arc;

use crate::hub::handlers::{Caller, Emitted, MutationHandlers};
use crate::hub::model::{Event, EventType};
use crate::utils::error::CustomError;

/// Every inbound event kind with a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    CreateComment,
    UpdateComment,
    DeleteComment,
    Unsupported(String),
}

impl Route {
    pub fn of(tag: &str) -> Route {
        const CREATE: &str = EventType::CreateComment.as_str();
        const UPDATE: &str = EventType::UpdateComment.as_str();
        const DELETE: &str = EventType::DeleteComment.as_str();

        match tag {
            CREATE => Route::CreateComment,
            UPDATE => Route::UpdateComment,
            DELETE => Route::DeleteComment,
            other => Route::Unsupported(other.to_string()),
        }
    }
}

/// Dispatches inbound events to exactly one handler. The payload is only
/// looked at by the handler.
pub struct EventRouter {
    handlers: Arc<MutationHandlers>,
}

impl EventRouter {
    pub fn new(handlers: Arc<MutationHandlers>) -> Self {
        EventRouter { handlers }
    }

    pub async fn route(&self, event: Event, caller: &Caller) -> Result<Emitted, CustomError> {
        log::debug!(
            "routing {} from user {} on {}",
            event.kind,
            caller.user_id,
            caller.channel.name()
        );

        match Route::of(&event.kind) {
            Route::CreateComment => self.handlers.create(event.payload, caller).await,
            Route::UpdateComment => self.handlers.update(event.payload, caller).await,
            Route::DeleteComment => self.handlers.delete(event.payload, caller).await,
            Route::Unsupported(tag) => {
                log::info!("user {} sent unsupported event {}", caller.user_id, tag);
                Err(CustomError::EventNotSupportedError(tag))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::service::CommentService;
    use crate::database::memory::MemoryStore;
    use crate::database::store::MockCommentStore;
    use crate::hub::broadcaster::{Broadcaster, MockBroadcaster};
    use crate::hub::model::Channel;
    use crate::user::model::User;
    use crate::user::service::MockUserResolver;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(Channel, Event)>>,
    }

    impl Recorder {
        fn sent(&self) -> Vec<(Channel, Event)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Broadcaster for Recorder {
        async fn publish(&self, channel: Channel, event: Event) -> Result<u64, CustomError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((channel, event));
            Ok(sent.len() as u64)
        }
    }

    fn users() -> MockUserResolver {
        let mut users = MockUserResolver::new();
        users.expect_get_user().returning(|id| {
            Ok(User {
                id,
                first_name: format!("User{id}"),
                last_name: "Tester".into(),
                avatar_url: String::new(),
            })
        });
        users
    }

    fn router_with(store: MemoryStore, publisher: Arc<dyn Broadcaster>) -> EventRouter {
        let comments = Arc::new(CommentService::new(Arc::new(store), Arc::new(users())));
        EventRouter::new(Arc::new(MutationHandlers::new(comments, publisher)))
    }

    fn caller(user_id: i64, post: &str) -> Caller {
        Caller {
            user_id,
            channel: Channel::Post(post.into()),
        }
    }

    fn inbound(kind: &str, payload: Value) -> Event {
        Event {
            kind: kind.into(),
            payload,
            timestamp: 0,
        }
    }

    #[test]
    fn tags_map_to_routes() {
        assert_eq!(Route::of("create_comment"), Route::CreateComment);
        assert_eq!(Route::of("update_comment"), Route::UpdateComment);
        assert_eq!(Route::of("delete_comment"), Route::DeleteComment);
        assert_eq!(
            Route::of("new_comment"),
            Route::Unsupported("new_comment".into())
        );
    }

    #[actix_web::test]
    async fn unsupported_events_never_reach_a_handler() {
        let mut store = MockCommentStore::new();
        store.expect_get_comment().never();
        store.expect_create_comment().never();
        store.expect_update_comment().never();
        store.expect_delete_comment().never();
        let mut users = MockUserResolver::new();
        users.expect_get_user().never();
        let mut publisher = MockBroadcaster::new();
        publisher.expect_publish().never();

        let comments = Arc::new(CommentService::new(Arc::new(store), Arc::new(users)));
        let router = EventRouter::new(Arc::new(MutationHandlers::new(
            comments,
            Arc::new(publisher),
        )));

        for tag in ["like_comment", "CREATE_COMMENT", "", "new_comment"] {
            let result = router
                .route(inbound(tag, json!({ "body": "hi" })), &caller(1, "P1"))
                .await;
            assert_eq!(
                result,
                Err(CustomError::EventNotSupportedError(tag.to_string()))
            );
        }
    }

    #[actix_web::test]
    async fn only_the_author_can_remove_a_comment() {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(MemoryStore::default(), recorder.clone());

        let created = router
            .route(
                inbound("create_comment", json!({ "post_id": "P1", "body": "hi" })),
                &caller(1, "P1"),
            )
            .await
            .unwrap();

        assert_eq!(created.channel, Channel::Post("P1".into()));
        assert_eq!(created.event.kind, "new_comment");
        assert_eq!(created.event.payload["user"]["id"], 1);
        assert_eq!(created.event.payload["body"], "hi");
        let comment_id = created.event.payload["id"].as_str().unwrap().to_string();

        let denied = router
            .route(
                inbound("delete_comment", json!({ "comment_id": comment_id })),
                &caller(2, "P1"),
            )
            .await;
        assert!(matches!(denied, Err(CustomError::UnauthorizedError(..))));

        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent.iter().all(|(_, event)| event.kind != "remove_comment"));

        let removed = router
            .route(
                inbound("delete_comment", json!({ "comment_id": comment_id })),
                &caller(1, "P1"),
            )
            .await
            .unwrap();
        assert_eq!(removed.event.kind, "remove_comment");
        assert_eq!(removed.event.payload, json!({ "id": comment_id }));
        assert_eq!(removed.offset, 2);
    }

    #[actix_web::test]
    async fn edits_are_broadcast_on_the_comment_post() {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(MemoryStore::default(), recorder.clone());

        let created = router
            .route(inbound("create_comment", json!({ "body": "hi" })), &caller(1, "P1"))
            .await
            .unwrap();
        let comment_id = created.event.payload["id"].clone();

        let edited = router
            .route(
                inbound("update_comment", json!({ "comment_id": comment_id, "body": "edited" })),
                &caller(1, "P9"),
            )
            .await
            .unwrap();

        assert_eq!(edited.channel, Channel::Post("P1".into()));
        assert_eq!(edited.event.kind, "edit_comment");
        assert_eq!(edited.event.payload["body"], "edited");
        assert_eq!(recorder.sent().len(), 2);
    }

    #[actix_web::test]
    async fn malformed_payloads_are_rejected_before_any_write() {
        let store = MemoryStore::default();
        let recorder = Arc::new(Recorder::default());
        let router = router_with(store, recorder.clone());

        let cases = [
            inbound("create_comment", json!({ "text": "hi" })),
            inbound("create_comment", json!({ "post_id": "P2", "body": "hi" })),
            inbound("update_comment", json!({ "body": "no id" })),
            inbound("delete_comment", json!("abc")),
        ];

        for event in cases {
            let result = router.route(event, &caller(1, "P1")).await;
            assert!(
                matches!(result, Err(CustomError::ValidationError(..))),
                "{result:?}"
            );
        }
        assert!(recorder.sent().is_empty());
    }

    #[actix_web::test]
    async fn nothing_is_created_on_a_private_channel() {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(MemoryStore::default(), recorder.clone());
        let private = Caller {
            user_id: 1,
            channel: Channel::Private(1),
        };

        let result = router
            .route(inbound("create_comment", json!({ "body": "hi" })), &private)
            .await;

        assert!(matches!(result, Err(CustomError::ValidationError(..))));
        assert!(recorder.sent().is_empty());
    }

    #[actix_web::test]
    async fn a_failed_publish_surfaces_as_internal() {
        let mut publisher = MockBroadcaster::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_, _| Err(CustomError::InternalServerError("hub unavailable".into())));
        let router = router_with(MemoryStore::default(), Arc::new(publisher));

        let result = router
            .route(inbound("create_comment", json!({ "body": "hi" })), &caller(1, "P1"))
            .await;

        assert!(matches!(result, Err(CustomError::InternalServerError(..))));
    }
}
