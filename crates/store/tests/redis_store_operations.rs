//! Integration tests against a live Redis instance.
//!
//! Ignored by default — set `REDIS_TEST_URL` and run with `--ignored`
//! against a disposable Redis.

use orc_domain::conversation::{ConversationRecord, ConversationStatus};
use orc_domain::topic::{Topic, TopicPriority};
use orc_store::RedisStore;

async fn store() -> RedisStore {
    let url = std::env::var("REDIS_TEST_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".into());
    RedisStore::connect(&url, 86_400).await.unwrap()
}

#[tokio::test]
#[ignore]
async fn save_get_and_delete_round_trip() {
    let store = store().await;
    let record = ConversationRecord::new("it-1".into(), "testing".into());
    store.save_conversation(&record).await.unwrap();

    let fetched = store.get_conversation("it-1").await.unwrap().unwrap();
    assert_eq!(fetched.topic, "testing");

    let active = store.list_active().await.unwrap();
    assert!(active.contains(&"it-1".to_string()));

    store.delete_conversation("it-1").await.unwrap();
    assert!(store.get_conversation("it-1").await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn lock_is_exclusive_until_released() {
    let store = store().await;
    assert!(store.acquire_lock("it-lock", Some(5)).await.unwrap());
    assert!(!store.acquire_lock("it-lock", Some(5)).await.unwrap());
    assert!(store.release_lock("it-lock").await.unwrap());
    assert!(store.acquire_lock("it-lock", Some(5)).await.unwrap());
    store.release_lock("it-lock").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn topic_queue_push_pop_is_fifo() {
    let store = store().await;
    let topic_a = Topic {
        topic: "a".into(),
        source: None,
        source_url: None,
        initial_context: Default::default(),
        priority: TopicPriority::Normal,
    };
    let topic_b = Topic {
        topic: "b".into(),
        source: None,
        source_url: None,
        initial_context: Default::default(),
        priority: TopicPriority::Normal,
    };
    store.push_topic("it-queue", &topic_a).await.unwrap();
    store.push_topic("it-queue", &topic_b).await.unwrap();
    assert_eq!(store.topic_queue_length("it-queue").await.unwrap(), 2);
    let popped = store.pop_topic("it-queue").await.unwrap().unwrap();
    assert_eq!(popped.topic, "a");
}

#[tokio::test]
#[ignore]
async fn update_conversation_applies_a_mutation_in_place() {
    let store = store().await;
    let record = ConversationRecord::new("it-update".into(), "testing updates".into());
    store.save_conversation(&record).await.unwrap();

    let applied = store
        .update_conversation("it-update", |r| r.status = ConversationStatus::Stopped)
        .await
        .unwrap();
    assert!(applied);

    let fetched = store.get_conversation("it-update").await.unwrap().unwrap();
    assert_eq!(fetched.status, ConversationStatus::Stopped);

    store.delete_conversation("it-update").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn update_conversation_returns_false_for_missing_record() {
    let store = store().await;
    let applied = store
        .update_conversation("it-does-not-exist", |r| r.status = ConversationStatus::Stopped)
        .await
        .unwrap();
    assert!(!applied);
}

#[tokio::test]
#[ignore]
async fn search_conversations_filters_by_topic_substring_and_status() {
    let store = store().await;
    let mut rust_record = ConversationRecord::new("it-search-1".into(), "Rust vs Go".into());
    rust_record.status = ConversationStatus::Completed;
    let python_record = ConversationRecord::new("it-search-2".into(), "Python packaging".into());
    store.save_conversation(&rust_record).await.unwrap();
    store.save_conversation(&python_record).await.unwrap();

    let by_topic = store.search_conversations("rust", None).await.unwrap();
    assert!(by_topic.iter().any(|r| r.conversation_id == "it-search-1"));
    assert!(!by_topic.iter().any(|r| r.conversation_id == "it-search-2"));

    let by_status = store.search_conversations("", Some("completed")).await.unwrap();
    assert!(by_status.iter().any(|r| r.conversation_id == "it-search-1"));
    assert!(!by_status.iter().any(|r| r.conversation_id == "it-search-2"));

    store.delete_conversation("it-search-1").await.unwrap();
    store.delete_conversation("it-search-2").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn cleanup_expired_leaves_live_conversations_in_the_active_set() {
    let store = store().await;
    let record = ConversationRecord::new("it-cleanup".into(), "testing cleanup".into());
    store.save_conversation(&record).await.unwrap();

    store.cleanup_expired().await.unwrap();
    let active = store.list_active().await.unwrap();
    assert!(active.contains(&"it-cleanup".to_string()));

    store.delete_conversation("it-cleanup").await.unwrap();
}
