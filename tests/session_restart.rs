//! A bot restarted on the same store comes back with the same identity and
//! the same participants.

use std::sync::Arc;

use tempfile::TempDir;
use wa_giveaway::store::{FileStore, GuardPolicy, MemoryStore};
use wa_giveaway::{
    AuthState, Bot, BotConfig, ConsoleConnector, CredsOrigin, GuardedStore, KeyCategory,
    KeyValueStore, Shutdown, SignalKeyStore, StoreKeys,
};

fn guarded(backend: Arc<dyn KeyValueStore>) -> GuardedStore {
    GuardedStore::new(backend, GuardPolicy::default())
}

#[tokio::test]
async fn test_persisted_credentials_survive_restart() {
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let layout = StoreKeys::default();

    let first = AuthState::initialize(guarded(backend.clone()), &layout).await;
    assert_eq!(first.origin(), CredsOrigin::Fresh);
    assert_eq!(backend.get(&layout.creds).await.unwrap(), None);

    first.creds().write().await.account_sync_counter += 1;
    assert!(first.persist_credentials().await);

    let second = AuthState::initialize(guarded(backend), &layout).await;
    assert_eq!(second.origin(), CredsOrigin::Loaded);
    assert_eq!(*second.creds().read().await, *first.creds().read().await);
}

#[tokio::test]
async fn test_console_bot_restart_on_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let input = "5511100000001: @Ana\n5511100000002: @Bia\n5511100000001: @Outra\n";

    let bot = Bot::start(
        BotConfig::default(),
        ConsoleConnector::new(input.as_bytes(), "5511999990000"),
        guarded(Arc::new(FileStore::new(&path))),
    )
    .await;
    assert_eq!(bot.run().await.unwrap(), Shutdown::StreamEnded);
    let paired = bot.auth().creds().read().await.clone();
    assert!(paired.is_paired());
    drop(bot);

    let restarted = Bot::start(
        BotConfig::default(),
        ConsoleConnector::new("5511999990000: !sortear 5\n".as_bytes(), "5511999990000"),
        guarded(Arc::new(FileStore::new(&path))),
    )
    .await;
    assert_eq!(restarted.auth().origin(), CredsOrigin::Loaded);
    assert_eq!(*restarted.auth().creds().read().await, paired);

    let names: Vec<_> = restarted
        .giveaway()
        .participants()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Ana".to_string(), "Bia".to_string()]);

    let keys = restarted.auth().keys();
    let pre_keys = keys
        .get(KeyCategory::PreKey, &["1".to_string(), "5".to_string(), "6".to_string()])
        .await;
    assert_eq!(pre_keys.len(), 2);

    assert_eq!(restarted.run().await.unwrap(), Shutdown::StreamEnded);
    assert!(restarted.giveaway().participants().is_empty());
}
