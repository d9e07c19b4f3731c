//! Reacts to join and draw commands in chat.
//!
//! The participant list lives in memory and is written through to the store
//! on every change. Each handler finishes its read-modify-write on the pool
//! before its first suspension point, so two commands handled back to back
//! cannot both see a stale pool.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::client::{ClientError, MessagingClient, OutgoingText};
use crate::codec;
use crate::config::BotConfig;
use crate::giveaway::{
    AdminAllowlist, Command, CommandParser, DrawError, DrawPermission, JoinOutcome, Participant,
    ParticipantPool,
};
use crate::store::GuardedStore;
use crate::types::{Message, JID};

const INVALID_NAME: &str = "🚫 Por favor, envie um nome válido após @ (ex.: @Joao).";
const PERMISSION_DENIED: &str = "🚫 Apenas o administrador pode usar o comando !sortear.";
const NO_PARTICIPANTS: &str = "🚫 Nenhum participante no sorteio!";
const INVALID_COUNT: &str = "🚫 O número de vencedores deve ser pelo menos 1.";
const POOL_RESET: &str = "Lista de participantes resetada para o próximo sorteio!";

pub struct GiveawayController {
    store: GuardedStore,
    key: String,
    parser: CommandParser,
    permission: Box<dyn DrawPermission>,
    pool: Mutex<ParticipantPool>,
    rng: Mutex<StdRng>,
}

impl GiveawayController {
    pub fn new(
        store: GuardedStore,
        key: impl Into<String>,
        parser: CommandParser,
        permission: impl DrawPermission + 'static,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            parser,
            permission: Box::new(permission),
            pool: Mutex::new(ParticipantPool::new()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_config(store: GuardedStore, config: &BotConfig) -> Self {
        Self::new(
            store,
            config.keys.participants.clone(),
            CommandParser::new(config.join_marker.clone(), config.draw_command.clone()),
            AdminAllowlist::new(&config.admins, config.self_is_admin),
        )
    }

    /// Replace the shuffle source, for reproducible draws.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Load the persisted participant list, replacing the in-memory one.
    ///
    /// A missing or undecodable list loads as empty.
    pub async fn load(&self) -> usize {
        let records = match self.store.read(&self.key).await {
            Some(stored) => codec::decode::<Vec<Participant>>(&stored).unwrap_or_else(|e| {
                error!(key = %self.key, error = %e, "stored participants are corrupt, starting empty");
                Vec::new()
            }),
            None => Vec::new(),
        };
        let pool = ParticipantPool::from_records(records);
        let count = pool.len();
        *self.pool() = pool;
        info!(count, "participants loaded");
        count
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.pool().participants().to_vec()
    }

    /// Handle one inbound message. Anything that is not a command is ignored.
    pub async fn handle_message<C>(&self, client: &C, message: &Message) -> Result<(), ClientError>
    where
        C: MessagingClient + ?Sized,
    {
        let Some(command) = self.parser.parse(message.text()) else {
            return Ok(());
        };
        let chat = &message.info.chat;
        let sender = message.info.sender();
        debug!(%chat, %sender, ?command, "command received");

        match command {
            Command::Join(name) => self.join(client, chat, sender, name).await,
            Command::JoinWithoutName => {
                warn!(%sender, "join without a name");
                let reply = OutgoingText::new(INVALID_NAME).mentioning([sender.clone()]);
                client.send_message(chat, reply).await.map(drop)
            }
            Command::Draw { requested } => self.draw(client, chat, sender, requested).await,
        }
    }

    async fn join<C>(&self, client: &C, chat: &JID, sender: &JID, name: &str) -> Result<(), ClientError>
    where
        C: MessagingClient + ?Sized,
    {
        let (outcome, snapshot) = {
            let mut pool = self.pool();
            let outcome = pool.join(sender.to_string(), name);
            (outcome, pool.participants().to_vec())
        };

        let text = match outcome {
            JoinOutcome::Added(participant) => {
                info!(name = %participant.name, id = %participant.id, total = snapshot.len(), "participant added");
                self.persist(&snapshot).await;
                format!("🎉 @{} foi adicionado ao sorteio!", participant.name)
            }
            JoinOutcome::AlreadyJoined(existing) => {
                info!(name = %existing.name, id = %existing.id, "participant already joined");
                format!("🚫 @{} já está participando!", existing.name)
            }
        };
        let reply = OutgoingText::new(text).mentioning([sender.clone()]);
        client.send_message(chat, reply).await.map(drop)
    }

    async fn draw<C>(&self, client: &C, chat: &JID, sender: &JID, requested: i64) -> Result<(), ClientError>
    where
        C: MessagingClient + ?Sized,
    {
        let own = client.own_jid().await;
        if !self.permission.allows(sender, own.as_ref()) {
            warn!(%sender, "draw denied");
            return client
                .send_message(chat, OutgoingText::new(PERMISSION_DENIED))
                .await
                .map(drop);
        }

        let (entrants, drawn) = {
            let mut pool = self.pool();
            let entrants = pool.participants().to_vec();
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            (entrants, pool.draw(requested, &mut *rng))
        };
        let winners = match drawn {
            Ok(winners) => winners,
            Err(DrawError::EmptyPool) => {
                info!("draw with no participants");
                return client
                    .send_message(chat, OutgoingText::new(NO_PARTICIPANTS))
                    .await
                    .map(drop);
            }
            Err(DrawError::InvalidCount(count)) => {
                warn!(count, "draw with invalid winner count");
                return client
                    .send_message(chat, OutgoingText::new(INVALID_COUNT))
                    .await
                    .map(drop);
            }
        };

        info!(requested, winners = ?winners, "winners drawn");
        let mentions = winners.iter().filter_map(|w| w.id.parse::<JID>().ok());
        let announcement = OutgoingText::new(announce(&winners)).mentioning(mentions);
        if let Err(e) = client.send_message(chat, announcement).await {
            error!(error = %e, "failed to announce winners, keeping participants");
            let snapshot = {
                let mut pool = self.pool();
                pool.restore(entrants);
                pool.participants().to_vec()
            };
            self.persist(&snapshot).await;
            return Err(e);
        }

        let remaining = self.participants();
        self.persist(&remaining).await;
        info!(joined_since = remaining.len(), "participants reset");
        client
            .send_message(chat, OutgoingText::new(POOL_RESET))
            .await
            .map(drop)
    }

    async fn persist(&self, participants: &[Participant]) -> bool {
        match codec::encode(participants) {
            Ok(stored) => self.store.write(&self.key, &stored).await,
            Err(e) => {
                error!(error = %e, "failed to encode participants");
                false
            }
        }
    }

    fn pool(&self) -> MutexGuard<'_, ParticipantPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn announce(winners: &[Participant]) -> String {
    let names = winners
        .iter()
        .map(|w| format!("@{}", w.name))
        .collect::<Vec<_>>()
        .join(", ");
    if winners.len() > 1 {
        format!("🏆 Os vencedores do sorteio são: {names}! Parabéns!")
    } else {
        format!("🏆 O vencedor do sorteio é: {names}! Parabéns!")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::testing::RecordingClient;
    use crate::store::{GuardPolicy, KeyValueStore, MemoryStore};
    use crate::types::{MessageContent, MessageID, MessageInfo};

    const BOT: &str = "5511999990000:7@s.whatsapp.net";
    const GROUP: &str = "120363000000000000@g.us";

    fn controller(backend: Arc<MemoryStore>) -> GiveawayController {
        let store = GuardedStore::new(backend, GuardPolicy::default());
        GiveawayController::from_config(store, &BotConfig::default())
            .with_rng(StdRng::seed_from_u64(3))
    }

    fn message(sender: &str, text: &str) -> Message {
        Message {
            info: MessageInfo {
                id: "3EB0AA".into(),
                chat: GROUP.parse().unwrap(),
                participant: Some(sender.parse().unwrap()),
                is_from_me: false,
                timestamp: 1_700_000_000,
                push_name: None,
            },
            content: Some(MessageContent::Conversation(text.into())),
        }
    }

    fn stored(backend: &MemoryStore) -> Vec<Participant> {
        codec::decode(&backend.raw("draw_participants").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let backend = Arc::new(MemoryStore::new());
        let giveaway = controller(backend.clone());
        let client = RecordingClient::logged_in_as(BOT);

        giveaway.handle_message(&client, &message("5511100000001@s.whatsapp.net", "@Ana")).await.unwrap();
        giveaway.handle_message(&client, &message("5511100000001@s.whatsapp.net", "@Beatriz")).await.unwrap();

        assert_eq!(
            client.texts(),
            vec![
                "🎉 @Ana foi adicionado ao sorteio!".to_string(),
                "🚫 @Ana já está participando!".to_string(),
            ]
        );
        let records = stored(&backend);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Ana");
        assert_eq!(
            client.last().unwrap().mentions,
            vec!["5511100000001@s.whatsapp.net".parse::<JID>().unwrap()]
        );
    }

    #[tokio::test]
    async fn test_join_without_name_is_rejected() {
        let backend = Arc::new(MemoryStore::new());
        let giveaway = controller(backend.clone());
        let client = RecordingClient::logged_in_as(BOT);

        giveaway.handle_message(&client, &message("5511100000001@s.whatsapp.net", "@   ")).await.unwrap();

        assert_eq!(client.texts(), vec![INVALID_NAME.to_string()]);
        assert!(giveaway.participants().is_empty());
        assert!(backend.raw("draw_participants").is_none());
    }

    #[tokio::test]
    async fn test_draw_exhausts_pool() {
        let backend = Arc::new(MemoryStore::new());
        let giveaway = controller(backend.clone());
        let client = RecordingClient::logged_in_as(BOT);

        for (n, name) in ["A", "B", "C"].iter().enumerate() {
            let sender = format!("551110000000{}@s.whatsapp.net", n + 1);
            giveaway.handle_message(&client, &message(&sender, &format!("@{name}"))).await.unwrap();
        }
        giveaway.handle_message(&client, &message("5511999990000@s.whatsapp.net", "!sortear 5")).await.unwrap();

        let texts = client.texts();
        let announcement = &texts[3];
        assert!(announcement.starts_with("🏆 Os vencedores do sorteio são: "));
        for name in ["@A", "@B", "@C"] {
            assert!(announcement.contains(name));
        }
        assert_eq!(texts[4], POOL_RESET);
        assert_eq!(client.last().unwrap().mentions, Vec::<JID>::new());

        assert!(giveaway.participants().is_empty());
        assert!(stored(&backend).is_empty());
    }

    #[tokio::test]
    async fn test_single_winner_wording() {
        let backend = Arc::new(MemoryStore::new());
        let giveaway = controller(backend);
        let client = RecordingClient::logged_in_as(BOT);

        giveaway.handle_message(&client, &message("5511100000001@s.whatsapp.net", "@Ana")).await.unwrap();
        giveaway.handle_message(&client, &message("5511999990000@s.whatsapp.net", "!sortear")).await.unwrap();

        let texts = client.texts();
        assert_eq!(texts[1], "🏆 O vencedor do sorteio é: @Ana! Parabéns!");
    }

    /// Fails every announcement of winners, passes everything else through.
    struct FailingAnnouncer(RecordingClient);

    #[async_trait::async_trait]
    impl MessagingClient for FailingAnnouncer {
        async fn own_jid(&self) -> Option<JID> {
            self.0.own_jid().await
        }

        async fn send_message(&self, chat: &JID, text: OutgoingText) -> Result<MessageID, ClientError> {
            if text.text.starts_with('🏆') {
                return Err(ClientError::NotConnected);
            }
            self.0.send_message(chat, text).await
        }
    }

    #[tokio::test]
    async fn test_failed_announcement_keeps_participants() {
        let backend = Arc::new(MemoryStore::new());
        let giveaway = controller(backend.clone());
        let client = FailingAnnouncer(RecordingClient::logged_in_as(BOT));

        giveaway.handle_message(&client, &message("5511100000001@s.whatsapp.net", "@Ana")).await.unwrap();
        let result = giveaway
            .handle_message(&client, &message("5511999990000@s.whatsapp.net", "!sortear"))
            .await;

        assert!(matches!(result, Err(ClientError::NotConnected)));
        assert_eq!(giveaway.participants().len(), 1);
        assert_eq!(stored(&backend)[0].name, "Ana");
        assert_eq!(client.0.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_draw_denied_for_others() {
        let backend = Arc::new(MemoryStore::new());
        let giveaway = controller(backend.clone());
        let client = RecordingClient::logged_in_as(BOT);

        giveaway.handle_message(&client, &message("5511100000001@s.whatsapp.net", "@Ana")).await.unwrap();
        giveaway.handle_message(&client, &message("5511100000001@s.whatsapp.net", "!sortear")).await.unwrap();

        assert_eq!(client.texts()[1], PERMISSION_DENIED);
        assert_eq!(giveaway.participants().len(), 1);
        assert_eq!(stored(&backend).len(), 1);
    }

    #[tokio::test]
    async fn test_draw_rejections() {
        let backend = Arc::new(MemoryStore::new());
        let giveaway = controller(backend);
        let client = RecordingClient::logged_in_as(BOT);
        let admin = "5511999990000@s.whatsapp.net";

        giveaway.handle_message(&client, &message(admin, "!sortear")).await.unwrap();
        giveaway.handle_message(&client, &message("5511100000001@s.whatsapp.net", "@Ana")).await.unwrap();
        giveaway.handle_message(&client, &message(admin, "!sortear 0")).await.unwrap();

        let texts = client.texts();
        assert_eq!(texts[0], NO_PARTICIPANTS);
        assert_eq!(texts[2], INVALID_COUNT);
        assert_eq!(giveaway.participants().len(), 1);
    }

    #[tokio::test]
    async fn test_load_restores_and_tolerates_garbage() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set("draw_participants", r#"[{"id":"1@s.whatsapp.net","name":"Ana"}]"#)
            .await
            .unwrap();
        let giveaway = controller(backend.clone());
        assert_eq!(giveaway.load().await, 1);
        assert_eq!(giveaway.participants()[0].name, "Ana");

        backend.set("draw_participants", "{oops").await.unwrap();
        assert_eq!(giveaway.load().await, 0);
    }

    #[tokio::test]
    async fn test_plain_text_is_ignored() {
        let giveaway = controller(Arc::new(MemoryStore::new()));
        let client = RecordingClient::logged_in_as(BOT);

        giveaway.handle_message(&client, &message("5511100000001@s.whatsapp.net", "bom dia")).await.unwrap();
        assert!(client.texts().is_empty());
    }
}
