//! Persisted chat records
//!
//! Chats and their message lists live either in memory or in Postgres,
//! chosen once at startup from the configured database URL. Histories are
//! saved by full replace inside one transaction and loaded back in
//! insertion order.

use crate::error::AssistantError;
use crate::models::{ChatMessage, MessagePayload, MessageType, Sender};
use crate::classifier::IntentId;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSummary {
    pub id: Uuid,
    pub title: String,
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

enum StoreBackend {
    InMemory {
        chats: Arc<RwLock<HashMap<Uuid, ChatSummary>>>,
        messages: Arc<RwLock<HashMap<Uuid, Vec<ChatMessage>>>>,
    },
    Postgres {
        pool: PgPool,
        schema_ready: Arc<OnceCell<()>>,
    },
}

pub struct ChatStore {
    backend: StoreBackend,
}

impl ChatStore {
    pub fn in_memory() -> Self {
        Self {
            backend: StoreBackend::InMemory {
                chats: Arc::new(RwLock::new(HashMap::new())),
                messages: Arc::new(RwLock::new(HashMap::new())),
            },
        }
    }

    /// Postgres when a URL is given and the pool can be created, memory otherwise
    pub fn connect(database_url: Option<&str>) -> Self {
        if let Some(url) = database_url {
            match sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect_lazy(url)
            {
                Ok(pool) => {
                    info!("Chat store backend: postgres");
                    return Self {
                        backend: StoreBackend::Postgres {
                            pool,
                            schema_ready: Arc::new(OnceCell::new()),
                        },
                    };
                }
                Err(error) => {
                    warn!(
                        "Failed to initialize postgres chat store, falling back to in-memory: {}",
                        error
                    );
                }
            }
        }

        info!("Chat store backend: in-memory");
        Self::in_memory()
    }

    async fn ensure_schema_if_needed(&self) -> Result<()> {
        let StoreBackend::Postgres { pool, schema_ready } = &self.backend else {
            return Ok(());
        };

        schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS chats (
                      id UUID PRIMARY KEY,
                      title TEXT NOT NULL,
                      wallet_address TEXT,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS chat_messages (
                      message_id UUID PRIMARY KEY,
                      chat_id UUID NOT NULL,
                      position INTEGER NOT NULL,
                      sender TEXT NOT NULL,
                      text TEXT NOT NULL,
                      message_type TEXT NOT NULL,
                      intent TEXT,
                      payload TEXT,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_chat_messages_chat_position
                    ON chat_messages (chat_id, position);
                    "#,
                )
                .execute(pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AssistantError::Database(format!("Failed to initialize chat store schema: {}", e))
            })?;

        Ok(())
    }

    pub async fn create_chat(&self, chat: &ChatSummary) -> Result<()> {
        match &self.backend {
            StoreBackend::InMemory { chats, .. } => {
                chats.write().await.insert(chat.id, chat.clone());
                Ok(())
            }
            StoreBackend::Postgres { pool, .. } => {
                self.ensure_schema_if_needed().await?;

                sqlx::query(
                    r#"
                    INSERT INTO chats (id, title, wallet_address, created_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, wallet_address = EXCLUDED.wallet_address
                    "#,
                )
                .bind(chat.id)
                .bind(&chat.title)
                .bind(&chat.wallet_address)
                .bind(chat.created_at)
                .execute(pool)
                .await
                .map_err(|e| AssistantError::Database(format!("Failed to save chat: {}", e)))?;

                Ok(())
            }
        }
    }

    pub async fn chat(&self, id: Uuid) -> Result<Option<ChatSummary>> {
        match &self.backend {
            StoreBackend::InMemory { chats, .. } => Ok(chats.read().await.get(&id).cloned()),
            StoreBackend::Postgres { pool, .. } => {
                self.ensure_schema_if_needed().await?;

                let row = sqlx::query(
                    "SELECT id, title, wallet_address, created_at FROM chats WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|e| AssistantError::Database(format!("Failed to load chat: {}", e)))?;

                Ok(row.map(|row| ChatSummary {
                    id: row.try_get("id").unwrap_or(id),
                    title: row.try_get("title").unwrap_or_default(),
                    wallet_address: row.try_get("wallet_address").ok().flatten(),
                    created_at: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
                }))
            }
        }
    }

    /// Chats newest first, optionally only those of one wallet
    pub async fn list_chats(&self, wallet: Option<&str>) -> Result<Vec<ChatSummary>> {
        let mut chats = match &self.backend {
            StoreBackend::InMemory { chats, .. } => chats
                .read()
                .await
                .values()
                .filter(|c| wallet.map_or(true, |w| c.wallet_address.as_deref() == Some(w)))
                .cloned()
                .collect::<Vec<_>>(),
            StoreBackend::Postgres { pool, .. } => {
                self.ensure_schema_if_needed().await?;

                let rows = sqlx::query(
                    r#"
                    SELECT id, title, wallet_address, created_at FROM chats
                    WHERE $1::TEXT IS NULL OR wallet_address = $1
                    "#,
                )
                .bind(wallet)
                .fetch_all(pool)
                .await
                .map_err(|e| AssistantError::Database(format!("Failed to list chats: {}", e)))?;

                rows.into_iter()
                    .filter_map(|row| {
                        Some(ChatSummary {
                            id: row.try_get("id").ok()?,
                            title: row.try_get("title").unwrap_or_default(),
                            wallet_address: row.try_get("wallet_address").ok().flatten(),
                            created_at: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
                        })
                    })
                    .collect()
            }
        };

        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    pub async fn load_messages(&self, chat_id: Uuid) -> Result<Vec<ChatMessage>> {
        match &self.backend {
            StoreBackend::InMemory { messages, .. } => {
                Ok(messages.read().await.get(&chat_id).cloned().unwrap_or_default())
            }
            StoreBackend::Postgres { pool, .. } => {
                self.ensure_schema_if_needed().await?;

                let rows = sqlx::query(
                    r#"
                    SELECT message_id, sender, text, message_type, intent, payload, created_at
                    FROM chat_messages
                    WHERE chat_id = $1
                    ORDER BY position ASC
                    "#,
                )
                .bind(chat_id)
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    AssistantError::Database(format!("Failed to load chat messages: {}", e))
                })?;

                let mut history = Vec::with_capacity(rows.len());
                for row in rows {
                    let sender: String = row.try_get("sender").unwrap_or_else(|_| "ai".to_string());
                    let message_type: String =
                        row.try_get("message_type").unwrap_or_else(|_| "text".to_string());
                    let intent: Option<String> = row.try_get("intent").ok().flatten();
                    let payload: Option<String> = row.try_get("payload").ok().flatten();

                    history.push(ChatMessage {
                        id: row.try_get("message_id").unwrap_or_else(|_| Uuid::new_v4()),
                        sender: parse_tag::<Sender>(&sender).unwrap_or(Sender::Ai),
                        text: row.try_get("text").unwrap_or_default(),
                        message_type: MessageType::parse(&message_type).unwrap_or(MessageType::Text),
                        intent: intent.as_deref().and_then(parse_tag::<IntentId>),
                        payload: payload
                            .as_deref()
                            .and_then(|raw| serde_json::from_str::<MessagePayload>(raw).ok()),
                        created_at: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
                    });
                }

                Ok(history)
            }
        }
    }

    pub async fn save_messages(&self, chat_id: Uuid, history: &[ChatMessage]) -> Result<()> {
        match &self.backend {
            StoreBackend::InMemory { messages, .. } => {
                messages.write().await.insert(chat_id, history.to_vec());
                Ok(())
            }
            StoreBackend::Postgres { pool, .. } => {
                self.ensure_schema_if_needed().await?;

                let mut tx = pool.begin().await.map_err(|e| {
                    AssistantError::Database(format!(
                        "Failed to begin transaction for saving chat messages: {}",
                        e
                    ))
                })?;

                sqlx::query("DELETE FROM chat_messages WHERE chat_id = $1")
                    .bind(chat_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AssistantError::Database(format!("Failed to clear old chat messages: {}", e))
                    })?;

                for (position, msg) in history.iter().enumerate() {
                    let payload = msg
                        .payload
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?;

                    sqlx::query(
                        r#"
                        INSERT INTO chat_messages
                          (message_id, chat_id, position, sender, text, message_type, intent, payload, created_at)
                        VALUES
                          ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                        "#,
                    )
                    .bind(msg.id)
                    .bind(chat_id)
                    .bind(position as i32)
                    .bind(tag_of(&msg.sender))
                    .bind(&msg.text)
                    .bind(msg.message_type.as_str())
                    .bind(msg.intent.map(|i| i.as_str()))
                    .bind(payload)
                    .bind(msg.created_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AssistantError::Database(format!("Failed to insert chat message: {}", e))
                    })?;
                }

                tx.commit().await.map_err(|e| {
                    AssistantError::Database(format!(
                        "Failed to commit chat messages transaction: {}",
                        e
                    ))
                })?;

                Ok(())
            }
        }
    }
}

fn parse_tag<T: DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(Value::String(value.to_string())).ok()
}

fn tag_of<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(tag)) => tag,
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip_keeps_order() {
        let store = ChatStore::in_memory();
        let chat_id = Uuid::new_v4();
        let history = vec![
            ChatMessage::user("stake SOL"),
            ChatMessage::loading("🔍 Fetching validators..."),
            ChatMessage::new(Sender::Ai, MessageType::Validators, "Pick one"),
        ];

        store.save_messages(chat_id, &history).await.unwrap();
        let loaded = store.load_messages(chat_id).await.unwrap();
        assert_eq!(loaded, history);

        assert!(store.load_messages(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_chats_filters_by_wallet() {
        let store = ChatStore::connect(None);
        for (title, wallet) in [("a", Some("w1")), ("b", Some("w2")), ("c", None)] {
            store
                .create_chat(&ChatSummary {
                    id: Uuid::new_v4(),
                    title: title.to_string(),
                    wallet_address: wallet.map(str::to_string),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let mine = store.list_chats(Some("w1")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "a");
        assert_eq!(store.list_chats(None).await.unwrap().len(), 3);
    }

    #[test]
    fn test_tags_match_wire_names() {
        assert_eq!(tag_of(&Sender::Venice), "venice");
        assert_eq!(parse_tag::<Sender>("sonia"), Some(Sender::Sonia));
        assert_eq!(parse_tag::<IntentId>("get_auction"), Some(IntentId::GetAuction));
    }
}
