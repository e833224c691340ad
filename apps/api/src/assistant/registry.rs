use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assistant::chat::{ChatSession, ChatState, PendingTurn};
use crate::assistant::query::{self, AiQueryResult};
use crate::classes::service::find_class;
use crate::errors::AppError;
use crate::state::AppState;

const SESSION_NOT_FOUND: &str = "Chat session not found";

/// Idle sessions older than this are dropped the next time a session opens.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
/// Opening one more evicts the owner's least recently used idle session.
pub const MAX_SESSIONS_PER_OWNER: usize = 10;

struct Tracked {
    session: ChatSession,
    touched: Instant,
}

impl Tracked {
    fn is_idle(&self) -> bool {
        self.session.state() == ChatState::Idle
    }
}

/// Live chat sessions keyed by id. Sessions are owned by the user that
/// opened them; everyone else sees them as missing.
#[derive(Clone)]
pub struct ChatRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, Tracked>>>,
    idle_ttl: Duration,
    per_owner: usize,
}

impl Default for ChatRegistry {
    fn default() -> Self {
        Self::new(SESSION_IDLE_TTL, MAX_SESSIONS_PER_OWNER)
    }
}

impl ChatRegistry {
    pub fn new(idle_ttl: Duration, per_owner: usize) -> Self {
        Self {
            sessions: Arc::default(),
            idle_ttl,
            per_owner: per_owner.max(1),
        }
    }

    pub async fn create(
        &self,
        state: &AppState,
        owner_id: Uuid,
        class_id: Uuid,
    ) -> Result<ChatSession, AppError> {
        let class = find_class(state, class_id).await?;
        let session = ChatSession::new(class.id, owner_id, Some(class.name));

        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        self.evict_expired(&mut sessions, now);
        self.make_room(&mut sessions, owner_id)?;

        info!("Opened chat session {} for class {class_id}", session.id());
        sessions.insert(
            session.id(),
            Tracked {
                session: session.clone(),
                touched: now,
            },
        );
        Ok(session)
    }

    /// The owner's sessions, most recently used first.
    pub async fn list(&self, owner_id: Uuid) -> Vec<ChatSession> {
        let sessions = self.sessions.lock().await;
        let mut owned: Vec<&Tracked> = sessions
            .values()
            .filter(|t| t.session.owner_id() == owner_id)
            .collect();
        owned.sort_by(|a, b| b.touched.cmp(&a.touched));
        owned.into_iter().map(|t| t.session.clone()).collect()
    }

    pub async fn snapshot(&self, session_id: Uuid, owner_id: Uuid) -> Result<ChatSession, AppError> {
        let mut sessions = self.sessions.lock().await;
        Ok(owned_mut(&mut sessions, session_id, owner_id)?.clone())
    }

    pub async fn begin(
        &self,
        session_id: Uuid,
        owner_id: Uuid,
        question: &str,
    ) -> Result<PendingTurn, AppError> {
        if question.trim().is_empty() {
            return Err(AppError::Validation("Please enter a question.".to_string()));
        }

        let mut sessions = self.sessions.lock().await;
        let session = owned_mut(&mut sessions, session_id, owner_id)?;
        session.begin(question).ok_or_else(|| {
            AppError::Conflict("A question is already being answered in this chat".to_string())
        })
    }

    /// Applies the reply for `turn`. A session closed while the question was
    /// in flight drops the reply.
    pub async fn resolve(
        &self,
        session_id: Uuid,
        turn: PendingTurn,
        result: AiQueryResult,
    ) -> Result<ChatSession, AppError> {
        let mut sessions = self.sessions.lock().await;
        let Some(tracked) = sessions.get_mut(&session_id) else {
            warn!("Chat session {session_id} closed before its reply arrived");
            return Err(AppError::NotFound(SESSION_NOT_FOUND.to_string()));
        };

        tracked.touched = Instant::now();
        if tracked.session.resolve(turn, result).is_none() {
            return Err(AppError::Conflict(
                "Reply does not belong to this chat session".to_string(),
            ));
        }
        Ok(tracked.session.clone())
    }

    pub async fn clear(&self, session_id: Uuid, owner_id: Uuid) -> Result<ChatSession, AppError> {
        let mut sessions = self.sessions.lock().await;
        let session = owned_mut(&mut sessions, session_id, owner_id)?;
        if !session.clear() {
            return Err(AppError::Conflict(
                "Cannot clear the chat while a question is being answered".to_string(),
            ));
        }
        Ok(session.clone())
    }

    pub async fn remove(&self, session_id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().await;
        owned_mut(&mut sessions, session_id, owner_id)?;
        sessions.remove(&session_id);
        info!("Closed chat session {session_id}");
        Ok(())
    }

    /// Runs one full turn. The AI call and the reply run on their own task,
    /// so the session returns to `Idle` even if the caller goes away. The
    /// registry lock is not held while the AI service works.
    pub async fn ask(
        &self,
        state: &AppState,
        session_id: Uuid,
        owner_id: Uuid,
        question: &str,
    ) -> Result<ChatSession, AppError> {
        let turn = self.begin(session_id, owner_id, question).await?;

        let registry = self.clone();
        let state = state.clone();
        let task = tokio::spawn(async move {
            let result =
                match query::ask_class(&state, owner_id, turn.class_id(), turn.question()).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Chat turn in session {session_id} failed: {e}");
                        AiQueryResult::failure(format!(
                            "Failed to get AI response: {}",
                            e.user_message()
                        ))
                    }
                };
            registry.resolve(session_id, turn, result).await
        });

        task.await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("chat turn task failed: {e}")))?
    }

    /// In-flight sessions are never expired; their reply is still coming.
    fn evict_expired(&self, sessions: &mut HashMap<Uuid, Tracked>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, t| !t.is_idle() || now.duration_since(t.touched) < self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {evicted} idle chat sessions");
        }
    }

    fn make_room(&self, sessions: &mut HashMap<Uuid, Tracked>, owner_id: Uuid) -> Result<(), AppError> {
        loop {
            let owned: Vec<(Uuid, Instant, bool)> = sessions
                .iter()
                .filter(|(_, t)| t.session.owner_id() == owner_id)
                .map(|(id, t)| (*id, t.touched, t.is_idle()))
                .collect();
            if owned.len() < self.per_owner {
                return Ok(());
            }

            let oldest_idle = owned
                .into_iter()
                .filter(|(_, _, idle)| *idle)
                .min_by_key(|(_, touched, _)| *touched)
                .map(|(id, _, _)| id);
            match oldest_idle {
                Some(id) => {
                    sessions.remove(&id);
                    info!("Evicted chat session {id} to make room for owner {owner_id}");
                }
                None => {
                    return Err(AppError::Conflict(
                        "Too many chat sessions are waiting for answers".to_string(),
                    ))
                }
            }
        }
    }
}

/// Looks up a session for its owner and marks it used.
fn owned_mut(
    sessions: &mut HashMap<Uuid, Tracked>,
    session_id: Uuid,
    owner_id: Uuid,
) -> Result<&mut ChatSession, AppError> {
    let tracked = sessions
        .get_mut(&session_id)
        .filter(|t| t.session.owner_id() == owner_id)
        .ok_or_else(|| AppError::NotFound(SESSION_NOT_FOUND.to_string()))?;
    tracked.touched = Instant::now();
    Ok(&mut tracked.session)
}
