use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agent_core::tools::ToolExecutor;
use agent_core::{InMemoryTodoStore, Session, SqliteStorage, Storage, TodoStore};
use agent_llm::{LLMProvider, OpenAIProvider};
use agent_loop::AgentLoopConfig;
use agent_mcp::{CompositeToolExecutor, McpConfig, McpServerManager, McpToolExecutor};
use agent_tools::{BuiltinToolExecutor, WeatherTool};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::{Settings, TodoBackend};
use crate::error::{ApiError, StartupError};

struct ActiveTurn {
    turn_id: u64,
    token: CancellationToken,
}

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub llm: Arc<dyn LLMProvider>,
    pub tools: Arc<dyn ToolExecutor>,
    pub mcp_manager: Arc<McpServerManager>,
    pub loop_config: AgentLoopConfig,
    active_turns: DashMap<String, ActiveTurn>,
    session_locks: DashMap<String, Arc<Mutex<()>>>,
    next_turn_id: AtomicU64,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        llm: Arc<dyn LLMProvider>,
        tools: Arc<dyn ToolExecutor>,
        mcp_manager: Arc<McpServerManager>,
        loop_config: AgentLoopConfig,
    ) -> Self {
        let loop_config = loop_config.with_storage(Arc::clone(&storage));
        Self {
            storage,
            llm,
            tools,
            mcp_manager,
            loop_config,
            active_turns: DashMap::new(),
            session_locks: DashMap::new(),
            next_turn_id: AtomicU64::new(1),
        }
    }

    /// Wire up storage, model backend and the merged tool catalog.
    pub async fn from_settings(settings: &Settings) -> Result<Self, StartupError> {
        log::info!("Opening database at {}", settings.database_url);
        let database = Arc::new(SqliteStorage::new(&settings.database_url));
        database
            .init()
            .await
            .map_err(|source| StartupError::Database {
                path: settings.database_url.clone(),
                source,
            })?;

        let api_key = settings.openrouter_api_key.clone().unwrap_or_else(|| {
            log::warn!("OPENROUTER_API_KEY is not set; model calls will fail");
            String::new()
        });
        log::info!(
            "Model backend: {} at {}",
            settings.model_name,
            settings.llm_base_url
        );
        let llm: Arc<dyn LLMProvider> = Arc::new(
            OpenAIProvider::new(api_key)
                .with_base_url(&settings.llm_base_url)
                .with_model(&settings.model_name)
                .with_temperature(settings.model_temperature)
                .with_max_tokens(settings.model_max_tokens),
        );

        let todo_store: Arc<dyn TodoStore> = match settings.todo_backend {
            TodoBackend::Memory => Arc::new(InMemoryTodoStore::new()),
            TodoBackend::Durable => database.clone(),
        };
        log::info!("TODO backend: {:?}", settings.todo_backend);

        let weather = WeatherTool::new(settings.weather_api_key.clone())
            .with_base_url(&settings.weather_base_url);
        let builtin_tools: Arc<dyn ToolExecutor> =
            Arc::new(BuiltinToolExecutor::new(todo_store, weather));

        let mcp_manager = Arc::new(McpServerManager::new());
        let mcp_config = McpConfig::load_or_default(&settings.mcp_config_path);
        let report = mcp_manager.initialize_from_config(&mcp_config).await;
        for server in &report.connected {
            log::info!(
                "External tool server '{}' ready with {} tools",
                server.name,
                server.tool_count
            );
        }
        for server in &report.failed {
            log::error!(
                "External tool server '{}' skipped: {}",
                server.name,
                server.reason
            );
        }

        let mcp_tools: Arc<dyn ToolExecutor> =
            Arc::new(McpToolExecutor::new(Arc::clone(&mcp_manager)));
        let tools: Arc<dyn ToolExecutor> =
            Arc::new(CompositeToolExecutor::new(builtin_tools, mcp_tools));
        log::info!("Serving {} tools", tools.list_tools().len());

        let storage: Arc<dyn Storage> = database;
        Ok(Self::new(
            storage,
            llm,
            tools,
            mcp_manager,
            settings.loop_config(),
        ))
    }

    /// Stored history for `session_id`, or a fresh session.
    pub async fn load_or_create_session(&self, session_id: &str) -> Result<Session, ApiError> {
        Ok(self
            .storage
            .load_session(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id)))
    }

    /// Wait until no other turn runs on `session_id`.
    ///
    /// The lock entry is dropped from the map once the last holder releases it.
    pub async fn lock_session(self: &Arc<Self>, session_id: &str) -> SessionLock {
        let lock = self
            .session_locks
            .entry(session_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;

        SessionLock {
            state: Arc::clone(self),
            session_id: session_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of sessions with a live lock entry.
    pub fn locked_sessions(&self) -> usize {
        self.session_locks.len()
    }

    /// Register the running turn of `session_id` so it can be stopped.
    ///
    /// The registration is removed when the returned handle drops.
    pub fn begin_turn(self: &Arc<Self>, session_id: &str) -> TurnHandle {
        let turn_id = self.next_turn_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.active_turns.insert(
            session_id.to_string(),
            ActiveTurn {
                turn_id,
                token: token.clone(),
            },
        );

        TurnHandle {
            state: Arc::clone(self),
            session_id: session_id.to_string(),
            turn_id,
            token,
        }
    }

    /// Cancel the in-flight turn of `session_id`, if any.
    pub fn cancel_turn(&self, session_id: &str) -> bool {
        match self.active_turns.get(session_id) {
            Some(turn) => {
                turn.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_turn_active(&self, session_id: &str) -> bool {
        self.active_turns.contains_key(session_id)
    }

    /// Drop the session's lock entry unless a turn still holds or awaits it.
    pub fn forget_session(&self, session_id: &str) {
        self.session_locks
            .remove_if(session_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub async fn shutdown(&self) {
        log::info!("Shutting down external tool servers...");
        self.mcp_manager.shutdown_all().await;
        log::info!("External tool servers shut down");
    }
}

/// Registration of one running turn.
pub struct TurnHandle {
    state: Arc<AppState>,
    session_id: String,
    turn_id: u64,
    token: CancellationToken,
}

impl TurnHandle {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for TurnHandle {
    fn drop(&mut self) {
        let turn_id = self.turn_id;
        self.state
            .active_turns
            .remove_if(&self.session_id, |_, turn| turn.turn_id == turn_id);
    }
}

/// Exclusive access to one session for the duration of a turn or reset.
pub struct SessionLock {
    state: Arc<AppState>,
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.guard.take();
        self.state.forget_session(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::MemoryStorage;
    use agent_llm::MockLLMProvider;

    fn state() -> Arc<AppState> {
        let tools: Arc<dyn ToolExecutor> = Arc::new(BuiltinToolExecutor::new(
            Arc::new(InMemoryTodoStore::new()),
            WeatherTool::new(None),
        ));
        Arc::new(AppState::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MockLLMProvider::new(Vec::new())),
            tools,
            Arc::new(McpServerManager::new()),
            AgentLoopConfig::default(),
        ))
    }

    #[test]
    fn loop_config_checkpoints_to_state_storage() {
        assert!(state().loop_config.storage.is_some());
    }

    #[test]
    fn turn_registration_follows_handle() {
        let state = state();
        assert!(!state.cancel_turn("s1"));

        let handle = state.begin_turn("s1");
        assert!(state.is_turn_active("s1"));
        assert!(state.cancel_turn("s1"));
        assert!(handle.token().is_cancelled());

        drop(handle);
        assert!(!state.is_turn_active("s1"));
    }

    #[test]
    fn stale_handle_keeps_newer_registration() {
        let state = state();
        let first = state.begin_turn("s1");
        let second = state.begin_turn("s1");

        drop(first);
        assert!(state.is_turn_active("s1"));
        drop(second);
        assert!(!state.is_turn_active("s1"));
    }

    #[tokio::test]
    async fn session_lock_serialises_turns() {
        let state = state();
        let guard = state.lock_session("s1").await;

        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let _guard = state.lock_session("s1").await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(state.locked_sessions(), 1);
        waiter.await.unwrap();
        assert_eq!(state.locked_sessions(), 0);
    }

    #[tokio::test]
    async fn released_lock_leaves_no_entry_behind() {
        let state = state();
        for index in 0..10 {
            let _guard = state.lock_session(&format!("session-{index}")).await;
        }
        assert_eq!(state.locked_sessions(), 0);
    }
}
