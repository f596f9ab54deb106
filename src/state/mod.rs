use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};

use crate::core::config::Settings;
use crate::history::ConversationStore;
use crate::llm::{Embedder, GeminiClient, Generator};
use crate::rag::{ChromaStore, ContextAssembler, DocumentStore, RetryPolicy};
use crate::server::middleware::IpRateLimiter;

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes and background
/// tasks. The assembler is a pure value; everything else sits behind
/// its own synchronization.
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn DocumentStore>,
    pub generator: Arc<dyn Generator>,
    pub embedder: Arc<dyn Embedder>,
    pub assembler: ContextAssembler,
    pub conversations: ConversationStore,
    pub limiter: IpRateLimiter,
}

impl AppState {
    /// Wires settings into clients and stores:
    /// 1. Gemini client (generator and embedder)
    /// 2. Chroma store, with the bounded connect retry
    /// 3. SQLite conversation store plus its TTL sweeper
    pub async fn initialize(settings: Settings) -> Result<Arc<Self>, InitializationError> {
        let gemini = Arc::new(
            GeminiClient::new(&settings.gemini).map_err(|e| InitializationError::Llm(e.into()))?,
        );
        let embedder: Arc<dyn Embedder> = gemini.clone();
        let generator: Arc<dyn Generator> = gemini;

        let retry = RetryPolicy::new(
            settings.chroma.connect_max_attempts,
            Duration::from_secs(settings.chroma.connect_retry_delay_secs),
        );
        let store = Arc::new(
            ChromaStore::connect(&settings.chroma, embedder.clone(), retry)
                .await
                .map_err(|e| InitializationError::Store(e.into()))?,
        );

        let conversations = ConversationStore::new(
            &settings.conversations.db_path,
            Duration::from_secs(settings.conversations.ttl_secs),
        )
        .await
        .map_err(|e| InitializationError::Conversations(e.into()))?;
        conversations.spawn_sweeper(Duration::from_secs(settings.conversations.sweep_interval_secs));

        let assembler = ContextAssembler::new(
            settings.rag.distance_threshold,
            settings.rag.preview_length,
        );

        let per_minute = NonZeroU32::new(settings.app.rate_limit_per_minute.max(1))
            .unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::keyed(Quota::per_minute(per_minute));

        Ok(Arc::new(AppState {
            settings,
            store,
            generator,
            embedder,
            assembler,
            conversations,
            limiter,
        }))
    }
}
