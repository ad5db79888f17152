//! # HTTP Server Module
//!
//! REST surface shared by the web and mobile clients: snapshot sync,
//! inventory/recipe/task actions and the two chat endpoints.
//!
//! The snapshot lives behind one mutex. Every handler does its state work
//! inside a single lock scope and releases it before awaiting anything;
//! the chat endpoints copy the context they need out of the lock first.
//! Snapshot writes happen after the lock is released, on the blocking pool,
//! one at a time and never older over newer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info, warn};

use crate::assistant::{build_system_prompt, try_execute_command, PromptKind};
use crate::chat_client::{ChatError, CompletionService};
use crate::config::ServerConfig;
use crate::inventory::{merge_item, remove_items, update_item, InventoryItem, InventoryPatch};
use crate::localization::{t_args_lang, t_lang};
use crate::recipes::{save_recipe, Recipe, RecipeIngredient};
use crate::state::{AppData, STORAGE_KEY};
use crate::storage::BlobStore;
use crate::tasks::{CompletionEffect, NewTask, TaskError, Transition};

const SERVICE_NAME: &str = "ChefCode Backend";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Completion length for `/api/chatgpt`
const CLASSIC_MAX_TOKENS: u32 = 200;

const ENDPOINTS: &[&str] = &[
    "GET /health",
    "GET /api/data",
    "POST /api/sync-data",
    "POST /api/action",
    "POST /api/chatgpt-smart",
    "POST /api/chatgpt",
];

#[derive(Clone)]
pub struct AppState {
    data: Arc<Mutex<AppData>>,
    store: Arc<dyn BlobStore>,
    chat: Arc<dyn CompletionService>,
    config: Arc<ServerConfig>,
    started: Instant,
    /// Revision of the latest mutation, bumped under the data lock
    revision: Arc<AtomicU64>,
    /// Revision of the latest snapshot written to the store
    written: Arc<tokio::sync::Mutex<u64>>,
}

/// Serialized snapshot waiting to be written
struct PendingWrite {
    revision: u64,
    json: String,
}

impl AppState {
    pub fn new(
        data: AppData,
        store: Arc<dyn BlobStore>,
        chat: Arc<dyn CompletionService>,
        config: ServerConfig,
    ) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            store,
            chat,
            config: Arc::new(config),
            started: Instant::now(),
            revision: Arc::new(AtomicU64::new(0)),
            written: Arc::new(tokio::sync::Mutex::new(0)),
        }
    }

    fn lock_data(&self) -> MutexGuard<'_, AppData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn language(&self) -> &str {
        &self.config.language
    }

    /// Serialize the snapshot; call with the data lock held so revisions follow mutation order
    fn prepare_write(&self, data: &AppData) -> Option<PendingWrite> {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        match data.to_json() {
            Ok(json) => Some(PendingWrite { revision, json }),
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to serialize snapshot");
                None
            }
        }
    }

    /// Write the snapshot through; the in-memory copy stays authoritative if this fails
    async fn persist(&self, pending: Option<PendingWrite>) {
        let Some(PendingWrite { revision, json }) = pending else {
            return;
        };

        let mut written = self.written.lock().await;
        if revision <= *written {
            debug!(revision, written = *written, "Skipping stale snapshot write");
            return;
        }

        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.save(STORAGE_KEY, &json)).await {
            Ok(Ok(())) => *written = revision,
            Ok(Err(e)) => error!(error = %format!("{e:#}"), "Failed to persist snapshot"),
            Err(e) => error!(error = %e, "Snapshot write task failed"),
        }
    }

    /// Run `apply` under the lock, persist on success and return a copy of the new snapshot
    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut AppData) -> Result<T, ApiError>,
    ) -> Result<(T, AppData), ApiError> {
        let (value, snapshot, pending) = {
            let mut data = self.lock_data();
            let value = apply(&mut data)?;
            (value, data.clone(), self.prepare_write(&data))
        };
        self.persist(pending).await;
        Ok((value, snapshot))
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct ActionRequest {
    action: String,
    #[serde(default)]
    data: Value,
}

#[derive(Serialize)]
struct ActionResponse {
    success: bool,
    data: AppData,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Deserialize)]
struct NamedItem {
    name: String,
}

#[derive(Deserialize)]
struct SaveRecipeRequest {
    name: String,
    #[serde(default)]
    items: Vec<RecipeIngredient>,
}

#[derive(Deserialize)]
struct TaskRef {
    id: u64,
}

#[derive(Deserialize)]
struct PromptRequest {
    #[serde(default)]
    prompt: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Reply in the chat-completion envelope the clients already parse
#[derive(Serialize)]
struct ChatReply {
    choices: Vec<ChatChoice>,
    #[serde(rename = "syncData", skip_serializing_if = "Option::is_none")]
    sync_data: Option<AppData>,
}

impl ChatReply {
    fn new(content: String) -> Self {
        Self {
            choices: vec![ChatChoice {
                message: ChatMessage {
                    role: "assistant",
                    content,
                },
            }],
            sync_data: None,
        }
    }

    fn with_sync_data(mut self, data: AppData) -> Self {
        self.sync_data = Some(data);
        self
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl ApiError {
    fn from_chat(err: ChatError, lang: &str) -> Self {
        match err {
            ChatError::Api(message) => Self::BadRequest(message),
            ChatError::CircuitOpen => Self::Unavailable(t_lang("chat-unavailable", lang)),
            other => Self::Upstream(other.to_string()),
        }
    }

    fn from_task(err: TaskError, lang: &str) -> Self {
        let message = t_lang(err.message_key(), lang);
        match err {
            TaskError::NotFound(_) => Self::NotFound(message),
            _ => Self::BadRequest(message),
        }
    }
}

// --- Handlers ---

async fn api_info() -> Json<Value> {
    Json(json!({
        "name": SERVICE_NAME,
        "version": VERSION,
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "ai_ready": true,
        "endpoints": ENDPOINTS,
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
        "uptime": state.started.elapsed().as_secs_f64(),
    }))
}

async fn get_data(State(state): State<AppState>) -> Json<AppData> {
    Json(state.lock_data().clone())
}

async fn sync_data(
    State(state): State<AppState>,
    Json(snapshot): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let incoming = AppData::from_value(snapshot);
    info!(
        inventory = incoming.inventory.len(),
        recipes = incoming.recipes.len(),
        tasks = incoming.board.tasks.len(),
        "Snapshot synchronized"
    );
    state
        .mutate(|data| {
            *data = incoming;
            Ok(())
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}

async fn perform_action(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let lang = state.language();
    info!(action = %request.action, "Action requested");

    let (message, data) = state
        .mutate(|data| apply_action(data, &request.action, request.data, lang))
        .await?;

    Ok(Json(ActionResponse {
        success: true,
        data,
        message,
    }))
}

fn apply_action(
    data: &mut AppData,
    action: &str,
    payload: Value,
    lang: &str,
) -> Result<Option<String>, ApiError> {
    let AppData {
        inventory,
        recipes,
        board,
    } = data;

    match action {
        "add-inventory" => {
            let item: InventoryItem = decode_payload(action, payload, lang)?;
            if item.name.trim().is_empty() {
                return Err(invalid_data(action, "name is required", lang));
            }
            let outcome = merge_item(inventory, item);
            debug!(?outcome, "Inventory item reconciled");
            Ok(None)
        }
        "update-inventory" => {
            let patch: InventoryPatch = decode_payload(action, payload, lang)?;
            let name = patch.name.clone();
            if update_item(inventory, patch) {
                Ok(Some(t_lang("inventory-updated", lang)))
            } else {
                Err(ApiError::NotFound(t_args_lang(
                    "inventory-item-not-found",
                    &[("name", name.as_str())],
                    lang,
                )))
            }
        }
        "remove-inventory" => {
            let target: NamedItem = decode_payload(action, payload, lang)?;
            let count = remove_items(inventory, &target.name).to_string();
            Ok(Some(t_args_lang(
                "inventory-removed",
                &[("count", count.as_str())],
                lang,
            )))
        }
        "save-recipe" => {
            let request: SaveRecipeRequest = decode_payload(action, payload, lang)?;
            let name = save_recipe(recipes, &request.name, Recipe::new(request.items)).map_err(
                |e| {
                    ApiError::BadRequest(t_args_lang(
                        "recipe-invalid",
                        &[("reason", e.to_string().as_str())],
                        lang,
                    ))
                },
            )?;
            Ok(Some(t_args_lang(
                "recipe-saved",
                &[("recipe", name.as_str())],
                lang,
            )))
        }
        "add-task" => {
            let new_task: NewTask = decode_payload(action, payload, lang)?;
            let created = board
                .create(new_task, inventory, recipes)
                .map_err(|e| ApiError::from_task(e, lang))?;
            let id = created.task.id.to_string();
            let message = t_args_lang("task-created", &[("id", id.as_str())], lang);
            Ok(Some(with_effect(message, &created, lang)))
        }
        "advance-task" | "complete-task" => {
            let TaskRef { id } = decode_payload(action, payload, lang)?;
            let transition = if action == "advance-task" {
                board.advance(id, inventory, recipes)
            } else {
                board.complete(id, inventory, recipes)
            }
            .map_err(|e| ApiError::from_task(e, lang))?;
            Ok(Some(transition_message(&transition, lang)))
        }
        other => {
            warn!(action = %other, "Unknown action");
            Err(ApiError::BadRequest(t_lang("action-unknown", lang)))
        }
    }
}

fn decode_payload<T: DeserializeOwned>(
    action: &str,
    payload: Value,
    lang: &str,
) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| invalid_data(action, &e.to_string(), lang))
}

fn invalid_data(action: &str, reason: &str, lang: &str) -> ApiError {
    ApiError::BadRequest(t_args_lang(
        "action-invalid-data",
        &[("action", action), ("reason", reason)],
        lang,
    ))
}

fn transition_message(transition: &Transition, lang: &str) -> String {
    let id = transition.task.id.to_string();
    let status = transition.task.status.to_string();
    let message = t_args_lang(
        "task-moved",
        &[("id", id.as_str()), ("status", status.as_str())],
        lang,
    );
    with_effect(message, transition, lang)
}

/// Append what the transition did (or failed to do) to the inventory
fn with_effect(message: String, transition: &Transition, lang: &str) -> String {
    let note = match &transition.effect {
        CompletionEffect::Consumed(report) if !report.is_complete() => {
            let skipped = report.skipped.join(", ");
            Some(t_args_lang(
                "ingredients-skipped",
                &[("skipped", skipped.as_str())],
                lang,
            ))
        }
        CompletionEffect::RecipeMissing(_) => Some(t_args_lang(
            "recipe-not-found",
            &[("recipe", transition.task.recipe.as_str())],
            lang,
        )),
        _ => None,
    };
    match note {
        Some(note) => format!("{message}. {note}"),
        None => message,
    }
}

enum SmartStep {
    /// A local command answered; carries the snapshot write if it changed state
    Answered(ChatReply, Option<PendingWrite>),
    AskModel(String),
}

async fn chat_smart(
    State(state): State<AppState>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let lang = state.language();
    let prompt = require_prompt(&request, lang)?;
    info!(prompt, "Smart chat request");

    // Either the command's reply or the system prompt for the model, decided under one lock
    let step = {
        let mut data = state.lock_data();
        match try_execute_command(prompt, &mut data, lang) {
            Some(reply) if reply.changed => SmartStep::Answered(
                ChatReply::new(reply.response).with_sync_data(data.clone()),
                state.prepare_write(&data),
            ),
            Some(reply) => SmartStep::Answered(ChatReply::new(reply.response), None),
            None => SmartStep::AskModel(build_system_prompt(&data, PromptKind::Smart)),
        }
    };
    let system = match step {
        SmartStep::Answered(response, pending) => {
            state.persist(pending).await;
            return Ok(Json(response));
        }
        SmartStep::AskModel(system) => system,
    };

    let content = state
        .chat
        .complete(&system, prompt, None)
        .await
        .map_err(|e| ApiError::from_chat(e, lang))?;
    Ok(Json(ChatReply::new(content)))
}

async fn chat_classic(
    State(state): State<AppState>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let lang = state.language();
    let prompt = require_prompt(&request, lang)?;
    info!(prompt, "Chat request");

    let system = build_system_prompt(&state.lock_data(), PromptKind::Classic);
    let content = state
        .chat
        .complete(&system, prompt, Some(CLASSIC_MAX_TOKENS))
        .await
        .map_err(|e| ApiError::from_chat(e, lang))?;
    Ok(Json(ChatReply::new(content)))
}

fn require_prompt<'a>(request: &'a PromptRequest, lang: &str) -> Result<&'a str, ApiError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest(t_lang("prompt-missing", lang)));
    }
    Ok(prompt)
}

// --- Router ---

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let allowed: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600))
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_payload_bytes();
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(api_info))
        .route("/health", get(health))
        .route("/api/data", get(get_data))
        .route("/api/sync-data", post(sync_data))
        .route("/api/action", post(perform_action))
        .route("/api/chatgpt-smart", post(chat_smart))
        .route("/api/chatgpt", post(chat_classic))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.bind_address, state.config.port);
    let environment = state.config.environment.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, environment = %environment, "ChefCode backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Records every call and answers with a fixed result
    struct StubChat {
        reply: Result<String, ChatError>,
        calls: Mutex<Vec<(String, String, Option<u32>)>>,
    }

    impl StubChat {
        fn new(reply: Result<String, ChatError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String, Option<u32>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for StubChat {
        async fn complete(
            &self,
            system: &str,
            prompt: &str,
            max_tokens: Option<u32>,
        ) -> Result<String, ChatError> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string(), max_tokens));
            self.reply.clone()
        }
    }

    struct TestApp {
        router: Router,
        store: Arc<MemoryStore>,
        chat: Arc<StubChat>,
    }

    fn test_app_with(reply: Result<String, ChatError>) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let chat = StubChat::new(reply);
        let state = AppState::new(
            AppData::default(),
            store.clone(),
            chat.clone(),
            ServerConfig::with_api_key("sk-test"),
        );
        TestApp {
            router: build_router(state),
            store,
            chat,
        }
    }

    fn test_app() -> TestApp {
        test_app_with(Ok("Risposta del modello".to_string()))
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn action(router: &Router, action: &str, data: Value) -> (StatusCode, Value) {
        send(
            router,
            "POST",
            "/api/action",
            Some(json!({ "action": action, "data": data })),
        )
        .await
    }

    #[tokio::test]
    async fn info_and_health() {
        let app = test_app();

        let (status, json) = send(&app.router, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "ChefCode Backend");
        assert_eq!(json["status"], "ok");

        let (status, json) = send(&app.router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["environment"], "development");
    }

    #[tokio::test]
    async fn add_inventory_merges_and_persists() {
        let app = test_app();

        let item = json!({"name": "Farina", "quantity": 2, "unit": "kg", "price": 1.5});
        action(&app.router, "add-inventory", item).await;
        let (status, json) = action(
            &app.router,
            "add-inventory",
            json!({"name": "farina", "quantity": 500, "unit": "g", "price": "1,50"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        let inventory = json["data"]["inventory"].as_array().unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0]["quantity"], 2.5);

        let saved = AppData::load(app.store.as_ref()).unwrap();
        assert_eq!(saved.inventory[0].quantity, 2.5);
    }

    #[tokio::test]
    async fn stale_snapshot_never_overwrites_newer_one() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            AppData::default(),
            store.clone(),
            StubChat::new(Ok(String::new())),
            ServerConfig::with_api_key("sk-test"),
        );

        let mut older = AppData::default();
        older.inventory.push(InventoryItem::new("Riso", 1.0, "kg"));
        let mut newer = older.clone();
        newer.inventory[0].quantity = 2.0;

        let first = state.prepare_write(&older);
        let second = state.prepare_write(&newer);
        state.persist(second).await;
        state.persist(first).await;

        assert_eq!(AppData::load(store.as_ref()).unwrap(), newer);
    }

    #[tokio::test]
    async fn concurrent_actions_persist_final_snapshot() {
        let app = test_app();
        let mut requests = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let router = app.router.clone();
            requests.spawn(async move {
                action(
                    &router,
                    "add-inventory",
                    json!({"name": "Sale", "quantity": 1, "unit": "kg"}),
                )
                .await
            });
        }
        while let Some(joined) = requests.join_next().await {
            let (status, _) = joined.unwrap();
            assert_eq!(status, StatusCode::OK);
        }

        let saved = AppData::load(app.store.as_ref()).unwrap();
        assert_eq!(saved.inventory.len(), 1);
        assert_eq!(saved.inventory[0].quantity, 8.0);
    }

    #[tokio::test]
    async fn update_and_remove_inventory() {
        let app = test_app();
        action(
            &app.router,
            "add-inventory",
            json!({"name": "Latte", "quantity": 1, "unit": "lt"}),
        )
        .await;

        let (status, json) = action(
            &app.router,
            "update-inventory",
            json!({"name": "Latte", "quantity": 4}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["inventory"][0]["quantity"], 4.0);

        let (status, json) = action(
            &app.router,
            "update-inventory",
            json!({"name": "Latte", "quantity": "6", "price": "1,2"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["inventory"][0]["quantity"], 6.0);
        assert_eq!(json["data"]["inventory"][0]["price"], 1.2);

        let (status, json) = action(&app.router, "update-inventory", json!({"name": "Panna"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Ingrediente non trovato: Panna");

        let (status, json) = action(&app.router, "remove-inventory", json!({"name": "Latte"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Rimossi 1 articoli dall'inventario");
        assert!(json["data"]["inventory"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let app = test_app();
        let (status, json) = action(&app.router, "delete-everything", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Azione non riconosciuta");
    }

    #[tokio::test]
    async fn add_inventory_requires_a_name() {
        let app = test_app();
        let (status, json) = action(&app.router, "add-inventory", json!({"quantity": 1})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("add-inventory"));
    }

    #[tokio::test]
    async fn task_workflow_deducts_once() {
        let app = test_app();
        action(
            &app.router,
            "add-inventory",
            json!({"name": "Farina", "quantity": 10, "unit": "kg"}),
        )
        .await;
        let (status, _) = action(
            &app.router,
            "save-recipe",
            json!({"name": "Pane", "items": [
                {"name": "Farina", "qty": 500, "unit": "g"},
                {"name": "Lievito", "qty": 10, "unit": "g"}
            ]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = action(
            &app.router,
            "add-task",
            json!({"recipe": "Pane", "quantity": 4, "assignedTo": "Luca", "status": "todo"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Task 1 creato");
        assert_eq!(json["data"]["nextTaskId"], 2);

        action(&app.router, "advance-task", json!({"id": 1})).await;
        let (status, json) = action(&app.router, "advance-task", json!({"id": 1})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["tasks"][0]["status"], "completed");
        assert_eq!(json["data"]["inventory"][0]["quantity"], 8.0);
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("Lievito (not in inventory)"));

        let (status, json) = action(&app.router, "complete-task", json!({"id": 1})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Il task è già completato");

        let (_, json) = send(&app.router, "GET", "/api/data", None).await;
        assert_eq!(json["inventory"][0]["quantity"], 8.0);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let app = test_app();
        let (status, json) = action(&app.router, "complete-task", json!({"id": 99})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Task non trovato");
    }

    #[tokio::test]
    async fn invalid_recipe_is_rejected() {
        let app = test_app();
        let (status, json) = action(
            &app.router,
            "save-recipe",
            json!({"name": "Vuota", "items": []}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Ricetta non valida"));
    }

    #[tokio::test]
    async fn sync_data_replaces_snapshot() {
        let app = test_app();
        let (status, json) = send(
            &app.router,
            "POST",
            "/api/sync-data",
            Some(json!({
                "inventory": [{"name": "Uova", "quantity": "12", "unit": "pz"}],
                "recipes": {},
                "tasks": [{"id": 5, "recipe": "Frittata", "quantity": 1, "status": "todo"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let (_, json) = send(&app.router, "GET", "/api/data", None).await;
        assert_eq!(json["inventory"][0]["quantity"], 12.0);
        assert_eq!(json["nextTaskId"], 6);
        assert!(app.store.load(crate::state::STORAGE_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn smart_chat_executes_commands_locally() {
        let app = test_app();
        let (status, json) = send(
            &app.router,
            "POST",
            "/api/chatgpt-smart",
            Some(json!({"prompt": "Aggiungi 2 kg di pasta a 3€"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["choices"][0]["message"]["content"],
            "✅ Ho aggiunto 2 kg di pasta all'inventario al prezzo di €3!"
        );
        assert_eq!(json["syncData"]["inventory"][0]["name"], "pasta");
        assert!(app.chat.calls().is_empty());
    }

    #[tokio::test]
    async fn smart_chat_question_has_no_sync_data() {
        let app = test_app();
        let (_, json) = send(
            &app.router,
            "POST",
            "/api/chatgpt-smart",
            Some(json!({"prompt": "cosa posso cucinare?"})),
        )
        .await;
        assert!(json.get("syncData").is_none());
        assert!(app.chat.calls().is_empty());
    }

    #[tokio::test]
    async fn smart_chat_falls_back_to_model() {
        let app = test_app();
        let (status, json) = send(
            &app.router,
            "POST",
            "/api/chatgpt-smart",
            Some(json!({"prompt": "Quanto costa un risotto?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["choices"][0]["message"]["content"], "Risposta del modello");
        let calls = app.chat.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("Inventario vuoto"));
        assert_eq!(calls[0].1, "Quanto costa un risotto?");
        assert_eq!(calls[0].2, None);
    }

    #[tokio::test]
    async fn classic_chat_always_uses_model() {
        let app = test_app();
        send(
            &app.router,
            "POST",
            "/api/chatgpt",
            Some(json!({"prompt": "aggiungi 2 kg di pasta"})),
        )
        .await;
        let calls = app.chat.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("COMANDI SPECIALI"));
        assert_eq!(calls[0].2, Some(CLASSIC_MAX_TOKENS));
    }

    #[tokio::test]
    async fn chat_errors_map_to_status_codes() {
        let app = test_app_with(Err(ChatError::Api("Invalid API key".to_string())));
        let (status, json) = send(
            &app.router,
            "POST",
            "/api/chatgpt",
            Some(json!({"prompt": "ciao"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid API key");

        let app = test_app_with(Err(ChatError::CircuitOpen));
        let (status, _) = send(
            &app.router,
            "POST",
            "/api/chatgpt",
            Some(json!({"prompt": "ciao"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let app = test_app_with(Err(ChatError::Timeout));
        let (status, _) = send(
            &app.router,
            "POST",
            "/api/chatgpt-smart",
            Some(json!({"prompt": "ciao"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let app = test_app();
        let (status, json) = send(
            &app.router,
            "POST",
            "/api/chatgpt-smart",
            Some(json!({"prompt": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Scrivi una domanda o un comando.");
    }
}
