use crate::ServerConfig;
use crate::engine::{Engine, EngineConfig, EngineHandle};
use axum::{
    Json, Router,
    extract::{State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use pglet_api::{
    ClientAction, ErrorResponse, PROTOCOL_VERSION, RESERVED_SETTINGS_KEYS, RevResponse,
    ServerEvent, SettingsMap, SuccessResponse, WsClientMessage, WsServerMessage,
};
use pglet_backend::{DisabledAiSqlService, HttpAiSqlService, HttpSettingsGateway, SqliteStore};
use pglet_domain::{AiSqlService, SettingsGateway, paths};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

pub fn router(config: &ServerConfig) -> anyhow::Result<(Router, EngineHandle)> {
    let settings: Arc<dyn SettingsGateway> = match &config.settings_url {
        Some(url) => Arc::new(HttpSettingsGateway::new(url.clone())),
        None => Arc::new(SqliteStore::new(paths::sqlite_path(&config.root))?),
    };
    let ai: Arc<dyn AiSqlService> = match &config.ai_url {
        Some(url) => Arc::new(HttpAiSqlService::new(url.clone(), config.database.clone())),
        None => Arc::new(DisabledAiSqlService),
    };

    let (engine, events) = Engine::start(
        settings.clone(),
        ai,
        EngineConfig {
            save_debounce: config.save_debounce,
        },
    );

    let state = AppStateHolder {
        engine: engine.clone(),
        events,
        settings,
        ai_api_key_set: config.ai_api_key_set,
    };

    let api = Router::new()
        .route("/health", get(health))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/session", get(get_session))
        .route("/session/actions", post(post_session_action))
        .route("/events", get(ws_events))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http());
    Ok((app, engine))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppStateHolder {
    engine: EngineHandle,
    events: broadcast::Sender<WsServerMessage>,
    settings: Arc<dyn SettingsGateway>,
    ai_api_key_set: bool,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn public_settings(values: HashMap<String, String>, ai_api_key_set: bool) -> SettingsMap {
    let mut out: SettingsMap = values
        .into_iter()
        .filter(|(key, _)| !RESERVED_SETTINGS_KEYS.contains(&key.as_str()))
        .collect();
    out.insert("ai_api_key_set".to_owned(), ai_api_key_set.to_string());
    out
}

async fn get_settings(State(state): State<AppStateHolder>) -> impl IntoResponse {
    let settings = state.settings.clone();
    let loaded = tokio::task::spawn_blocking(move || settings.load_settings())
        .await
        .ok()
        .unwrap_or_else(|| Err("failed to join settings task".to_owned()));

    match loaded {
        Ok(values) => Json(public_settings(values, state.ai_api_key_set)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to load settings");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }
}

async fn put_settings(
    State(state): State<AppStateHolder>,
    Json(body): Json<SettingsMap>,
) -> impl IntoResponse {
    let values: HashMap<String, String> = body
        .into_iter()
        .filter(|(key, _)| !RESERVED_SETTINGS_KEYS.contains(&key.as_str()))
        .collect();
    if values.is_empty() {
        return Json(SuccessResponse { success: true }).into_response();
    }

    let settings = state.settings.clone();
    let saved = tokio::task::spawn_blocking(move || settings.save_settings(values))
        .await
        .ok()
        .unwrap_or_else(|| Err("failed to join settings task".to_owned()));

    match saved {
        Ok(()) => Json(SuccessResponse { success: true }).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to save settings");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }
}

async fn get_session(State(state): State<AppStateHolder>) -> impl IntoResponse {
    match state.engine.session_snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

async fn post_session_action(
    State(state): State<AppStateHolder>,
    Json(action): Json<ClientAction>,
) -> impl IntoResponse {
    match state.engine.apply_client_action(action).await {
        Ok(rev) => Json(RevResponse { rev }).into_response(),
        Err(err) => error_response(StatusCode::SERVICE_UNAVAILABLE, err),
    }
}

async fn ws_events(ws: WebSocketUpgrade, State(state): State<AppStateHolder>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_events_task(socket, state))
}

async fn ws_events_task(mut socket: axum::extract::ws::WebSocket, state: AppStateHolder) {
    let mut rx = state.events.subscribe();
    let engine = state.engine.clone();

    let current_rev = engine.current_rev().await.unwrap_or(0);
    let _ = socket
        .send(json_text(&WsServerMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            current_rev,
        }))
        .await;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let Some(Ok(msg)) = incoming else { break };
                if handle_ws_incoming(msg, &engine, &mut socket).await.is_err() {
                    break;
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Ok(outgoing) => {
                        if socket.send(json_text(&outgoing)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "events subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

fn json_text<T: serde::Serialize>(value: &T) -> axum::extract::ws::Message {
    axum::extract::ws::Message::Text(serde_json::to_string(value).unwrap_or_default().into())
}

async fn handle_ws_incoming(
    msg: axum::extract::ws::Message,
    engine: &EngineHandle,
    socket: &mut axum::extract::ws::WebSocket,
) -> anyhow::Result<()> {
    let axum::extract::ws::Message::Text(text) = msg else {
        return Ok(());
    };

    let client: WsClientMessage = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(err) => {
            let _ = socket
                .send(json_text(&WsServerMessage::Error {
                    request_id: None,
                    message: format!("invalid ws message: {err}"),
                }))
                .await;
            return Ok(());
        }
    };

    match client {
        WsClientMessage::Hello { last_seen_rev, .. } => {
            let snapshot = engine.session_snapshot().await?;
            if last_seen_rev != Some(snapshot.rev) {
                let rev = snapshot.rev;
                socket
                    .send(json_text(&WsServerMessage::Event {
                        rev,
                        event: Box::new(ServerEvent::SessionChanged {
                            snapshot: Box::new(snapshot),
                        }),
                    }))
                    .await?;
            }
            Ok(())
        }
        WsClientMessage::Ping => {
            socket.send(json_text(&WsServerMessage::Pong)).await?;
            Ok(())
        }
        WsClientMessage::Action { request_id, action } => {
            let ack = engine.apply_client_action(*action).await;
            let msg = match ack {
                Ok(rev) => WsServerMessage::Ack { request_id, rev },
                Err(message) => WsServerMessage::Error {
                    request_id: Some(request_id),
                    message,
                },
            };
            socket.send(json_text(&msg)).await?;
            Ok(())
        }
    }
}
