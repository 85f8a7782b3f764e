//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a reader's WebSocket connection.
//! Client messages are mapped onto the feed controller, the identity session and the
//! panel view-model; feed events flow back to the client as snapshots and scroll commands.

use crate::{
    adapters::{PickerAnswer, PickerPrompt},
    web::{
        protocol::{ClientMessage, ServerMessage},
        state::{AppState, ReaderState},
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use book_reels_core::{FeedEvent, SurfaceCommand, ValidationError};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc, Mutex};
use tracing::{debug, error, info, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New reader connection established.");

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Reader State and Background Tasks ---
    let (reader, prompts) = ReaderState::new(&app_state);
    let reader = Arc::new(reader);

    let events = reader.feed.subscribe();
    let follow_task = reader.feed.follow(reader.session.changes()).await;
    let events_task = tokio::spawn(forward_feed_events(reader.clone(), events, ws_sender.clone()));
    let prompts_task = tokio::spawn(forward_picker_prompts(reader.clone(), prompts, ws_sender.clone()));

    if !send_snapshot(&reader, &ws_sender).await {
        error!("Failed to send the initial snapshot.");
    }

    // --- 2. Main Message Loop ---
    loop {
        if let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text_message(text.as_str(), &reader, &ws_sender).await;
                }
                Message::Close(_) => {
                    info!("Client sent close message.");
                    break;
                }
                _ => {}
            }
        } else {
            info!("Client disconnected.");
            break;
        }
    }

    // --- 3. Cleanup ---
    reader.cancellation_token.cancel();
    reader.provider.close();
    follow_task.abort();
    events_task.abort();
    prompts_task.abort();
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(text: &str, reader: &Arc<ReaderState>, ws_sender: &WsSender) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            send_message(ws_sender, &ServerMessage::Error {
                message: format!("Unrecognised message: {}", e),
            })
            .await;
            return;
        }
    };

    // Navigation and flag changes come back to the client through the feed events.
    match client_msg {
        ClientMessage::Wheel { delta_y } => {
            reader.feed.on_wheel(delta_y).await;
        }
        ClientMessage::TouchStart { y } => reader.feed.touch_start(y).await,
        ClientMessage::TouchEnd { y } => {
            reader.feed.touch_end(y).await;
        }
        ClientMessage::Next => {
            reader.feed.next().await;
        }
        ClientMessage::Previous => {
            reader.feed.previous().await;
        }
        ClientMessage::JumpTo { index } => {
            reader.feed.jump_to(index).await;
        }
        ClientMessage::ToggleLike { id } => {
            reader.feed.toggle_like(id).await;
        }
        ClientMessage::ToggleBookmark { id } => {
            reader.feed.toggle_bookmark(id).await;
        }
        ClientMessage::Share { id } => apply_surface(reader, ws_sender, SurfaceCommand::Share(id)).await,
        ClientMessage::OpenAddForm => apply_surface(reader, ws_sender, SurfaceCommand::OpenAddForm).await,
        ClientMessage::CloseAddForm => apply_surface(reader, ws_sender, SurfaceCommand::CloseAddForm).await,
        ClientMessage::EditDraft { field, value } => {
            apply_surface(reader, ws_sender, SurfaceCommand::EditDraft(field, value)).await
        }
        ClientMessage::OpenProfile => apply_surface(reader, ws_sender, SurfaceCommand::OpenProfile).await,
        ClientMessage::CloseProfile => apply_surface(reader, ws_sender, SurfaceCommand::CloseProfile).await,
        ClientMessage::SubmitPassage => {
            let result = {
                let mut surface = reader.surface.lock().await;
                surface.submit(&reader.feed).await
            };
            match result {
                Ok(passage) => {
                    info!("Reader submitted passage {}", passage.id);
                    send_snapshot(reader, ws_sender).await;
                }
                Err(e) => {
                    let message = e.to_string();
                    let ValidationError::MissingFields(missing) = e;
                    send_message(ws_sender, &ServerMessage::ValidationFailed { message, missing }).await;
                }
            }
        }
        ClientMessage::SignIn => {
            // The picker answer arrives through this same loop, so the flow runs on its own task.
            let reader = reader.clone();
            let ws_sender = ws_sender.clone();
            tokio::spawn(async move {
                if let Err(e) = reader.session.sign_in().await {
                    warn!("Sign-in failed: {}", e);
                    send_message(&ws_sender, &ServerMessage::AuthFailed { message: e.to_string() }).await;
                }
            });
        }
        ClientMessage::SignOut => {
            if let Err(e) = reader.session.sign_out().await {
                error!("Sign-out failed: {}", e);
            }
        }
        ClientMessage::AccountChosen { email, password } => {
            if !reader.provider.answer(PickerAnswer::Chosen { email, password }) {
                send_message(ws_sender, &ServerMessage::Error {
                    message: "No sign-in is waiting for an account.".to_string(),
                })
                .await;
            }
        }
        ClientMessage::PickerCancelled => {
            if !reader.provider.answer(PickerAnswer::Cancelled) {
                debug!("Picker cancelled with no sign-in waiting.");
            }
        }
    }
}

async fn apply_surface(reader: &Arc<ReaderState>, ws_sender: &WsSender, command: SurfaceCommand) {
    let signed_in = reader.session.current_user().is_some();
    let changed = reader.surface.lock().await.apply(command, signed_in);
    if changed {
        send_snapshot(reader, ws_sender).await;
    }
}

/// Relays feed events to the client until the connection is cancelled.
async fn forward_feed_events(
    reader: Arc<ReaderState>,
    mut events: tokio::sync::broadcast::Receiver<FeedEvent>,
    ws_sender: WsSender,
) {
    let token = reader.cancellation_token.clone();
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = events.recv() => event,
        };
        let delivered = match event {
            Ok(FeedEvent::ScrollTo(command)) => {
                send_message(&ws_sender, &ServerMessage::ScrollTo(command)).await
            }
            Ok(event @ FeedEvent::Reset) => {
                reader.surface.lock().await.observe(&event);
                send_snapshot(&reader, &ws_sender).await
            }
            Ok(FeedEvent::Loaded) | Ok(FeedEvent::Changed) => send_snapshot(&reader, &ws_sender).await,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Feed events lagged by {}; resending snapshot.", skipped);
                send_snapshot(&reader, &ws_sender).await
            }
            Err(RecvError::Closed) => break,
        };
        if !delivered {
            error!("Failed to deliver feed update. Ending event forwarding.");
            break;
        }
    }
}

async fn forward_picker_prompts(
    reader: Arc<ReaderState>,
    mut prompts: mpsc::UnboundedReceiver<PickerPrompt>,
    ws_sender: WsSender,
) {
    let token = reader.cancellation_token.clone();
    loop {
        let prompt = tokio::select! {
            _ = token.cancelled() => break,
            prompt = prompts.recv() => prompt,
        };
        let Some(prompt) = prompt else { break };
        let msg = ServerMessage::AccountPickerRequested { force_select: prompt.force_select };
        if !send_message(&ws_sender, &msg).await {
            reader.provider.close();
            break;
        }
    }
}

async fn send_snapshot(reader: &ReaderState, ws_sender: &WsSender) -> bool {
    let feed = reader.feed.snapshot().await;
    let surface = reader.surface.lock().await.clone();
    send_message(ws_sender, &ServerMessage::Snapshot { feed, surface }).await
}

async fn send_message(ws_sender: &WsSender, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return false;
        }
    };
    ws_sender.lock().await.send(Message::Text(json.into())).await.is_ok()
}
