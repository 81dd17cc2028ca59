use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::api::rest::parse_warehouse_filter;
use crate::error::AppError;
use crate::models::warehouse::WarehouseId;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WatchQuery {
    pub warehouse_id: Option<String>,
}

/// Streams assignment events, optionally only those of one warehouse.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WatchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let warehouse = parse_warehouse_filter(query.warehouse_id.as_deref())?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, warehouse)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, warehouse: Option<WarehouseId>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.assignment_events_tx.subscribe();

    info!(warehouse_id = ?warehouse, "websocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let assignment = match rx.recv().await {
                Ok(assignment) => assignment,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket subscriber lagged; events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if warehouse
                .as_ref()
                .is_some_and(|warehouse| warehouse != &assignment.warehouse_id)
            {
                continue;
            }

            let json = match serde_json::to_string(&assignment) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize assignment for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
