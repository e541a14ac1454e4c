// Application task: owns the services, answers WebSocket requests and drives
// the recurring auto-propagation timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use playxi_core::config::Config;
use playxi_core::db::{self, Database};
use playxi_core::error::LineupError;
use playxi_core::model::MatchId;
use playxi_core::propagation::{AutoPropagationService, PropagationReport};
use playxi_core::protocol::{
    peek_request_id, ClientRequest, DeletedPayload, PropagationScope, SaveLineupResponse,
    ServerResponse,
};
use playxi_core::scoring::{self, ScoreReport};
use playxi_core::service::LineupService;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::ws_server::WsEvent;

/// Everything the request handlers need.
pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub lineups: LineupService,
    pub propagation: AutoPropagationService,
}

impl AppState {
    pub fn new(config: Config, db: Arc<Database>) -> Self {
        let lineups = LineupService::new(db.clone(), config.rules.clone());
        let propagation = AutoPropagationService::new(db.clone());
        AppState {
            config,
            db,
            lineups,
            propagation,
        }
    }
}

/// Main application event loop.
///
/// Requests are handled one at a time in arrival order. Propagation runs once
/// at startup (when configured) and then on every timer tick; a failed pass is
/// logged and retried on the next tick.
pub async fn run(mut ws_rx: mpsc::Receiver<WsEvent>, state: AppState) -> anyhow::Result<()> {
    info!("Application event loop started");

    if state.config.propagation.run_on_startup {
        propagation_tick(&state);
    }

    let mut propagation_interval =
        tokio::time::interval(Duration::from_secs(state.config.propagation.interval_secs));
    // The first tick completes immediately; consume it so the first timed
    // pass happens after one full interval.
    propagation_interval.tick().await;

    loop {
        tokio::select! {
            // --- WebSocket events ---
            ws_event = ws_rx.recv() => {
                match ws_event {
                    Some(WsEvent::Connected { addr }) => {
                        info!("Client connected from {addr}");
                    }
                    Some(WsEvent::Disconnected { addr }) => {
                        info!("Client {addr} disconnected");
                    }
                    Some(WsEvent::Request { addr, text, reply }) => {
                        let response = handle_request_json(&state, &text, Utc::now());
                        if reply.send(response).is_err() {
                            debug!("Client {addr} went away before its reply was sent");
                        }
                    }
                    None => {
                        info!("WebSocket channel closed, shutting down app loop");
                        break;
                    }
                }
            }

            // --- Auto-propagation timer ---
            _ = propagation_interval.tick() => {
                propagation_tick(&state);
            }
        }
    }

    Ok(())
}

fn propagation_tick(state: &AppState) {
    match state.propagation.propagate_all(Utc::now()) {
        Ok(report) => debug!(copied = report.lineups_copied, "propagation tick finished"),
        Err(e) => error!("Auto-propagation failed, retrying next tick: {e:#}"),
    }
}

/// Answer one raw frame with one encoded response frame.
pub fn handle_request_json(state: &AppState, json_str: &str, now: DateTime<Utc>) -> String {
    let response = handle_request(state, json_str, now);
    match serde_json::to_string(&response) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to encode response: {e}");
            let fallback = ServerResponse::error(
                response.request_id().map(str::to_string),
                "storage",
                "response could not be encoded",
            );
            serde_json::to_string(&fallback).unwrap_or_default()
        }
    }
}

/// Dispatch a parsed request. Frames that do not parse get an `ERROR`
/// response with kind `parse`.
pub fn handle_request(state: &AppState, json_str: &str, now: DateTime<Utc>) -> ServerResponse {
    let request: ClientRequest = match serde_json::from_str(json_str) {
        Ok(r) => r,
        Err(e) => {
            warn!("Failed to parse client request: {e}");
            return ServerResponse::error(peek_request_id(json_str), "parse", e.to_string());
        }
    };
    let request_id = request.request_id().map(str::to_string);

    match request {
        ClientRequest::SaveLineup { payload, .. } => {
            let result = match state.lineups.save_lineup(&payload, now) {
                Ok(outcome) => SaveLineupResponse::accepted(outcome),
                Err(err) => {
                    let remaining = state
                        .lineups
                        .transfer_summary(payload.team_id)
                        .ok()
                        .map(|s| s.transfers_remaining);
                    SaveLineupResponse::rejected(&err, remaining)
                }
            };
            ServerResponse::SaveLineupResult {
                request_id,
                payload: result,
            }
        }
        ClientRequest::GetLineup { payload, .. } => respond(
            request_id,
            state.lineups.get_lineup(payload.team_id, payload.match_id, now),
            |request_id, payload| ServerResponse::Lineup {
                request_id,
                payload,
            },
        ),
        ClientRequest::DeleteLineup { payload, .. } => respond(
            request_id,
            state
                .lineups
                .delete_lineup(payload.team_id, payload.match_id, now),
            |request_id, deleted| ServerResponse::LineupDeleted {
                request_id,
                payload: DeletedPayload { deleted },
            },
        ),
        ClientRequest::TransferSummary { payload, .. } => respond(
            request_id,
            state.lineups.transfer_summary(payload.team_id),
            |request_id, payload| ServerResponse::TransferSummary {
                request_id,
                payload,
            },
        ),
        ClientRequest::TransferHistory { payload, .. } => respond(
            request_id,
            state.lineups.transfer_history(payload.team_id),
            |request_id, payload| ServerResponse::TransferHistory {
                request_id,
                payload,
            },
        ),
        ClientRequest::RunPropagation { payload, .. } => respond(
            request_id,
            run_propagation(state, &payload, now),
            |request_id, payload| ServerResponse::PropagationReport {
                request_id,
                payload,
            },
        ),
        ClientRequest::ScoreMatch { payload, .. } => respond(
            request_id,
            score(state, payload.match_id, now),
            |request_id, payload| ServerResponse::MatchScored {
                request_id,
                payload,
            },
        ),
    }
}

fn respond<T>(
    request_id: Option<String>,
    result: Result<T, LineupError>,
    wrap: impl FnOnce(Option<String>, T) -> ServerResponse,
) -> ServerResponse {
    match result {
        Ok(value) => wrap(request_id, value),
        Err(err) => {
            warn!(kind = err.kind(), "request failed: {err}");
            ServerResponse::Error {
                request_id,
                payload: (&err).into(),
            }
        }
    }
}

fn run_propagation(
    state: &AppState,
    scope: &PropagationScope,
    now: DateTime<Utc>,
) -> Result<PropagationReport, LineupError> {
    let report = match scope.league_id {
        Some(league_id) => {
            if state.db.league(league_id)?.is_none() {
                return Err(LineupError::not_found("league", league_id));
            }
            state.propagation.propagate_league(league_id, now)?
        }
        None => state.propagation.propagate_all(now)?,
    };
    info!(
        leagues = report.leagues_scanned,
        copied = report.lineups_copied,
        "admin propagation run"
    );
    Ok(report)
}

/// Fill any missing lineups for the match's league before scoring, so teams
/// that never touched this match are scored on their carried-over XI.
fn score(
    state: &AppState,
    match_id: MatchId,
    now: DateTime<Utc>,
) -> Result<ScoreReport, LineupError> {
    let fixture = state
        .db
        .read(|conn| db::load_match(conn, match_id))?
        .ok_or_else(|| LineupError::not_found("match", match_id))?;
    if !fixture.is_locked(now) {
        return Err(LineupError::NotYetLocked { match_id });
    }
    state.propagation.propagate_league(fixture.league_id, now)?;
    scoring::score_match(&state.db, state.db.as_ref(), match_id, now)
}
