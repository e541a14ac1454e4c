// WebSocket message types between clients and the playxi server.
//
// Every frame is a JSON object `{"type": ..., "requestId": ..., "payload": ...}`.
// Each request is answered by exactly one response echoing its `requestId`.

use serde::{Deserialize, Serialize};

use crate::error::LineupError;
use crate::model::{LeagueId, MatchId, TeamId, TransferRecord};
use crate::propagation::PropagationReport;
use crate::scoring::ScoreReport;
use crate::service::{LineupView, SaveLineupRequest, SaveOutcome, TransferSummary};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineupKey {
    pub team_id: TeamId,
    pub match_id: MatchId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamKey {
    pub team_id: TeamId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchKey {
    pub match_id: MatchId,
}

/// Scope of an admin propagation run. No league means every league.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationScope {
    #[serde(default)]
    pub league_id: Option<LeagueId>,
}

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientRequest {
    SaveLineup {
        #[serde(default)]
        request_id: Option<String>,
        payload: SaveLineupRequest,
    },
    GetLineup {
        #[serde(default)]
        request_id: Option<String>,
        payload: LineupKey,
    },
    DeleteLineup {
        #[serde(default)]
        request_id: Option<String>,
        payload: LineupKey,
    },
    TransferSummary {
        #[serde(default)]
        request_id: Option<String>,
        payload: TeamKey,
    },
    TransferHistory {
        #[serde(default)]
        request_id: Option<String>,
        payload: TeamKey,
    },
    /// Admin trigger for auto-propagation.
    RunPropagation {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        payload: PropagationScope,
    },
    ScoreMatch {
        #[serde(default)]
        request_id: Option<String>,
        payload: MatchKey,
    },
}

impl ClientRequest {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ClientRequest::SaveLineup { request_id, .. }
            | ClientRequest::GetLineup { request_id, .. }
            | ClientRequest::DeleteLineup { request_id, .. }
            | ClientRequest::TransferSummary { request_id, .. }
            | ClientRequest::TransferHistory { request_id, .. }
            | ClientRequest::RunPropagation { request_id, .. }
            | ClientRequest::ScoreMatch { request_id, .. } => request_id.as_deref(),
        }
    }
}

/// Best-effort extraction of `requestId` from a frame that failed to parse.
pub fn peek_request_id(json_str: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json_str).ok()?;
    value.get("requestId")?.as_str().map(str::to_string)
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedSave {
    pub accepted: bool,
    #[serde(flatten)]
    pub outcome: SaveOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedSave {
    pub accepted: bool,
    pub reason: String,
    pub error_kind: String,
    /// Failing lineup rule, for validation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub transfers_remaining: Option<u32>,
}

/// Payload of a `SAVE_LINEUP_RESULT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SaveLineupResponse {
    Accepted(AcceptedSave),
    Rejected(RejectedSave),
}

impl SaveLineupResponse {
    pub fn accepted(outcome: SaveOutcome) -> Self {
        SaveLineupResponse::Accepted(AcceptedSave {
            accepted: true,
            outcome,
        })
    }

    /// `transfers_remaining` is used when the error itself does not carry
    /// the number.
    pub fn rejected(err: &LineupError, transfers_remaining: Option<u32>) -> Self {
        let rule = match err {
            LineupError::Validation(v) => Some(v.rule().to_string()),
            _ => None,
        };
        SaveLineupResponse::Rejected(RejectedSave {
            accepted: false,
            reason: err.to_string(),
            error_kind: err.kind().to_string(),
            rule,
            transfers_remaining: err.transfers_remaining().or(transfers_remaining),
        })
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SaveLineupResponse::Accepted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPayload {
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_kind: String,
    pub reason: String,
}

impl From<&LineupError> for ErrorPayload {
    fn from(err: &LineupError) -> Self {
        ErrorPayload {
            error_kind: err.kind().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerResponse {
    SaveLineupResult {
        request_id: Option<String>,
        payload: SaveLineupResponse,
    },
    Lineup {
        request_id: Option<String>,
        payload: LineupView,
    },
    LineupDeleted {
        request_id: Option<String>,
        payload: DeletedPayload,
    },
    TransferSummary {
        request_id: Option<String>,
        payload: TransferSummary,
    },
    TransferHistory {
        request_id: Option<String>,
        payload: Vec<TransferRecord>,
    },
    PropagationReport {
        request_id: Option<String>,
        payload: PropagationReport,
    },
    MatchScored {
        request_id: Option<String>,
        payload: ScoreReport,
    },
    Error {
        request_id: Option<String>,
        payload: ErrorPayload,
    },
}

impl ServerResponse {
    pub fn error(request_id: Option<String>, error_kind: &str, reason: impl Into<String>) -> Self {
        ServerResponse::Error {
            request_id,
            payload: ErrorPayload {
                error_kind: error_kind.to_string(),
                reason: reason.into(),
            },
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            ServerResponse::SaveLineupResult { request_id, .. }
            | ServerResponse::Lineup { request_id, .. }
            | ServerResponse::LineupDeleted { request_id, .. }
            | ServerResponse::TransferSummary { request_id, .. }
            | ServerResponse::TransferHistory { request_id, .. }
            | ServerResponse::PropagationReport { request_id, .. }
            | ServerResponse::MatchScored { request_id, .. }
            | ServerResponse::Error { request_id, .. } => request_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transfer::{Budget, BudgetExceeded, PriceBreakdown};
    use crate::lineup::validator::ValidationError;

    #[test]
    fn parses_save_lineup() {
        let json = r#"{
            "type": "SAVE_LINEUP",
            "requestId": "r-1",
            "payload": {
                "teamId": 4, "matchId": 9, "leagueId": 1,
                "players": [1,2,3,4,5,6,7,8,9,10,11],
                "captainId": 1, "viceCaptainId": 2
            }
        }"#;
        let msg: ClientRequest = serde_json::from_str(json).unwrap();
        assert_eq!(msg.request_id(), Some("r-1"));
        match msg {
            ClientRequest::SaveLineup { payload, .. } => {
                assert_eq!(payload.team_id, 4);
                assert_eq!(payload.players.len(), 11);
                assert_eq!(payload.vice_captain_id, 2);
            }
            other => panic!("expected SaveLineup, got {other:?}"),
        }
    }

    #[test]
    fn run_propagation_payload_is_optional() {
        let msg: ClientRequest = serde_json::from_str(r#"{"type":"RUN_PROPAGATION"}"#).unwrap();
        assert_eq!(
            msg,
            ClientRequest::RunPropagation {
                request_id: None,
                payload: PropagationScope::default(),
            }
        );

        let msg: ClientRequest = serde_json::from_str(
            r#"{"type":"RUN_PROPAGATION","requestId":"p","payload":{"leagueId":3}}"#,
        )
        .unwrap();
        match msg {
            ClientRequest::RunPropagation { payload, .. } => assert_eq!(payload.league_id, Some(3)),
            other => panic!("expected RunPropagation, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientRequest>(r#"{"type":"DROP_TABLES"}"#).is_err());
        assert_eq!(
            peek_request_id(r#"{"type":"DROP_TABLES","requestId":"x"}"#),
            Some("x".to_string())
        );
        assert_eq!(peek_request_id("not json"), None);
    }

    #[test]
    fn accepted_save_serializes_flat() {
        let response = ServerResponse::SaveLineupResult {
            request_id: Some("r-2".into()),
            payload: SaveLineupResponse::accepted(SaveOutcome {
                transfers_this_match: 1,
                transfers_remaining: 9,
                captain_change_consumed: false,
                vc_change_consumed: false,
                breakdown: PriceBreakdown {
                    player_transfers: 1,
                    captain_cost: 0,
                    vice_captain_cost: 0,
                    total: 1,
                },
                revision: 1,
            }),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["type"], "SAVE_LINEUP_RESULT");
        assert_eq!(value["requestId"], "r-2");
        assert_eq!(value["payload"]["accepted"], true);
        assert_eq!(value["payload"]["transfersThisMatch"], 1);
        assert_eq!(value["payload"]["transfersRemaining"], 9);
        assert_eq!(value["payload"]["breakdown"]["playerTransfers"], 1);
    }

    #[test]
    fn rejected_save_carries_kind_and_remaining() {
        let err = LineupError::from(BudgetExceeded {
            budget: Budget::Transfers,
            spent: 9,
            limit: 10,
            remaining: 1,
            requested: 2,
            transfers_remaining: 1,
        });
        let value = serde_json::to_value(SaveLineupResponse::rejected(&err, Some(7))).unwrap();
        assert_eq!(value["accepted"], false);
        assert_eq!(value["errorKind"], "budget_exceeded");
        assert_eq!(value["transfersRemaining"], 1);
        assert!(value.get("rule").is_none());

        let err = LineupError::from(ValidationError::NotEnoughKeepers {
            required: 1,
            actual: 0,
        });
        let response = SaveLineupResponse::rejected(&err, Some(7));
        assert!(!response.is_accepted());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["rule"], "min_keepers");
        assert_eq!(value["transfersRemaining"], 7);
    }

    #[test]
    fn responses_round_trip_through_json() {
        let response = ServerResponse::error(Some("e".into()), "parse", "bad frame");
        let json = serde_json::to_string(&response).unwrap();
        let parsed: ServerResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
        assert_eq!(parsed.request_id(), Some("e"));
    }
}
