// End-to-end: a real WebSocket client against the server and app tasks.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures_util::{SinkExt, StreamExt};
use playxi_core::config::{Config, DatabaseConfig, LineupRules, PropagationConfig, ServerConfig};
use playxi_core::db::Database;
use playxi_core::lineup::player::PlayerRef;
use playxi_server::{app, ws_server};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

fn config() -> Config {
    Config {
        server: ServerConfig { port: 0 },
        database: DatabaseConfig {
            path: ":memory:".into(),
        },
        propagation: PropagationConfig {
            interval_secs: 3600,
            run_on_startup: false,
        },
        rules: LineupRules::default(),
    }
}

fn squad() -> Vec<PlayerRef> {
    (1..=14)
        .map(|id| PlayerRef {
            player_id: id,
            name: format!("Player {id}"),
            role: match id {
                1..=2 => "Wicket Keeper",
                3..=8 => "Batsman",
                _ => "Bowler",
            }
            .into(),
            squad_tag: String::new(),
        })
        .collect()
}

async fn recv_json<S>(read: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("connection ended early: {other:?}"),
        }
    }
}

#[tokio::test]
async fn requests_are_answered_in_order_with_request_ids() {
    let db = Arc::new(Database::open(":memory:").unwrap());
    let league = db.insert_league("Premier", 10).unwrap();
    let team = db.insert_team(league, "Strikers").unwrap();
    db.set_squad(team, &squad()).unwrap();
    let now = Utc::now();
    let first = db.insert_match(league, 1, now + Duration::days(1)).unwrap();
    db.insert_match(league, 2, now + Duration::days(2)).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(16);
    let server = tokio::spawn(ws_server::serve(listener, tx));
    let app_task = tokio::spawn(app::run(rx, app::AppState::new(config(), db.clone())));

    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    let (mut write, mut read) = socket.split();

    let save = json!({
        "type": "SAVE_LINEUP",
        "requestId": "a",
        "payload": {
            "teamId": team,
            "matchId": first,
            "leagueId": league,
            "players": [1, 3, 4, 5, 6, 7, 9, 10, 11, 12, 13],
            "captainId": 3,
            "viceCaptainId": 4
        }
    });
    let summary = json!({
        "type": "TRANSFER_SUMMARY",
        "requestId": "b",
        "payload": {"teamId": team}
    });
    write.send(Message::text(save.to_string())).await.unwrap();
    write.send(Message::text(summary.to_string())).await.unwrap();
    write.send(Message::text("{broken")).await.unwrap();

    let reply = recv_json(&mut read).await;
    assert_eq!(reply["type"], "SAVE_LINEUP_RESULT");
    assert_eq!(reply["requestId"], "a");
    assert_eq!(reply["payload"]["accepted"], true);

    let reply = recv_json(&mut read).await;
    assert_eq!(reply["type"], "TRANSFER_SUMMARY");
    assert_eq!(reply["requestId"], "b");
    assert_eq!(reply["payload"]["lineupsSaved"], 1);
    assert_eq!(reply["payload"]["transfersRemaining"], 10);

    let reply = recv_json(&mut read).await;
    assert_eq!(reply["type"], "ERROR");
    assert_eq!(reply["payload"]["errorKind"], "parse");

    write.send(Message::Close(None)).await.unwrap();
    server.abort();
    app_task.abort();
}
