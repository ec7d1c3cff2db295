//! Supabase Realtime (Phoenix channel) subscription over a websocket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{ChangeEvent, ChangeKind, Subscription, TableFilter};
use crate::{Error, Result};

const PROTOCOL_VERSION: &str = "1.0.0";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const JOIN_REF: &str = "1";
const EVENT_BUFFER: usize = 64;

/// Decoded inbound frame.
#[derive(Debug, PartialEq)]
enum Inbound {
    Change(ChangeEvent),
    JoinReply { ok: bool, detail: String },
    Closed(String),
    Other,
}

/// Join `channel` and stream its postgres changes.
///
/// Resolves once the server acknowledged the join.
pub(super) async fn subscribe(
    websocket_url: &str,
    anon_key: &str,
    channel: &str,
    tables: Vec<TableFilter>,
) -> Result<Subscription> {
    let url = reqwest::Url::parse_with_params(
        websocket_url,
        &[("apikey", anon_key), ("vsn", PROTOCOL_VERSION)],
    )
    .map_err(|error| Error::InvalidConfig(format!("invalid realtime URL: {error}")))?;

    let (socket, _) = connect_async(url.as_str()).await?;
    let (mut writer, mut reader) = socket.split();

    let topic = format!("realtime:{channel}");
    writer
        .send(Message::Text(join_message(&topic, anon_key, &tables).to_string()))
        .await?;

    loop {
        let Some(frame) = reader.next().await else {
            return Err(Error::Backend(format!(
                "realtime connection closed before joining {topic}"
            )));
        };
        let Message::Text(text) = frame? else {
            continue;
        };
        match decode(&text) {
            Inbound::JoinReply { ok: true, .. } => break,
            Inbound::JoinReply { ok: false, detail } => {
                return Err(Error::Backend(format!(
                    "realtime join rejected for {topic}: {detail}"
                )));
            }
            _ => {}
        }
    }
    tracing::info!("Realtime channel {} joined", topic);

    let (sender, events) = mpsc::channel(EVENT_BUFFER);
    let task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut heartbeat_ref: u64 = 1;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    heartbeat_ref += 1;
                    let message = heartbeat_message(heartbeat_ref);
                    if let Err(error) = writer.send(Message::Text(message.to_string())).await {
                        tracing::warn!("Realtime heartbeat failed: {}", error);
                        break;
                    }
                }
                frame = reader.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = writer.send(Message::Pong(payload)).await;
                            continue;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!("Realtime connection closed");
                            break;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(error)) => {
                            tracing::warn!("Realtime connection error: {}", error);
                            break;
                        }
                    };
                    match decode(&text) {
                        Inbound::Change(event) => {
                            if sender.send(event).await.is_err() {
                                break;
                            }
                        }
                        Inbound::Closed(reason) => {
                            tracing::warn!("Realtime channel closed: {}", reason);
                            break;
                        }
                        Inbound::JoinReply { .. } | Inbound::Other => {}
                    }
                }
            }
        }
    });

    Ok(Subscription::new(events, Some(task)))
}

fn join_message(topic: &str, access_token: &str, tables: &[TableFilter]) -> Value {
    let changes: Vec<Value> = tables
        .iter()
        .map(|table| {
            let mut change = json!({
                "event": "*",
                "schema": "public",
                "table": table.table,
            });
            if let Some(filter) = &table.filter {
                change["filter"] = Value::String(filter.expression());
            }
            change
        })
        .collect();

    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": changes,
            },
            "access_token": access_token,
        },
        "ref": JOIN_REF,
        "join_ref": JOIN_REF,
    })
}

fn heartbeat_message(reference: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
}

fn decode(text: &str) -> Inbound {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        tracing::warn!("Ignoring non-JSON realtime frame");
        return Inbound::Other;
    };

    match frame.get("event").and_then(Value::as_str) {
        Some("postgres_changes") => {
            decode_change(&frame["payload"]["data"]).map_or(Inbound::Other, Inbound::Change)
        }
        Some("phx_reply") if frame.get("ref").and_then(Value::as_str) == Some(JOIN_REF) => {
            let payload = &frame["payload"];
            Inbound::JoinReply {
                ok: payload.get("status").and_then(Value::as_str) == Some("ok"),
                detail: payload["response"].to_string(),
            }
        }
        Some("phx_error" | "phx_close") => Inbound::Closed(frame["payload"].to_string()),
        _ => Inbound::Other,
    }
}

fn decode_change(data: &Value) -> Option<ChangeEvent> {
    let table = data.get("table").and_then(Value::as_str)?;
    let kind = match data.get("type").and_then(Value::as_str)? {
        "INSERT" => ChangeKind::Insert,
        "UPDATE" => ChangeKind::Update,
        "DELETE" => ChangeKind::Delete,
        other => {
            tracing::warn!("Ignoring realtime change of unknown type {}", other);
            return None;
        }
    };
    let record = |key: &str| {
        data.get(key)
            .filter(|value| value.as_object().is_some_and(|map| !map.is_empty()))
            .cloned()
    };

    Some(ChangeEvent {
        table: table.to_string(),
        kind,
        old: record("old_record"),
        new: record("record"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Filter;
    use pretty_assertions::assert_eq;

    #[test]
    fn join_message_lists_filtered_tables() {
        let tables = vec![
            TableFilter::new("players", Some(Filter::eq("tournament_id", "t-1"))),
            TableFilter::new("games", None),
        ];
        let message = join_message("realtime:tournament-t-1", "anon", &tables);

        assert_eq!(message["event"], "phx_join");
        let changes = message["payload"]["config"]["postgres_changes"]
            .as_array()
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0]["filter"], "tournament_id=eq.t-1");
        assert!(changes[1].get("filter").is_none());
    }

    #[test]
    fn decode_postgres_change() {
        let frame = json!({
            "event": "postgres_changes",
            "topic": "realtime:tournament-t-1",
            "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "schema": "public",
                    "table": "players",
                    "type": "UPDATE",
                    "record": {"id": 1, "name": "Anna", "tournament_id": "t-1"},
                    "old_record": {"id": 1}
                }
            }
        });

        let Inbound::Change(event) = decode(&frame.to_string()) else {
            panic!("expected change");
        };
        assert_eq!(event.table, "players");
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.new.unwrap()["name"], "Anna");
        assert_eq!(event.old.unwrap()["id"], 1);
    }

    #[test]
    fn decode_treats_empty_records_as_missing() {
        let frame = json!({
            "event": "postgres_changes",
            "payload": {"data": {"table": "teams", "type": "DELETE", "record": {}, "old_record": {"id": 4}}}
        });
        let Inbound::Change(event) = decode(&frame.to_string()) else {
            panic!("expected change");
        };
        assert!(event.new.is_none());
        assert!(event.old.is_some());
    }

    #[test]
    fn decode_join_reply_and_garbage() {
        let ok = json!({"event": "phx_reply", "ref": "1", "payload": {"status": "ok", "response": {}}});
        assert_eq!(
            decode(&ok.to_string()),
            Inbound::JoinReply {
                ok: true,
                detail: "{}".to_string()
            }
        );

        let heartbeat_reply =
            json!({"event": "phx_reply", "ref": "2", "payload": {"status": "ok"}});
        assert_eq!(decode(&heartbeat_reply.to_string()), Inbound::Other);
        assert_eq!(decode("not json"), Inbound::Other);

        let unknown = json!({"event": "postgres_changes", "payload": {"data": {"table": "x", "type": "TRUNCATE"}}});
        assert_eq!(decode(&unknown.to_string()), Inbound::Other);
    }

    #[test]
    fn heartbeat_targets_phoenix_topic() {
        let message = heartbeat_message(3);
        assert_eq!(message["topic"], "phoenix");
        assert_eq!(message["ref"], "3");
    }
}
