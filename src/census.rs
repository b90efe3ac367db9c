use std::{
    collections::{HashSet, VecDeque},
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::sleep,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{
    events::{CharacterId, VEHICLE_DESTROY_EVENT},
    resolver::{CharacterIdentity, CharacterLookup, LookupError},
};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const RECENT_EVENT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub endpoint: String,
    pub service_id: String,
    pub world_id: u32,
}

impl StreamConfig {
    fn uri(&self) -> String {
        format!(
            "{}?environment=ps2&service-id={}",
            self.endpoint.trim_end_matches('/'),
            self.service_id
        )
    }

    fn subscribe_message(&self) -> Value {
        json!({
            "service": "event",
            "action": "subscribe",
            "characters": ["all"],
            "worlds": [self.world_id.to_string()],
            "eventNames": [VEHICLE_DESTROY_EVENT],
            "logicalAndCharactersWithWorlds": true
        })
    }
}

pub fn spawn_census_stream(
    config: StreamConfig,
    tx: mpsc::Sender<Value>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_census_stream(config, tx, shutdown).await;
    })
}

enum SessionEnd {
    Disconnected,
    Stop,
}

async fn run_census_stream(
    config: StreamConfig,
    tx: mpsc::Sender<Value>,
    mut shutdown: watch::Receiver<bool>,
) {
    let uri = config.uri();
    let mut recent = RecentEvents::new(RECENT_EVENT_CAPACITY);
    loop {
        match connect_async(uri.as_str()).await {
            Ok((socket, _response)) => {
                info!(world_id = config.world_id, "connected to census stream");
                match run_census_session(socket, &config, &tx, &mut recent, &mut shutdown).await
                {
                    SessionEnd::Stop => return,
                    SessionEnd::Disconnected => warn!("census stream disconnected, retrying"),
                }
            }
            Err(err) => {
                warn!(?err, "failed connecting to census stream");
            }
        }
        tokio::select! {
            _ = sleep(RECONNECT_DELAY) => {}
            _ = shutdown.changed() => return,
        }
    }
}

type CensusSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn run_census_session(
    mut socket: CensusSocket,
    config: &StreamConfig,
    tx: &mpsc::Sender<Value>,
    recent: &mut RecentEvents,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    if socket
        .send(Message::Text(config.subscribe_message().to_string()))
        .await
        .is_err()
    {
        warn!("failed to send census subscribe payload");
        return SessionEnd::Disconnected;
    }

    loop {
        let next = tokio::select! {
            next = socket.next() => Some(next),
            _ = shutdown.changed() => None,
        };
        let Some(next) = next else {
            let _ = socket.close(None).await;
            info!("closed census stream");
            return SessionEnd::Stop;
        };
        let text = match next {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => return SessionEnd::Disconnected,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                warn!(?err, "census stream read error");
                return SessionEnd::Disconnected;
            }
        };

        let Some(payload) = extract_payload(&text) else {
            continue;
        };
        if !recent.insert(&payload) {
            debug!("dropping duplicate census payload");
            continue;
        }
        if tx.send(payload).await.is_err() {
            warn!("event consumer dropped; stopping census stream");
            let _ = socket.close(None).await;
            return SessionEnd::Stop;
        }
    }
}

fn extract_payload(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()?
        .get("payload")
        .filter(|payload| payload.is_object())
        .cloned()
}

// The stream occasionally repeats events.
struct RecentEvents {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RecentEvents {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, payload: &Value) -> bool {
        let uid = payload_uid(payload);
        if self.seen.contains(&uid) {
            return false;
        }
        self.seen.insert(uid.clone());
        self.order.push_back(uid);
        if self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }
}

fn payload_uid(payload: &Value) -> String {
    let field = |key: &str| {
        payload
            .get(key)
            .and_then(value_to_string)
            .unwrap_or_else(|| "0".to_owned())
    };
    format!(
        "{}_{}_{}_{}_{}",
        field("event_name"),
        field("timestamp"),
        field("character_id"),
        field("attacker_character_id"),
        field("vehicle_id")
    )
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct CensusLookup {
    client: reqwest::Client,
    base_url: String,
    service_id: String,
}

impl CensusLookup {
    pub fn new(base_url: &str, service_id: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building census http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            service_id: service_id.to_owned(),
        })
    }

    fn character_url(&self, character_id: CharacterId) -> String {
        format!(
            "{}/{}/get/ps2:v2/character?character_id={character_id}&c:show=character_id,name.first,faction_id",
            self.base_url, self.service_id
        )
    }
}

#[async_trait]
impl CharacterLookup for CensusLookup {
    async fn lookup_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Option<CharacterIdentity>, LookupError> {
        let root = self
            .client
            .get(self.character_url(character_id))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        parse_character_payload(&root)
    }
}

fn parse_character_payload(root: &Value) -> Result<Option<CharacterIdentity>, LookupError> {
    if let Some(message) = json_text(root, &["error", "errorMessage", "errorCode"]) {
        return Err(LookupError::Service(message));
    }
    let Some(entry) = root
        .get("character_list")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
    else {
        return Ok(None);
    };
    let Some(character_id) = json_text(entry, &["character_id"])
        .and_then(|raw| raw.parse::<CharacterId>().ok())
    else {
        return Ok(None);
    };
    let Some(name) = json_text(entry, &["name/first", "name.first"]) else {
        return Ok(None);
    };
    let faction_id = json_u32(entry.get("faction_id")).unwrap_or(0);
    Ok(Some(CharacterIdentity {
        character_id,
        name,
        faction_id,
    }))
}

fn json_text(root: &Value, paths: &[&str]) -> Option<String> {
    for path in paths {
        let mut current = Some(root);
        if path.contains('/') {
            for key in path.split('/') {
                current = current.and_then(|value| value.get(key));
            }
        } else {
            current = root.get(*path);
        }
        let text = current.and_then(|value| match value {
            Value::String(s) => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        if let Some(text) = text.filter(|value| !value.is_empty()) {
            return Some(text);
        }
    }
    None
}

fn json_u32(value: Option<&Value>) -> Option<u32> {
    value.and_then(|v| {
        if let Some(n) = v.as_u64() {
            return u32::try_from(n).ok();
        }
        v.as_str().and_then(|raw| raw.trim().parse::<u32>().ok())
    })
}
