/*!
Stub co2signal API pour tests sans réseau

Implémente `CarbonApi` avec des réponses scriptées par zone et enregistre
chaque requête (zone + propriétaire du token) pour les assertions.
*/

use co2_collector::{CarbonApi, Credential, RawResponse, TransportError};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Reply the stub gives for one request.
#[derive(Debug, Clone)]
pub enum StubReply {
    /// JSON body with the given HTTP status.
    Json { status: u16, body: Value },
    /// Non-JSON body, surfaces as a transport failure.
    NotJson { status: u16, text: String },
}

impl StubReply {
    pub fn ok(body: Value) -> Self {
        StubReply::Json { status: 200, body }
    }

    pub fn gateway_error() -> Self {
        StubReply::NotJson {
            status: 502,
            text: "<html><body>502 Bad Gateway</body></html>".to_string(),
        }
    }

    fn into_response(self, zone: &str) -> Result<RawResponse, TransportError> {
        match self {
            StubReply::Json { status, body } => Ok(RawResponse {
                zone: zone.to_string(),
                http_status: status,
                body,
            }),
            StubReply::NotJson { status, text } => {
                let source = serde_json::from_str::<Value>(&text)
                    .err()
                    .unwrap_or_else(|| serde_json::from_str::<Value>("").unwrap_err());
                Err(TransportError::NotJson { status, source })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubCall {
    pub zone: String,
    pub owner: String,
    pub token: String,
}

#[derive(Default)]
struct Script {
    // Réponses consommées une par une, avant la réponse permanente
    queued: HashMap<String, VecDeque<StubReply>>,
    fixed: HashMap<String, StubReply>,
}

/// Scripted stand-in for the co2signal API.
#[derive(Clone, Default)]
pub struct StubApi {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<StubCall>>>,
}

impl StubApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request for `zone` with `reply`.
    pub fn respond(&self, zone: &str, reply: StubReply) -> &Self {
        self.script
            .lock()
            .unwrap()
            .fixed
            .insert(zone.to_string(), reply);
        self
    }

    /// Answers the next request for `zone` with `reply`, ahead of the permanent reply.
    pub fn respond_once(&self, zone: &str, reply: StubReply) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(zone.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn respond_json(&self, zone: &str, body: Value) -> &Self {
        self.respond(zone, StubReply::ok(body))
    }

    fn next_reply(&self, zone: &str) -> StubReply {
        let mut script = self.script.lock().unwrap();
        if let Some(reply) = script.queued.get_mut(zone).and_then(VecDeque::pop_front) {
            return reply;
        }
        script.fixed.get(zone).cloned().unwrap_or_else(|| StubReply::NotJson {
            status: 404,
            text: format!("no scripted reply for zone {zone}"),
        })
    }

    pub fn calls(&self) -> Vec<StubCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, zone: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.zone == zone).count()
    }

    /// Owners of the tokens used, in request order.
    pub fn owners(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.owner.clone()).collect()
    }
}

impl CarbonApi for StubApi {
    async fn latest_for_zone(
        &self,
        zone: &str,
        credential: &Credential,
    ) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(StubCall {
            zone: zone.to_string(),
            owner: credential.owner.clone(),
            token: credential.token.clone(),
        });
        let reply = self.next_reply(zone);
        log::info!("[STUB] {} requested by {}: {:?}", zone, credential.owner, reply);
        reply.into_response(zone)
    }
}
