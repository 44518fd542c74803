//! Trello board as a [`TaskStore`].
//!
//! Cards are tasks, lists are containers. Authentication is the key/token
//! pair passed as query parameters on every request.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use leadsync_core::config::{Secret, TrelloConfig};
use leadsync_core::{ContainerId, ErrorClass, NewTask, Task, TaskId, TaskPatch, TaskStore};

use crate::error::ClientError;

pub const TRELLO_API: &str = "https://api.trello.com/1";

const SERVICE: &str = "trello";
const CARD_FIELDS: &str = "id,name,desc,idList";

#[derive(Debug, Deserialize)]
struct Card {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    desc: String,
    #[serde(rename = "idList")]
    id_list: String,
}

impl From<Card> for Task {
    fn from(card: Card) -> Self {
        Task {
            task_id: TaskId(card.id),
            title: card.name,
            description: card.desc,
            container: ContainerId(card.id_list),
        }
    }
}

pub struct TrelloTaskStore {
    agent: ureq::Agent,
    base_url: String,
    key: Secret,
    token: Secret,
    board_id: String,
}

impl std::fmt::Debug for TrelloTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrelloTaskStore")
            .field("base_url", &self.base_url)
            .field("board_id", &self.board_id)
            .finish_non_exhaustive()
    }
}

impl TrelloTaskStore {
    pub fn new(config: &TrelloConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
            base_url: TRELLO_API.to_string(),
            key: config.key.clone(),
            token: config.token.clone(),
            board_id: config.board_id.clone(),
        }
    }

    /// Point at another API root (a proxy or a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}{path}", self.base_url))
            .query("key", self.key.expose())
            .query("token", self.token.expose())
    }
}

/// JSON body for a partial card update; only the set fields are sent.
fn patch_body(patch: &TaskPatch) -> Value {
    let mut body = Map::new();
    if let Some(title) = &patch.title {
        body.insert("name".to_string(), json!(title));
    }
    if let Some(description) = &patch.description {
        body.insert("desc".to_string(), json!(description));
    }
    if let Some(container) = &patch.container {
        body.insert("idList".to_string(), json!(container.0));
    }
    Value::Object(body)
}

impl TaskStore for TrelloTaskStore {
    type Error = ClientError;

    fn create(&self, task: &NewTask) -> Result<TaskId, ClientError> {
        let card: Card = self
            .request("POST", "/cards")
            .send_json(json!({
                "name": task.title,
                "desc": task.description,
                "idList": task.container.0,
            }))
            .map_err(|e| ClientError::from_ureq(SERVICE, e))?
            .into_json()
            .map_err(|e| ClientError::decode(SERVICE, e))?;
        tracing::debug!("trello: created card {} in list {}", card.id, card.id_list);
        Ok(TaskId(card.id))
    }

    fn update(&self, task_id: &TaskId, patch: &TaskPatch) -> Result<(), ClientError> {
        self.request("PUT", &format!("/cards/{task_id}"))
            .send_json(patch_body(patch))
            .map_err(|e| ClientError::from_ureq(SERVICE, e))?;
        tracing::debug!("trello: updated card {task_id} ({})", patch.fields().join(", "));
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<Task>, ClientError> {
        let cards: Vec<Card> = self
            .request("GET", &format!("/boards/{}/cards", self.board_id))
            .query("fields", CARD_FIELDS)
            .call()
            .map_err(|e| ClientError::from_ureq(SERVICE, e))?
            .into_json()
            .map_err(|e| ClientError::decode(SERVICE, e))?;
        Ok(cards.into_iter().map(Task::from).collect())
    }

    fn fetch_one(&self, task_id: &TaskId) -> Result<Option<Task>, ClientError> {
        let response = match self
            .request("GET", &format!("/cards/{task_id}"))
            .query("fields", CARD_FIELDS)
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(e) => return Err(ClientError::from_ureq(SERVICE, e)),
        };
        let card: Card = response
            .into_json()
            .map_err(|e| ClientError::decode(SERVICE, e))?;
        Ok(Some(card.into()))
    }

    fn classify(&self, error: &ClientError) -> ErrorClass {
        error.classify()
    }
}
