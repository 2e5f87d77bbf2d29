//! JSON-over-HTTP gateway for the REST backend.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ApiError, SectionApi, SectionPage, TaskApi, TaskPage, UserDirectory};
use crate::model::{
    DeleteMode, FilterState, Section, SectionId, ServerConfig, Task, TaskFields, User,
};

/// Blocking HTTP client for the task backend
pub struct HttpRemote {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct NameBody<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct OrderBody<'a, T: Serialize> {
    ordered: &'a [T],
}

#[derive(Serialize)]
struct MoveBody {
    from: SectionId,
    to: SectionId,
    dest_index: usize,
}

#[derive(Serialize)]
struct BulkBody<'a> {
    ids: &'a [u64],
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a TaskFields>,
}

#[derive(Deserialize)]
struct TaskEnvelope {
    task: Task,
}

#[derive(Deserialize)]
struct TasksEnvelope {
    tasks: Vec<Task>,
}

#[derive(Deserialize)]
struct SectionEnvelope {
    section: Section,
}

impl HttpRemote {
    /// Build a client from the `[server]` config; the token comes from the
    /// environment variable it names
    pub fn from_config(config: &ServerConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        HttpRemote {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let mut req = self
            .agent
            .request(method, &self.url(path))
            .set("Accept", "application/json")
            .set("User-Agent", concat!("taskdeck/", env!("CARGO_PKG_VERSION")));
        if let Some(token) = &self.token {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }
        req
    }

    fn send<T: DeserializeOwned>(
        &self,
        req: ureq::Request,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let url = req.url().to_string();
        tracing::debug!(method = req.method(), %url, "http request");
        let result = match body {
            Some(json) => req.send_json(json),
            None => req.call(),
        };
        let response = result.map_err(map_error)?;
        response
            .into_json::<T>()
            .map_err(|e| ApiError::Decode(format!("{}: {}", url, e)))
    }

    fn send_ack(&self, req: ureq::Request, body: Option<serde_json::Value>) -> Result<(), ApiError> {
        let result = match body {
            Some(json) => req.send_json(json),
            None => req.call(),
        };
        result.map(|_| ()).map_err(map_error)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

fn map_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(404, response) => ApiError::NotFound(response.get_url().to_string()),
        ureq::Error::Status(status, response) => {
            let message = response
                .into_string()
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            ApiError::Rejected { status, message }
        }
        ureq::Error::Transport(t) => ApiError::Network(t.to_string()),
    }
}

impl TaskApi for HttpRemote {
    fn list_tasks(
        &self,
        section: SectionId,
        page: u32,
        filter: &FilterState,
    ) -> Result<TaskPage, ApiError> {
        let mut req = self
            .request("GET", &format!("/sections/{}/tasks", section))
            .query("page", &page.to_string());
        for (key, value) in filter.to_query() {
            req = req.query(&key, &value);
        }
        self.send(req, None)
    }

    fn create_task(&self, section: SectionId, fields: &TaskFields) -> Result<Task, ApiError> {
        let req = self.request("POST", &format!("/sections/{}/tasks", section));
        let env: TaskEnvelope = self.send(req, Some(to_json(fields)?))?;
        Ok(env.task)
    }

    fn update_task(&self, task: u64, fields: &TaskFields) -> Result<Task, ApiError> {
        let req = self.request("PATCH", &format!("/tasks/{}", task));
        let env: TaskEnvelope = self.send(req, Some(to_json(fields)?))?;
        Ok(env.task)
    }

    fn delete_task(&self, task: u64) -> Result<(), ApiError> {
        self.send_ack(self.request("DELETE", &format!("/tasks/{}", task)), None)
    }

    fn reorder_tasks(&self, section: SectionId, ordered: &[u64]) -> Result<(), ApiError> {
        let req = self.request("PUT", &format!("/sections/{}/tasks/order", section));
        self.send_ack(req, Some(to_json(&OrderBody { ordered })?))
    }

    fn move_task(
        &self,
        task: u64,
        from: SectionId,
        to: SectionId,
        dest_index: usize,
    ) -> Result<(), ApiError> {
        let req = self.request("POST", &format!("/tasks/{}/move", task));
        let body = MoveBody {
            from,
            to,
            dest_index,
        };
        self.send_ack(req, Some(to_json(&body)?))
    }

    fn bulk_delete(&self, tasks: &[u64]) -> Result<(), ApiError> {
        let req = self.request("POST", "/tasks/bulk-delete");
        let body = BulkBody {
            ids: tasks,
            fields: None,
        };
        self.send_ack(req, Some(to_json(&body)?))
    }

    fn bulk_update(&self, tasks: &[u64], fields: &TaskFields) -> Result<Vec<Task>, ApiError> {
        let req = self.request("PATCH", "/tasks/bulk");
        let body = BulkBody {
            ids: tasks,
            fields: Some(fields),
        };
        let env: TasksEnvelope = self.send(req, Some(to_json(&body)?))?;
        Ok(env.tasks)
    }
}

impl SectionApi for HttpRemote {
    fn list_sections(&self, project: u64, page: u32) -> Result<SectionPage, ApiError> {
        let req = self
            .request("GET", &format!("/projects/{}/sections", project))
            .query("page", &page.to_string());
        self.send(req, None)
    }

    fn create_section(&self, project: u64, name: &str) -> Result<Section, ApiError> {
        let req = self.request("POST", &format!("/projects/{}/sections", project));
        let env: SectionEnvelope = self.send(req, Some(to_json(&NameBody { name })?))?;
        Ok(env.section)
    }

    fn rename_section(&self, section: SectionId, name: &str) -> Result<Section, ApiError> {
        let req = self.request("PATCH", &format!("/sections/{}", section));
        let env: SectionEnvelope = self.send(req, Some(to_json(&NameBody { name })?))?;
        Ok(env.section)
    }

    fn delete_section(&self, section: SectionId, mode: DeleteMode) -> Result<(), ApiError> {
        let req = self
            .request("DELETE", &format!("/sections/{}", section))
            .query("mode", mode.as_str());
        self.send_ack(req, None)
    }

    fn reorder_sections(&self, project: u64, ordered: &[SectionId]) -> Result<(), ApiError> {
        let req = self.request("PUT", &format!("/projects/{}/sections/order", project));
        self.send_ack(req, Some(to_json(&OrderBody { ordered })?))
    }
}

impl UserDirectory for HttpRemote {
    fn users(&self, project: u64) -> Result<Vec<User>, ApiError> {
        let req = self.request("GET", &format!("/projects/{}/users", project));
        self.send(req, None)
    }
}
