use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::api::note::{CreateNoteRequest, Note, NotesPage, UpdateNoteRequest};
use crate::config::Config;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response, or the body could not
    /// be decoded: DNS failure, refused connection, timeout, bad JSON.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },
}

/// Shape of NoteHub error bodies, e.g. `{"message": "Note not found"}`.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Thin wrapper over one `reqwest::Client` that owns the base URL and the
/// bearer token. Cloning is cheap; tasks that talk to the API take a clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(ApiClient {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    /// `GET /notes` with pagination and an optional search term. The search
    /// parameter is absent from the URL when there is no term, not sent as
    /// an empty string.
    pub async fn fetch_notes(
        &self,
        page: u32,
        per_page: u32,
        search: Option<&str>,
    ) -> Result<NotesPage, ApiError> {
        let response = self
            .http
            .get(format!("{}/notes", self.base_url))
            .bearer_auth(&self.token)
            .query(&list_params(page, per_page, search))
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    /// `GET /notes/{id}`.
    pub async fn fetch_note(&self, id: &str) -> Result<Note, ApiError> {
        let response = self
            .http
            .get(format!("{}/notes/{}", self.base_url, id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    /// `POST /notes`. Returns the stored note with its server-assigned id.
    pub async fn create_note(&self, request: &CreateNoteRequest) -> Result<Note, ApiError> {
        let response = self
            .http
            .post(format!("{}/notes", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    /// `PATCH /notes/{id}`. Fields missing from the request stay unchanged.
    pub async fn update_note(
        &self,
        id: &str,
        request: &UpdateNoteRequest,
    ) -> Result<Note, ApiError> {
        let response = self
            .http
            .patch(format!("{}/notes/{}", self.base_url, id))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    /// `DELETE /notes/{id}`. Returns the removed note.
    pub async fn delete_note(&self, id: &str) -> Result<Note, ApiError> {
        let response = self
            .http
            .delete(format!("{}/notes/{}", self.base_url, id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }
}

fn list_params(page: u32, per_page: u32, search: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("page", page.to_string()),
        ("perPage", per_page.to_string()),
    ];
    if let Some(term) = search {
        params.push(("search", term.to_string()));
    }
    params
}

/// Turn a non-success response into `ApiError::Status`, pulling the
/// human-readable message out of the JSON body when the server sent one.
async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status,
        message: status_message(status, &body),
    })
}

fn status_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_include_search_only_when_present() {
        let with = list_params(2, 12, Some("groceries"));
        assert_eq!(
            with,
            vec![
                ("page", "2".to_string()),
                ("perPage", "12".to_string()),
                ("search", "groceries".to_string()),
            ]
        );

        let without = list_params(1, 12, None);
        assert!(without.iter().all(|(name, _)| *name != "search"));
    }

    #[test]
    fn status_message_prefers_server_body() {
        let message = status_message(
            StatusCode::UNAUTHORIZED,
            r#"{"message": "Invalid or missing token"}"#,
        );
        assert_eq!(message, "Invalid or missing token");
    }

    #[test]
    fn status_message_falls_back_to_status_line() {
        let message = status_message(StatusCode::BAD_GATEWAY, "<html>nginx</html>");
        assert_eq!(message, "502 Bad Gateway");
    }

    #[test]
    fn errors_display_without_noise() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Note not found".into(),
        };
        assert_eq!(err.to_string(), "Note not found");
    }
}
