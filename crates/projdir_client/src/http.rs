use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use uuid::Uuid;

use crate::{TrackerError, ViewCount, ViewIncrementer};

/// `ViewIncrementer` backed by `POST /api/projects/:id/views`.
#[derive(Debug, Clone)]
pub struct HttpViewClient {
    base_url: String,
    client: Client,
}

impl HttpViewClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Uses a caller-built client, e.g. one with a request timeout.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn views_url(&self, project_id: Uuid) -> String {
        format!("{}/api/projects/{}/views", self.base_url, project_id)
    }
}

#[async_trait]
impl ViewIncrementer for HttpViewClient {
    async fn increment(&self, project_id: Uuid) -> Result<ViewCount, TrackerError> {
        let response = self.client.post(self.views_url(project_id)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(TrackerError::NotFound(project_id)),
            status if !status.is_success() => Err(TrackerError::Status(status.as_u16())),
            _ => Ok(response.json::<ViewCount>().await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HttpViewClient;
    use uuid::Uuid;

    #[test]
    fn views_url_ignores_trailing_slash() {
        let id = Uuid::nil();
        let client = HttpViewClient::new("http://localhost:8080/");
        assert_eq!(
            client.views_url(id),
            format!("http://localhost:8080/api/projects/{id}/views")
        );
    }
}
