//! Portal REST client
//!
//! Thin endpoint layer over [`ResilientTransport`]: builds URLs, attaches
//! filters, decodes JSON bodies, and maps non-success statuses to
//! [`Error::Api`] using the portal's structured error body when present.

use crate::config::Config;
use crate::error::{ApiErrorBody, Error, Result};
use crate::filter::MessagesFilter;
use crate::transport::ResilientTransport;
use crate::types::{Message, MessageId, Pagination};
use reqwest::{Method, Response, StatusCode};
use url::Url;

/// Message list response in the object form: records plus an embedded
/// pagination block.
#[derive(Debug, serde::Deserialize)]
struct MessagePage {
    messages: Vec<Message>,
    pagination: Pagination,
}

/// Client for the portal message API.
pub struct PortalClient {
    transport: ResilientTransport,
    base: Url,
}

impl PortalClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// `Error::Url` when the configured base URL does not parse,
    /// `Error::Network` when the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let base = Url::parse(&config.portal.base_url)?;
        let transport =
            ResilientTransport::new(config.transport.clone(), config.portal.api_token.clone())?;
        Ok(Self { transport, base })
    }

    /// Construct from an already-built transport, used by tests.
    pub fn with_transport(transport: ResilientTransport, base: Url) -> Self {
        Self { transport, base }
    }

    /// Access the underlying transport, e.g. for its cancellation token.
    pub fn transport(&self) -> &ResilientTransport {
        &self.transport
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Config {
                    message: "portal base URL cannot be a base".to_string(),
                    key: Some("portal.base_url".to_string()),
                })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// Fetch one page of messages matching `filter`.
    ///
    /// The portal answers in one of two shapes: an object carrying
    /// `messages` and `pagination`, or a bare array with pagination pushed
    /// into `X-Pagination-*` headers. Both are handled; the object form
    /// wins when present.
    pub async fn list_messages(
        &self,
        filter: &MessagesFilter,
    ) -> Result<(Vec<Message>, Pagination)> {
        let mut url = self.endpoint(&["messages"])?;
        url.set_query(Some(&filter.build()));

        let response = self.transport.execute(Method::GET, url, None).await?;
        let response = ensure_success(response).await?;

        let header_pagination = pagination_from_headers(&response);
        let body = response.text().await?;

        if let Ok(page) = serde_json::from_str::<MessagePage>(&body) {
            return Ok((page.messages, page.pagination));
        }
        let messages: Vec<Message> = serde_json::from_str(&body)?;
        let pagination = header_pagination.unwrap_or_else(|| Pagination {
            total_records: messages.len() as u64,
            total_pages: 1,
            current_page: 1,
            records_on_page: messages.len() as u32,
            records_on_next_page: None,
        });
        Ok((messages, pagination))
    }

    /// Fetch a single message by id.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` when the portal answers 404.
    pub async fn get_message(&self, id: &MessageId) -> Result<Message> {
        let url = self.endpoint(&["messages", &id.0])?;
        let response = self.transport.execute(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("message {id}")));
        }
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Download a single file payload from a message.
    pub async fn download_file(&self, message_id: &MessageId, file_id: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(&["messages", &message_id.0, "files", file_id, "download"])?;
        let response = self.transport.execute(Method::GET, url, None).await?;
        let response = ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Download the full message bundle (a zip of every file).
    pub async fn download_bundle(&self, message_id: &MessageId) -> Result<Vec<u8>> {
        let url = self.endpoint(&["messages", &message_id.0, "download"])?;
        let response = self.transport.execute(Method::GET, url, None).await?;
        let response = ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Delete a single message.
    pub async fn delete_message(&self, id: &MessageId) -> Result<()> {
        let url = self.endpoint(&["messages", &id.0])?;
        let response = self.transport.execute(Method::DELETE, url, None).await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Delete every message matching `filter`, page by page.
    ///
    /// # Errors
    ///
    /// `Error::EmptyFilter` before any network call when the filter renders
    /// to no constraints; an unconstrained delete would wipe the mailbox.
    pub async fn delete_filtered(&self, filter: &MessagesFilter) -> Result<u64> {
        if filter.is_empty() {
            return Err(Error::EmptyFilter);
        }

        let mut deleted: u64 = 0;
        loop {
            let (messages, _) = self.list_messages(filter).await?;
            if messages.is_empty() {
                break;
            }
            for message in &messages {
                self.delete_message(&message.id).await?;
                deleted += 1;
            }
        }
        tracing::info!(deleted, "filtered delete complete");
        Ok(deleted)
    }
}

/// Map a non-success response to `Error::Api`, preferring the portal's
/// structured error body when it parses.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(&body) {
        return Err(parsed.into_error(status.as_u16()));
    }
    Err(Error::Api {
        status: status.as_u16(),
        code: "http_error".to_string(),
        message: if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body
        },
    })
}

fn pagination_from_headers(response: &Response) -> Option<Pagination> {
    let get = |name: &str| -> Option<u64> {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    };
    Some(Pagination {
        total_records: get("X-Pagination-Total-Records")?,
        total_pages: get("X-Pagination-Total-Pages")? as u32,
        current_page: get("X-Pagination-Current-Page").unwrap_or(1) as u32,
        records_on_page: get("X-Pagination-Records-On-Page").unwrap_or(0) as u32,
        records_on_next_page: get("X-Pagination-Records-On-Next-Page").map(|v| v as u32),
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PortalClient {
        let config = TransportConfig {
            cooldown: Duration::from_millis(1),
            base_delay: Duration::from_millis(5),
            deadline: Duration::from_millis(200),
            request_timeout: Duration::from_secs(5),
        };
        let transport = ResilientTransport::new(config, None).unwrap();
        PortalClient::with_transport(transport, Url::parse(&server.uri()).unwrap())
    }

    fn message_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "type": "inbox",
            "creationDate": "2024-03-15T10:30:00Z",
            "status": "delivered",
            "taskName": "Report",
            "files": [],
            "receipts": []
        })
    }

    #[tokio::test]
    async fn list_messages_parses_object_form() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .and(query_param("Task", "Report"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [message_json("m-1"), message_json("m-2")],
                "pagination": {
                    "totalRecords": 2,
                    "totalPages": 1,
                    "currentPage": 1,
                    "recordsOnPage": 2,
                    "recordsOnNextPage": 0
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let filter = MessagesFilter {
            task: Some("Report".to_string()),
            ..Default::default()
        };
        let (messages, pagination) = client.list_messages(&filter).await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id.0, "m-1");
        assert_eq!(pagination.total_pages, 1);
        assert!(!pagination.has_next());
    }

    #[tokio::test]
    async fn list_messages_parses_array_form_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([message_json("m-1")]))
                    .insert_header("X-Pagination-Total-Records", "5")
                    .insert_header("X-Pagination-Total-Pages", "5")
                    .insert_header("X-Pagination-Current-Page", "1")
                    .insert_header("X-Pagination-Records-On-Page", "1")
                    .insert_header("X-Pagination-Records-On-Next-Page", "1"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let filter = MessagesFilter {
            days: Some(7),
            ..Default::default()
        };
        let (messages, pagination) = client.list_messages(&filter).await.unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(pagination.total_pages, 5);
        assert!(pagination.has_next());
    }

    #[tokio::test]
    async fn get_message_maps_404_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.get_message(&MessageId("missing".to_string())).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn api_error_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages/bad"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "error": { "code": "VALIDATION", "message": "task name unknown" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .get_message(&MessageId("bad".to_string()))
            .await
            .unwrap_err();

        match err {
            Error::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 422);
                assert_eq!(code, "VALIDATION");
                assert_eq!(message, "task name unknown");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn download_bundle_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages/m-9/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04bundle".to_vec()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let bytes = client
            .download_bundle(&MessageId("m-9".to_string()))
            .await
            .unwrap();

        assert!(bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn delete_filtered_rejects_empty_filter_before_any_request() {
        let server = MockServer::start().await;
        // No mocks mounted: any request would 404 and fail differently.
        let client = client_for(&server);

        let result = client.delete_filtered(&MessagesFilter::default()).await;
        assert!(matches!(result, Err(Error::EmptyFilter)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_filtered_deletes_each_listed_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [message_json("a"), message_json("b")],
                "pagination": {
                    "totalRecords": 2, "totalPages": 1, "currentPage": 1,
                    "recordsOnPage": 2, "recordsOnNextPage": 0
                }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [],
                "pagination": {
                    "totalRecords": 0, "totalPages": 0, "currentPage": 1,
                    "recordsOnPage": 0, "recordsOnNextPage": 0
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/messages/a"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/messages/b"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let filter = MessagesFilter {
            task: Some("Report".to_string()),
            ..Default::default()
        };
        let deleted = client.delete_filtered(&filter).await.unwrap();
        assert_eq!(deleted, 2);
    }
}
