//! HTTP client for the document API.
//!
//! Every request carries the configured bearer token. Status handling:
//! `401` is [`RemoteError::AuthRequired`], `404` on a single-document read
//! is `None` and elsewhere [`RemoteError::NotFound`], any other non-success
//! status is [`RemoteError::Api`].

use crate::config::LockboxConfig;
use crate::database::{Document, DocumentDatabase, Query};
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// [`DocumentDatabase`] over the lockbox document REST API.
pub struct HttpDocumentDatabase {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct InsertResponse {
    id: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    documents: Vec<Document>,
}

impl HttpDocumentDatabase {
    pub fn new(config: &LockboxConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn documents_url(&self, collection: &str) -> String {
        format!("{}/v1/collections/{collection}/documents", self.base_url)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{id}", self.documents_url(collection))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> RemoteResult<Response> {
        let resp = self.authed(builder).send().await?;
        match resp.status() {
            StatusCode::UNAUTHORIZED => Err(RemoteError::AuthRequired),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(what.to_string())),
            _ => resp
                .error_for_status()
                .map_err(|e| RemoteError::Api(e.to_string())),
        }
    }
}

#[async_trait]
impl DocumentDatabase for HttpDocumentDatabase {
    async fn insert(&self, collection: &str, data: Value) -> RemoteResult<String> {
        let resp = self
            .send(
                self.client.post(self.documents_url(collection)).json(&data),
                collection,
            )
            .await?;
        let InsertResponse { id } = resp.json().await?;
        debug!("inserted {collection}/{id}");
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> RemoteResult<()> {
        self.send(
            self.client.put(self.document_url(collection, id)).json(&data),
            &format!("{collection}/{id}"),
        )
        .await?;
        debug!("set {collection}/{id}");
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<Document>> {
        let result = self
            .send(
                self.client.get(self.document_url(collection, id)),
                &format!("{collection}/{id}"),
            )
            .await;

        match result {
            Ok(resp) => Ok(Some(resp.json().await?)),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn query(&self, collection: &str, query: &Query) -> RemoteResult<Vec<Document>> {
        let url = format!("{}/v1/collections/{collection}/query", self.base_url);
        let resp = self
            .send(self.client.post(url).json(query), collection)
            .await?;
        let QueryResponse { documents } = resp.json().await?;
        debug!("query on {collection} returned {} documents", documents.len());
        Ok(documents)
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> RemoteResult<()> {
        self.send(
            self.client.patch(self.document_url(collection, id)).json(&data),
            &format!("{collection}/{id}"),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        self.send(
            self.client.delete(self.document_url(collection, id)),
            &format!("{collection}/{id}"),
        )
        .await?;
        debug!("deleted {collection}/{id}");
        Ok(())
    }
}
