//! Thin typed client over the Pressroom REST API.

use pressroom_api_types::{
    ErrorBody, PageWriteRequest, PublishRequest, ResourceDocument, SearchResultDocument,
};
use reqwest::{Response, StatusCode, header};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("invalid date `{0}`: expected RFC 3339")]
    InvalidDate(String),
}

pub struct Client {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl Client {
    pub fn new(server: &str, token: Option<String>) -> Result<Self, ClientError> {
        let base = Url::parse(server)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            token,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => String::from("no error detail"),
        };
        Err(ClientError::Api { status, message })
    }

    pub async fn get_page(
        &self,
        id: Uuid,
        version: Option<&str>,
    ) -> Result<ResourceDocument, ClientError> {
        let mut url = self.url(&format!("api/pages/{id}"))?;
        if let Some(version) = version {
            url.query_pairs_mut().append_pair("version", version);
        }
        let response = self.request(reqwest::Method::GET, url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn create_page(
        &self,
        request: &PageWriteRequest,
    ) -> Result<ResourceDocument, ClientError> {
        let url = self.url("api/pages")?;
        let response = self
            .request(reqwest::Method::POST, url)
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Replace a draft, round-tripping the current entity tag.
    pub async fn update_page(
        &self,
        id: Uuid,
        request: &PageWriteRequest,
    ) -> Result<ResourceDocument, ClientError> {
        let current = self.get_page(id, None).await?;
        let url = self.url(&format!("api/pages/{id}"))?;
        let response = self
            .request(reqwest::Method::PUT, url)
            .header(header::IF_MATCH, current.etag)
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn delete_page(&self, id: Uuid) -> Result<(), ClientError> {
        let current = self.get_page(id, None).await?;
        let url = self.url(&format!("api/pages/{id}"))?;
        let response = self
            .request(reqwest::Method::DELETE, url)
            .header(header::IF_MATCH, current.etag)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn lock_page(&self, id: Uuid) -> Result<ResourceDocument, ClientError> {
        let url = self.url(&format!("api/pages/{id}/lock"))?;
        let response = self.request(reqwest::Method::POST, url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn unlock_page(&self, id: Uuid) -> Result<ResourceDocument, ClientError> {
        let url = self.url(&format!("api/pages/{id}/lock"))?;
        let response = self.request(reqwest::Method::DELETE, url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn publish_page(
        &self,
        id: Uuid,
        window: &PublishRequest,
    ) -> Result<ResourceDocument, ClientError> {
        let current = self.get_page(id, Some("work")).await?;
        let url = self.url(&format!("api/pages/{id}/publish"))?;
        let response = self
            .request(reqwest::Method::POST, url)
            .header(header::IF_MATCH, current.etag)
            .json(window)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn unpublish_page(&self, id: Uuid) -> Result<ResourceDocument, ClientError> {
        let current = self.get_page(id, Some("live")).await?;
        let url = self.url(&format!("api/pages/{id}/publish"))?;
        let response = self
            .request(reqwest::Method::DELETE, url)
            .header(header::IF_MATCH, current.etag)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn search(
        &self,
        params: &[(&str, String)],
    ) -> Result<SearchResultDocument, ClientError> {
        let mut url = self.url("api/search")?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in params {
                pairs.append_pair(name, value);
            }
        }
        let response = self.request(reqwest::Method::GET, url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
