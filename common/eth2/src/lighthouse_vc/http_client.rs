use super::{std_types::*, BEARER_PREFIX};
use crate::{ok_or_error, Error};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    IntoUrl,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::Path;

pub use reqwest;
pub use reqwest::{Response, StatusCode, Url};

/// A wrapper around `reqwest::Client` which provides convenience methods for interfacing with the
/// key-manager API served by the validator client (`validator_client/src/http_api`).
#[derive(Clone)]
pub struct ValidatorClientHttpClient {
    client: reqwest::Client,
    server: Url,
    api_token: Option<String>,
    authorization_header: bool,
}

impl ValidatorClientHttpClient {
    pub fn new(server: Url, api_token: Option<String>) -> Self {
        Self::from_components(server, reqwest::Client::new(), api_token)
    }

    pub fn from_components(server: Url, client: reqwest::Client, api_token: Option<String>) -> Self {
        Self {
            client,
            server,
            api_token,
            authorization_header: true,
        }
    }

    /// Get a reference to this client's API token, if any.
    pub fn api_token(&self) -> Option<&String> {
        self.api_token.as_ref()
    }

    /// Read an API token from the specified `path`, stripping any trailing whitespace.
    pub fn load_api_token_from_file(path: &Path) -> Result<String, Error> {
        let token = fs::read_to_string(path).map_err(|e| Error::TokenReadError(path.into(), e))?;
        Ok(token.trim_end().to_string())
    }

    /// Enable or disable the `Authorization` header on subsequent requests.
    pub fn send_authorization_header(&mut self, should_send: bool) {
        self.authorization_header = should_send;
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if self.authorization_header {
            if let Some(header_value) = self
                .api_token
                .as_ref()
                .and_then(|token| HeaderValue::from_str(&format!("{}{}", BEARER_PREFIX, token)).ok())
            {
                headers.insert("Authorization", header_value);
            }
        }

        headers
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(Error::InvalidJson)
    }

    /// Perform a HTTP GET request.
    async fn get<T: DeserializeOwned, U: IntoUrl>(&self, url: U) -> Result<T, Error> {
        let response = self
            .client
            .get(url)
            .headers(self.headers())
            .send()
            .await?;
        let response = ok_or_error(response).await?;
        Self::json(response).await
    }

    /// Perform a HTTP POST request.
    async fn post<T: Serialize, U: IntoUrl, V: DeserializeOwned>(
        &self,
        url: U,
        body: &T,
    ) -> Result<V, Error> {
        let response = self
            .client
            .post(url)
            .headers(self.headers())
            .json(body)
            .send()
            .await?;
        let response = ok_or_error(response).await?;
        Self::json(response).await
    }

    /// Perform a HTTP DELETE request with a JSON body.
    async fn delete_with_response<T: Serialize, U: IntoUrl, V: DeserializeOwned>(
        &self,
        url: U,
        body: &T,
    ) -> Result<V, Error> {
        let response = self
            .client
            .delete(url)
            .headers(self.headers())
            .json(body)
            .send()
            .await?;
        let response = ok_or_error(response).await?;
        Self::json(response).await
    }

    fn make_keystores_url(&self) -> Result<Url, Error> {
        self.make_eth_v1_url("keystores")
    }

    fn make_remotekeys_url(&self) -> Result<Url, Error> {
        self.make_eth_v1_url("remotekeys")
    }

    fn make_eth_v1_url(&self, endpoint: &str) -> Result<Url, Error> {
        let mut url = self.server.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.clone()))?
            .push("eth")
            .push("v1")
            .push(endpoint);
        Ok(url)
    }

    /// `GET eth/v1/keystores`
    pub async fn get_keystores(&self) -> Result<ListKeystoresResponse, Error> {
        let url = self.make_keystores_url()?;
        self.get(url).await
    }

    /// `DELETE eth/v1/keystores`
    pub async fn delete_keystores(
        &self,
        req: &DeleteKeystoresRequest,
    ) -> Result<DeleteKeystoresResponse, Error> {
        let url = self.make_keystores_url()?;
        self.delete_with_response(url, req).await
    }

    /// `GET eth/v1/remotekeys`
    pub async fn get_remotekeys(&self) -> Result<ListRemotekeysResponse, Error> {
        let url = self.make_remotekeys_url()?;
        self.get(url).await
    }

    /// `POST eth/v1/remotekeys`
    pub async fn post_remotekeys(
        &self,
        req: &ImportRemotekeysRequest,
    ) -> Result<ImportRemotekeysResponse, Error> {
        let url = self.make_remotekeys_url()?;
        self.post(url, req).await
    }

    /// `DELETE eth/v1/remotekeys`
    pub async fn delete_remotekeys(
        &self,
        req: &DeleteRemotekeysRequest,
    ) -> Result<DeleteRemotekeysResponse, Error> {
        let url = self.make_remotekeys_url()?;
        self.delete_with_response(url, req).await
    }
}
