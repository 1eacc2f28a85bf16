//! Blocking JSON client for the license server.

use std::time::Duration;

use serde::Serialize;
use ureq::Agent;

use crate::error::{Error, Result};

/// Endpoint paths. These are part of the wire contract with the server.
pub const ENDPOINT_ACTIVATE: &str = "/activate";
pub const ENDPOINT_ACTIVATE_TRIAL: &str = "/activate-trial";
pub const ENDPOINT_UPDATE_ACTIVATIONS: &str = "/update-activations";
pub const ENDPOINT_PING: &str = "/ping";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const GET_READ_TIMEOUT: Duration = Duration::from_secs(1);
const POST_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// A server reply: status code plus raw body.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub body: String,
}

impl Response {
    pub fn is_informational(&self) -> bool {
        (100..=199).contains(&self.status_code)
    }

    pub fn is_successful(&self) -> bool {
        (200..=299).contains(&self.status_code)
    }

    pub fn is_redirection(&self) -> bool {
        (300..=399).contains(&self.status_code)
    }

    pub fn is_client_error(&self) -> bool {
        (400..=499).contains(&self.status_code)
    }

    pub fn is_server_error(&self) -> bool {
        (500..=599).contains(&self.status_code)
    }

    /// Converts a non-2xx reply into a typed failure carrying status and
    /// body.
    pub fn error_for_status(self) -> Result<Response> {
        if self.is_successful() {
            Ok(self)
        } else {
            Err(Error::Server {
                status: self.status_code,
                body: self.body,
            })
        }
    }
}

/// Minimal REST client bound to one server address.
///
/// Redirects are disabled and a reply of *any* status is returned as a
/// [`Response`]; only the absence of a reply (refused connection, timeout)
/// is an error.
pub struct RestClient {
    agent: Agent,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: &str) -> Self {
        let config = Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .max_redirects(0)
            .http_status_as_error(false)
            .user_agent(concat!("keygate-sdk-rust/", env!("CARGO_PKG_VERSION")))
            .build();

        Self {
            agent: Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POSTs `body` as JSON and returns whatever the server replies.
    pub fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .agent
            .post(&url)
            .config()
            .timeout_recv_response(Some(POST_READ_TIMEOUT))
            .build()
            .header("Content-Type", "application/json")
            .send_json(body)
            .map_err(|e| Error::Transport(e.to_string()))?;

        read_response(response)
    }

    /// GETs `path` and returns whatever the server replies.
    pub fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .agent
            .get(&url)
            .config()
            .timeout_recv_response(Some(GET_READ_TIMEOUT))
            .build()
            .call()
            .map_err(|e| Error::Transport(e.to_string()))?;

        read_response(response)
    }
}

fn read_response(response: ureq::http::Response<ureq::Body>) -> Result<Response> {
    let status_code = response.status().as_u16();
    let body = response
        .into_body()
        .read_to_string()
        .map_err(|e| Error::Transport(e.to_string()))?;

    Ok(Response { status_code, body })
}
