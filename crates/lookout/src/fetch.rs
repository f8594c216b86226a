use std::io;

use http::StatusCode;
use isahc::config::{Configurable, RedirectPolicy};
use isahc::{ReadResponseExt, RequestExt};
use thiserror::Error;
use url::Url;

pub(crate) const USER_AGENT: &str = concat!("lookout/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error")]
    Network(#[from] NetworkError),

    #[error("server responded with {0}")]
    Status(StatusCode),
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("isahc error")]
    Isahc(#[from] isahc::error::Error),

    #[error("http error")]
    Http(#[from] http::Error),

    #[error("failed to perform i/o")]
    Io(#[from] io::Error),
}

/// Something that can retrieve the current text of a page.
pub trait Fetch {
    fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Fetches pages over HTTP with the default Isahc client.
///
/// Redirects are followed. No timeout is configured; a stalled server stalls
/// the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        tracing::info!("GET {}", url.as_str());

        let mut response = isahc::Request::get(url.as_str())
            .header("user-agent", USER_AGENT)
            .redirect_policy(RedirectPolicy::Follow)
            .body(())
            .map_err(NetworkError::Http)?
            .send()
            .map_err(NetworkError::Isahc)?;

        let status = response.status();
        tracing::debug!(%status, "received response");

        // 4xx and 5xx count as a failed request, same as a dropped connection.
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status(status));
        }

        let text = response.text().map_err(NetworkError::Io)?;
        Ok(text)
    }
}
