use std::time::Duration;

use tracing::info;

use crate::error::{EtlError, Result};

const USER_AGENT: &str = concat!("table_etl/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(60);

/// GET `url` and return the body. Any non-2xx status is `FetchUnavailable`.
pub fn fetch_text(url: &str) -> Result<String> {
    info!("Fetching {}", url);
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(TIMEOUT)
        .build()?;
    let response = client.get(url).send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(EtlError::FetchUnavailable {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text()?)
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reads `source` over HTTP when it is a URL, from disk otherwise.
pub fn read_source(source: &str) -> Result<String> {
    if is_remote(source) {
        fetch_text(source)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}
