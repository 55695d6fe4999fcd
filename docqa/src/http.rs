use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;
use std::time::Duration;

use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub fn post_json<T: DeserializeOwned, B: Serialize>(
    url: &str,
    bearer: Option<&str>,
    body: &B,
) -> Result<T> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let mut req = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .json(body);
    if let Some(token) = bearer {
        req = req.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let resp = req.send()?;
    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    if !status.is_success() {
        return Err(Error::Api {
            method: "POST",
            url: url.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }
    from_str::<T>(&text).map_err(|e| Error::Decode {
        url: url.to_string(),
        message: format!("{} | {}", e, text),
    })
}
