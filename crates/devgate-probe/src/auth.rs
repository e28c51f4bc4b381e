use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ProbeError;

pub const LOGIN_PATH: &str = "/api/auth/login/";
const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: Option<String>,
}

/// Log in against the backend and return the access token
pub async fn login(base_url: &str, email: &str, password: &str) -> Result<String, ProbeError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), LOGIN_PATH);
    debug!("Logging in as {} at {}", email, url);

    let client = reqwest::Client::builder().timeout(LOGIN_TIMEOUT).build()?;
    let response = client
        .post(&url)
        .json(&LoginRequest { email, password })
        .send()
        .await?;

    let status = response.status();
    println!("Login status: {}", status.as_u16());

    if status != reqwest::StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(ProbeError::LoginRejected {
            status: status.as_u16(),
            body,
        });
    }

    let token = response
        .json::<LoginResponse>()
        .await?
        .access
        .filter(|token| !token.is_empty())
        .ok_or(ProbeError::MissingAccessToken)?;

    info!("Obtained access token for {}", email);
    Ok(token)
}
