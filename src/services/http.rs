//! Shared HTTP plumbing for the external collaborators.
//!
//! Every outbound call goes through a client with an explicit timeout and is
//! wrapped in [`with_single_retry`], so a hung or flaky service can cost at most
//! two timeouts before the error is shown to the user.

use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ServiceError;

/// Longest response body excerpt kept in a status error.
const BODY_EXCERPT_CHARS: usize = 300;

/// Build a blocking client with a per-request timeout.
pub fn build_client(timeout: Duration) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {e}")))
}

/// Map a reqwest error onto the retry taxonomy.
pub fn classify_error(err: &reqwest::Error, timeout: Duration) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout(timeout)
    } else if err.is_decode() {
        ServiceError::Decode(err.to_string())
    } else {
        ServiceError::Transport(err.to_string())
    }
}

/// POST `body` as JSON and decode the JSON response.
pub fn post_json<B, R>(
    client: &Client,
    url: &str,
    bearer: Option<&str>,
    body: &B,
    timeout: Duration,
) -> Result<R, ServiceError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut req = client.post(url).json(body);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }

    debug!("POST {url}");
    let resp = req.send().map_err(|e| classify_error(&e, timeout))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body: excerpt(&body),
        });
    }

    resp.json::<R>().map_err(|e| {
        if e.is_timeout() {
            ServiceError::Timeout(timeout)
        } else {
            ServiceError::Decode(e.to_string())
        }
    })
}

/// Run `call`, and run it once more if the first failure is retryable.
pub fn with_single_retry<T>(
    label: &str,
    mut call: impl FnMut() -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match call() {
        Err(err) if err.is_retryable() => {
            warn!("{label} failed ({err}); retrying once");
            call()
        }
        other => other,
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_failure_then_success() {
        let mut calls = 0;
        let out = with_single_retry("test", || {
            calls += 1;
            if calls == 1 {
                Err(ServiceError::Timeout(Duration::from_secs(1)))
            } else {
                Ok(42)
            }
        });
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls, 2);
    }

    #[test]
    fn two_retryable_failures_fail() {
        let mut calls = 0;
        let out: Result<(), _> = with_single_retry("test", || {
            calls += 1;
            Err(ServiceError::Status {
                status: 503,
                body: String::new(),
            })
        });
        assert!(matches!(out, Err(ServiceError::Status { status: 503, .. })));
        assert_eq!(calls, 2);
    }

    #[test]
    fn non_retryable_failure_is_not_retried() {
        let mut calls = 0;
        let out: Result<(), _> = with_single_retry("test", || {
            calls += 1;
            Err(ServiceError::Status {
                status: 401,
                body: "bad key".into(),
            })
        });
        assert!(out.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn success_is_not_repeated() {
        let mut calls = 0;
        let out = with_single_retry("test", || {
            calls += 1;
            Ok::<_, ServiceError>("done")
        });
        assert_eq!(out.unwrap(), "done");
        assert_eq!(calls, 1);
    }

    #[test]
    fn long_bodies_are_cut() {
        let body = "x".repeat(1000);
        let cut = excerpt(&body);
        assert_eq!(cut.chars().count(), BODY_EXCERPT_CHARS + 1);
        assert_eq!(excerpt("  short \n"), "short");
    }
}
