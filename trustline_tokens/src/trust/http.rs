//! A trust channel that exchanges requests with a token service over HTTP

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use super::{RequestSecurityToken, RequestSecurityTokenResponse, TrustChannel};

/// An error while attempting to request a token from the token service
#[derive(Debug, Error)]
pub enum TrustRequestError {
    /// An error from the token service with an error body
    #[error("error requesting token from issuer: {body}")]
    ErrorWithBody {
        /// The underlying request error
        source: reqwest::Error,
        /// The body of the error
        body: String,
    },
    /// Unable to deserialize the response body
    #[error("error deserializing response body from issuer")]
    ResponseBody(#[from] serde_json::Error),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyReadError(reqwest::Error),
    /// Unable to send a request to the token service
    #[error("error sending request to issuer")]
    RequestSend(reqwest::Error),
}

/// A trust channel bound to a single issuer address
#[derive(Clone, Debug)]
pub struct HttpTrustChannel {
    client: reqwest::Client,
    issuer_address: Url,
    timeout: Option<Duration>,
}

impl HttpTrustChannel {
    /// Constructs a new channel to the issuer at `issuer_address`
    pub fn new(client: reqwest::Client, issuer_address: Url) -> Self {
        Self {
            client,
            issuer_address,
            timeout: None,
        }
    }

    /// Applies a timeout to each request sent over this channel
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The issuer address this channel sends requests to
    pub fn issuer_address(&self) -> &Url {
        &self.issuer_address
    }

    /// The timeout applied to each request, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl TrustChannel for HttpTrustChannel {
    type Error = TrustRequestError;

    #[tracing::instrument(
        err,
        skip(self, request),
        fields(
            issuer = %self.issuer_address,
            applies_to = %request.applies_to,
            has_act_as = request.act_as.is_some(),
            has_on_behalf_of = request.on_behalf_of.is_some(),
        ),
    )]
    async fn issue(
        &self,
        request: &RequestSecurityToken,
    ) -> Result<RequestSecurityTokenResponse, Self::Error> {
        tracing::trace!("requesting token from issuer");

        let mut req = self.client.post(self.issuer_address.clone()).json(request);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await.map_err(TrustRequestError::RequestSend)?;

        tracing::debug!(
            response.status = resp.status().as_u16(),
            "received token response from issuer"
        );

        if let Err(error) = resp.error_for_status_ref() {
            let body = resp
                .text()
                .await
                .map_err(TrustRequestError::BodyReadError)?;
            return Err(TrustRequestError::ErrorWithBody {
                source: error,
                body,
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(TrustRequestError::BodyReadError)?;
        let rstr: RequestSecurityTokenResponse = serde_json::from_slice(&body)?;

        tracing::info!(
            created = rstr.lifetime.created.0,
            expires = rstr.lifetime.expires.0,
            "received new token"
        );

        Ok(rstr)
    }
}

#[cfg(test)]
mod tests {
    use aliri_clock::UnixTime;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use color_eyre::Result;
    use tokio::net::TcpListener;

    use super::*;
    use crate::trust::Lifetime;

    async fn serve(app: Router) -> Result<Url> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        tokio::spawn(async move { axum::serve(listener, app).await });
        Ok(Url::parse(&format!("http://{address}/issue"))?)
    }

    fn request() -> Result<RequestSecurityToken> {
        Ok(RequestSecurityToken::issue(Url::parse(
            "http://localhost/service",
        )?))
    }

    #[tokio::test]
    async fn issues_token_scoped_to_requested_service() -> Result<()> {
        let app = Router::new().route(
            "/issue",
            post(|Json(rst): Json<RequestSecurityToken>| async move {
                Json(RequestSecurityTokenResponse {
                    requested_security_token: format!("for {}", rst.applies_to).into(),
                    lifetime: Lifetime {
                        created: UnixTime(100),
                        expires: UnixTime(400),
                    },
                    token_type: None,
                })
            }),
        );
        let channel = HttpTrustChannel::new(reqwest::Client::new(), serve(app).await?);

        let rstr = channel.issue(&request()?).await?;

        assert_eq!(
            rstr.requested_security_token.as_str(),
            "for http://localhost/service"
        );
        assert_eq!(rstr.lifetime.expires, UnixTime(400));
        Ok(())
    }

    #[tokio::test]
    async fn error_status_keeps_response_body() -> Result<()> {
        let app = Router::new().route(
            "/issue",
            post(|| async { (StatusCode::FORBIDDEN, "caller may not act as this identity") }),
        );
        let channel = HttpTrustChannel::new(reqwest::Client::new(), serve(app).await?);

        let err = channel.issue(&request()?).await.unwrap_err();

        match err {
            TrustRequestError::ErrorWithBody { source, body } => {
                assert_eq!(source.status(), Some(reqwest::StatusCode::FORBIDDEN));
                assert_eq!(body, "caller may not act as this identity");
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn malformed_response_is_body_error() -> Result<()> {
        let app = Router::new().route("/issue", post(|| async { "not a token response" }));
        let channel = HttpTrustChannel::new(reqwest::Client::new(), serve(app).await?);

        let err = channel.issue(&request()?).await.unwrap_err();

        assert!(matches!(err, TrustRequestError::ResponseBody(_)));
        Ok(())
    }

    #[tokio::test]
    async fn slow_issuer_times_out() -> Result<()> {
        let app = Router::new().route(
            "/issue",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }),
        );
        let channel = HttpTrustChannel::new(reqwest::Client::new(), serve(app).await?)
            .with_timeout(Duration::from_millis(100));

        let err = channel.issue(&request()?).await.unwrap_err();

        match err {
            TrustRequestError::RequestSend(source) => assert!(source.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }
}
