//! Client contract for the external Challenge-Bypass Redemption service
//! (spec §6 "CBR client contract").

use {crate::error::CbrError, async_trait::async_trait, chrono::{DateTime, Utc}};

#[derive(Clone, Debug, Default)]
pub struct CreateIssuerParams {
    pub max_tokens: u32,
    pub cohort: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub duration: Option<String>,
    pub buffer: Option<u32>,
    pub overlap: Option<u32>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct IssuerResponse {
    pub name: String,
    pub public_key: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SignedCredentials {
    pub signed_tokens: Vec<String>,
    pub public_key: String,
    pub batch_proof: String,
}

/// `CreateIssuer`, `GetIssuer`, `SignCredentials`, `RedeemCredential` and
/// their v3 counterparts (spec §6). v1 issuer creation omits
/// cohort/valid_from/expires_at/duration; v3 requires
/// `each_credential_valid_for_iso` on the order item to have been set.
#[async_trait]
pub trait CbrClient: Send + Sync {
    async fn create_issuer(&self, name: &str, params: &CreateIssuerParams) -> Result<(), CbrError>;
    async fn create_issuer_v3(&self, name: &str, params: &CreateIssuerParams) -> Result<(), CbrError>;
    async fn get_issuer(&self, name: &str) -> Result<IssuerResponse, CbrError>;
    async fn get_issuer_v3(&self, name: &str) -> Result<IssuerResponse, CbrError>;
    async fn sign_credentials(&self, issuer_name: &str, blinded: &[String]) -> Result<SignedCredentials, CbrError>;
    async fn redeem_credential(
        &self,
        issuer_name: &str,
        preimage: &str,
        signature: &str,
        payload: &str,
    ) -> Result<(), CbrError>;
    async fn redeem_credential_v3(
        &self,
        issuer_name: &str,
        preimage: &str,
        signature: &str,
        payload: &str,
    ) -> Result<(), CbrError>;
}

pub struct HttpCbrClient {
    base_url: url::Url,
    http: reqwest::Client,
}

impl HttpCbrClient {
    pub fn new(base_url: url::Url, timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a valid timeout");
        Self { base_url, http }
    }

    fn issuer_url(&self, segment: &str, name: &str) -> url::Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("{segment}/{name}"));
        url
    }

    async fn post_create_issuer(&self, segment: &str, name: &str, params: &CreateIssuerParams) -> Result<(), CbrError> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            max_tokens: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            cohort: Option<i32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            valid_from: Option<DateTime<Utc>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            expires_at: Option<DateTime<Utc>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            duration: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            buffer: Option<u32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            overlap: Option<u32>,
        }
        let body = Body {
            max_tokens: params.max_tokens,
            cohort: params.cohort,
            valid_from: params.valid_from,
            expires_at: params.expires_at,
            duration: params.duration.as_deref(),
            buffer: params.buffer,
            overlap: params.overlap,
        };
        let response = self
            .http
            .post(self.issuer_url(segment, name))
            .json(&body)
            .send()
            .await
            .map_err(|err| CbrError::new(0, err.to_string()))?;
        extract_unit(response).await
    }
}

async fn extract_unit(response: reqwest::Response) -> Result<(), CbrError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        Ok(())
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(CbrError::new(status, message))
    }
}

async fn extract_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, CbrError> {
    let status = response.status().as_u16();
    if !response.status().is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(CbrError::new(status, message));
    }
    response
        .json()
        .await
        .map_err(|err| CbrError::new(status, format!("invalid response body: {err}")))
}

#[async_trait]
impl CbrClient for HttpCbrClient {
    async fn create_issuer(&self, name: &str, params: &CreateIssuerParams) -> Result<(), CbrError> {
        self.post_create_issuer("v1/issuer", name, params).await
    }

    async fn create_issuer_v3(&self, name: &str, params: &CreateIssuerParams) -> Result<(), CbrError> {
        self.post_create_issuer("v3/issuer", name, params).await
    }

    async fn get_issuer(&self, name: &str) -> Result<IssuerResponse, CbrError> {
        let response = self
            .http
            .get(self.issuer_url("v1/issuer", name))
            .send()
            .await
            .map_err(|err| CbrError::new(0, err.to_string()))?;
        extract_json(response).await
    }

    async fn get_issuer_v3(&self, name: &str) -> Result<IssuerResponse, CbrError> {
        let response = self
            .http
            .get(self.issuer_url("v3/issuer", name))
            .send()
            .await
            .map_err(|err| CbrError::new(0, err.to_string()))?;
        extract_json(response).await
    }

    async fn sign_credentials(&self, issuer_name: &str, blinded: &[String]) -> Result<SignedCredentials, CbrError> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            blinded_tokens: &'a [String],
        }
        let response = self
            .http
            .post(self.issuer_url("v1/blindedToken", issuer_name))
            .json(&Body { blinded_tokens: blinded })
            .send()
            .await
            .map_err(|err| CbrError::new(0, err.to_string()))?;
        extract_json(response).await
    }

    async fn redeem_credential(
        &self,
        issuer_name: &str,
        preimage: &str,
        signature: &str,
        payload: &str,
    ) -> Result<(), CbrError> {
        redeem(&self.http, &self.issuer_url("v1/blindedToken", issuer_name), preimage, signature, payload).await
    }

    async fn redeem_credential_v3(
        &self,
        issuer_name: &str,
        preimage: &str,
        signature: &str,
        payload: &str,
    ) -> Result<(), CbrError> {
        redeem(&self.http, &self.issuer_url("v3/blindedToken", issuer_name), preimage, signature, payload).await
    }
}

async fn redeem(http: &reqwest::Client, url: &url::Url, preimage: &str, signature: &str, payload: &str) -> Result<(), CbrError> {
    #[derive(serde::Serialize)]
    struct Body<'a> {
        t: &'a str,
        sig: &'a str,
        payload: &'a str,
    }
    let response = http
        .post(url.join("redemption").expect("static path always parses"))
        .json(&Body { t: preimage, sig: signature, payload })
        .send()
        .await
        .map_err(|err| CbrError::new(0, err.to_string()))?;
    extract_unit(response).await
}
