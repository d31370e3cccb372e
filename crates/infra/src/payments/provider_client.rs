use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, warn};
use uuid::Uuid;

use async_trait::async_trait;
use domain::repositories::escrow_gateway::EscrowGateway;
use domain::value_objects::gateway::{
    AuthorizationReceipt, AuthorizeRequest, CaptureReceipt, DeclineCode, ProviderCallOutcome,
    ProviderDecline, RefundReceipt, TransferReceipt, VoidReceipt,
};
use domain::value_objects::provider_events::{ProviderEvent, ProviderEventKind};

type HmacSha256 = Hmac<Sha256>;

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
const RETRY_BASE_BACKOFF_MS: u64 = 200;

/// Reject signature timestamps this far from now, same window the provider
/// documents for redelivery.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct ProviderClientConfig {
    pub api_base_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

/// HTTP client for the escrow payment provider, built on reqwest. Transport
/// failures and 5xx responses are retried under the same idempotency key and
/// collapse to `Unknown` when retries run out; only a 4xx with a decline
/// envelope is treated as definitive.
pub struct PaymentProviderClient {
    http: reqwest::Client,
    api_base_url: String,
    secret_key: String,
    webhook_secret: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
pub struct RawProviderEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub data: RawProviderEventData,
}

#[derive(Debug, Deserialize)]
pub struct RawProviderEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEnvelope {
    error: ProviderErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetails {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthorizeBody<'a> {
    amount_minor: i64,
    currency: &'a str,
    payment_method_token: &'a str,
    order_id: Uuid,
}

#[derive(Debug, Serialize)]
struct AmountBody {
    amount_minor: i64,
}

#[derive(Debug, Serialize)]
struct TransferBody<'a> {
    destination: &'a str,
    amount_minor: i64,
}

#[derive(Debug, Serialize)]
struct EmptyBody {}

#[derive(Debug, Deserialize)]
struct HoldResponse {
    hold_ref: String,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    captured_minor: i64,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    refunded_total_minor: i64,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    transfer_ref: String,
}

impl PaymentProviderClient {
    pub fn new(config: ProviderClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key,
            webhook_secret: config.webhook_secret,
            max_retries: config.max_retries,
        })
    }

    async fn post_outcome<B, T>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: &str,
        context: &str,
    ) -> Result<ProviderCallOutcome<T>>
    where
        B: Serialize + Sync,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.api_base_url, path);
        let mut last_ambiguity = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = RETRY_BASE_BACKOFF_MS << (attempt - 1);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = self
                .http
                .post(&url)
                .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
                .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    warn!(
                        context = %context,
                        attempt,
                        error = %err,
                        "provider_client: transport error, will retry under same idempotency key"
                    );
                    last_ambiguity = format!("transport error: {err}");
                    continue;
                }
            };

            let status = response.status();

            if status.is_success() {
                return match response.json::<T>().await {
                    Ok(parsed) => Ok(ProviderCallOutcome::Succeeded(parsed)),
                    Err(err) => {
                        // The provider acted but we cannot tell how; never
                        // guess on a 2xx we failed to read.
                        error!(
                            context = %context,
                            error = %err,
                            "provider_client: unreadable success response"
                        );
                        Ok(ProviderCallOutcome::Unknown(format!(
                            "{context}: success response could not be parsed: {err}"
                        )))
                    }
                };
            }

            if status.is_client_error() {
                let body_text = match response.text().await {
                    Ok(text) if !text.is_empty() => text,
                    Ok(_) => "<empty response body>".to_string(),
                    Err(err) => format!("<failed to read response body: {err}>"),
                };

                let (code, message) =
                    match serde_json::from_str::<ProviderErrorEnvelope>(&body_text) {
                        Ok(envelope) => (envelope.error.code, envelope.error.message),
                        Err(_) => (None, None),
                    };

                let decline = ProviderDecline {
                    code: code
                        .as_deref()
                        .map(DeclineCode::from_provider_code)
                        .unwrap_or(DeclineCode::InvalidRequest),
                    message: message.unwrap_or_else(|| body_text.clone()),
                };

                error!(
                    status = %status,
                    provider_error_code = ?code,
                    response_body = %body_text,
                    context = %context,
                    "provider_client: request definitively declined"
                );

                return Ok(ProviderCallOutcome::DefinitivelyFailed(decline));
            }

            warn!(
                status = %status,
                context = %context,
                attempt,
                "provider_client: server error, will retry under same idempotency key"
            );
            last_ambiguity = format!("server error: status {status}");
        }

        Ok(ProviderCallOutcome::Unknown(format!(
            "{context}: no definitive answer after {} attempts ({last_ambiguity})",
            self.max_retries + 1
        )))
    }

    /// Never fails on a valid envelope: a known type with a broken object is
    /// downgraded to `Unrecognized` so a single bad payload cannot wedge the
    /// delivery queue.
    fn parse_event_kind(event_type: &str, object: &serde_json::Value) -> ProviderEventKind {
        let order_id = object
            .get("order_id")
            .and_then(|v| v.as_str())
            .and_then(|v| Uuid::parse_str(v).ok());
        let hold_ref = object
            .get("hold_ref")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        let transfer_ref = object
            .get("transfer_ref")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        let reason = object
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("unspecified")
            .to_string();

        let kind = match event_type {
            "payment.authorized" => order_id.zip(hold_ref).zip(
                object.get("amount_minor").and_then(|v| v.as_i64()),
            )
            .map(|((order_id, provider_ref), amount_minor)| {
                ProviderEventKind::PaymentAuthorized {
                    order_id,
                    provider_ref,
                    amount_minor,
                }
            }),
            "payment.failed" => order_id.zip(hold_ref).map(|(order_id, provider_ref)| {
                ProviderEventKind::PaymentFailed {
                    order_id,
                    provider_ref,
                    reason: reason.clone(),
                }
            }),
            "payment.captured" => order_id.zip(hold_ref).zip(
                object.get("captured_minor").and_then(|v| v.as_i64()),
            )
            .map(|((order_id, provider_ref), captured_minor)| {
                ProviderEventKind::PaymentCaptured {
                    order_id,
                    provider_ref,
                    captured_minor,
                }
            }),
            "payment.refunded" => order_id.zip(hold_ref).zip(
                object.get("refunded_total_minor").and_then(|v| v.as_i64()),
            )
            .map(|((order_id, provider_ref), refunded_total_minor)| {
                ProviderEventKind::PaymentRefunded {
                    order_id,
                    provider_ref,
                    refunded_total_minor,
                }
            }),
            "payout.completed" => order_id.zip(transfer_ref).map(|(order_id, transfer_ref)| {
                ProviderEventKind::PayoutCompleted {
                    order_id,
                    transfer_ref,
                }
            }),
            "payout.failed" => order_id.zip(transfer_ref).map(|(order_id, transfer_ref)| {
                ProviderEventKind::PayoutFailed {
                    order_id,
                    transfer_ref,
                    reason: reason.clone(),
                }
            }),
            _ => None,
        };

        match kind {
            Some(kind) => kind,
            None => {
                warn!(
                    event_type = %event_type,
                    "provider_client: event payload missing required fields, treating as unrecognized"
                );
                ProviderEventKind::Unrecognized {
                    event_type: event_type.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl EscrowGateway for PaymentProviderClient {
    async fn authorize(
        &self,
        request: AuthorizeRequest,
    ) -> Result<ProviderCallOutcome<AuthorizationReceipt>> {
        let body = AuthorizeBody {
            amount_minor: request.amount_minor,
            currency: &request.currency,
            payment_method_token: &request.payment_method_token,
            order_id: request.order_id,
        };

        let outcome = self
            .post_outcome::<_, HoldResponse>(
                "/v1/escrow/holds",
                &body,
                &request.idempotency_key,
                "authorize hold",
            )
            .await?;

        Ok(match outcome {
            ProviderCallOutcome::Succeeded(response) => {
                ProviderCallOutcome::Succeeded(AuthorizationReceipt {
                    provider_ref: response.hold_ref,
                })
            }
            ProviderCallOutcome::DefinitivelyFailed(decline) => {
                ProviderCallOutcome::DefinitivelyFailed(decline)
            }
            ProviderCallOutcome::Unknown(context) => ProviderCallOutcome::Unknown(context),
        })
    }

    async fn capture(
        &self,
        provider_ref: String,
        amount_minor: i64,
        idempotency_key: String,
    ) -> Result<ProviderCallOutcome<CaptureReceipt>> {
        let path = format!("/v1/escrow/holds/{provider_ref}/capture");
        let outcome = self
            .post_outcome::<_, CaptureResponse>(
                &path,
                &AmountBody { amount_minor },
                &idempotency_key,
                "capture hold",
            )
            .await?;

        Ok(match outcome {
            ProviderCallOutcome::Succeeded(response) => {
                ProviderCallOutcome::Succeeded(CaptureReceipt {
                    captured_minor: response.captured_minor,
                })
            }
            ProviderCallOutcome::DefinitivelyFailed(decline) => {
                ProviderCallOutcome::DefinitivelyFailed(decline)
            }
            ProviderCallOutcome::Unknown(context) => ProviderCallOutcome::Unknown(context),
        })
    }

    async fn refund(
        &self,
        provider_ref: String,
        amount_minor: i64,
        idempotency_key: String,
    ) -> Result<ProviderCallOutcome<RefundReceipt>> {
        let path = format!("/v1/escrow/holds/{provider_ref}/refunds");
        let outcome = self
            .post_outcome::<_, RefundResponse>(
                &path,
                &AmountBody { amount_minor },
                &idempotency_key,
                "refund hold",
            )
            .await?;

        Ok(match outcome {
            ProviderCallOutcome::Succeeded(response) => {
                ProviderCallOutcome::Succeeded(RefundReceipt {
                    refunded_total_minor: response.refunded_total_minor,
                })
            }
            ProviderCallOutcome::DefinitivelyFailed(decline) => {
                ProviderCallOutcome::DefinitivelyFailed(decline)
            }
            ProviderCallOutcome::Unknown(context) => ProviderCallOutcome::Unknown(context),
        })
    }

    async fn void(
        &self,
        provider_ref: String,
        idempotency_key: String,
    ) -> Result<ProviderCallOutcome<VoidReceipt>> {
        let path = format!("/v1/escrow/holds/{provider_ref}/void");
        let outcome = self
            .post_outcome::<_, HoldResponse>(&path, &EmptyBody {}, &idempotency_key, "void hold")
            .await?;

        Ok(match outcome {
            ProviderCallOutcome::Succeeded(response) => {
                ProviderCallOutcome::Succeeded(VoidReceipt {
                    provider_ref: response.hold_ref,
                })
            }
            ProviderCallOutcome::DefinitivelyFailed(decline) => {
                ProviderCallOutcome::DefinitivelyFailed(decline)
            }
            ProviderCallOutcome::Unknown(context) => ProviderCallOutcome::Unknown(context),
        })
    }

    async fn transfer_to_seller(
        &self,
        seller_account_ref: String,
        amount_minor: i64,
        idempotency_key: String,
    ) -> Result<ProviderCallOutcome<TransferReceipt>> {
        let body = TransferBody {
            destination: &seller_account_ref,
            amount_minor,
        };
        let outcome = self
            .post_outcome::<_, TransferResponse>(
                "/v1/transfers",
                &body,
                &idempotency_key,
                "transfer to seller",
            )
            .await?;

        Ok(match outcome {
            ProviderCallOutcome::Succeeded(response) => {
                ProviderCallOutcome::Succeeded(TransferReceipt {
                    transfer_ref: response.transfer_ref,
                })
            }
            ProviderCallOutcome::DefinitivelyFailed(decline) => {
                ProviderCallOutcome::DefinitivelyFailed(decline)
            }
            ProviderCallOutcome::Unknown(context) => ProviderCallOutcome::Unknown(context),
        })
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<ProviderEvent> {
        let mut timestamp: Option<String> = None;
        let mut signature: Option<String> = None;

        for part in signature_header.split(',') {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest.to_string());
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signature = Some(rest.to_string());
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in signature header"))?;
        let signature =
            signature.ok_or_else(|| anyhow::anyhow!("missing v1 in signature header"))?;

        let timestamp_secs: i64 = timestamp
            .parse()
            .map_err(|_| anyhow::anyhow!("signature timestamp is not a number"))?;
        let age = (Utc::now().timestamp() - timestamp_secs).abs();
        if age > SIGNATURE_TOLERANCE_SECS {
            anyhow::bail!("signature timestamp outside tolerance ({age}s)");
        }

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();
        let provided = hex::decode(signature)?;

        if expected[..] != provided[..] {
            anyhow::bail!("invalid webhook signature");
        }

        let raw: RawProviderEvent = serde_json::from_slice(payload)?;
        let payload_hash = hex::encode(Sha256::digest(payload));
        let kind = Self::parse_event_kind(&raw.type_, &raw.data.object);

        Ok(ProviderEvent {
            provider_event_id: raw.id,
            event_type: raw.type_,
            payload_hash,
            kind,
        })
    }
}
