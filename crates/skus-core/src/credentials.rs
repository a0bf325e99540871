//! Credential Reader (C7): the read path for issued credentials, dispatched
//! on credential type (spec §4.7).

use {
    crate::tlv1,
    chrono::{DateTime, Utc},
    skus_database::{order_items, outbox, single_use_creds, tlv2_creds, PgTransaction},
    skus_model::{issuer::encode_issuer, CredentialType, Error, Order, OrderItem},
    uuid::Uuid,
};

/// What `GetItemCredentials` returns, mirroring the 200/202/404/500 status
/// taxonomy spec §4.7 describes.
pub enum CredentialsResponse {
    SingleUse(single_use_creds::OrderCreds),
    TimeLimited(Vec<(Uuid, Uuid, tlv1::Tlv1Credential)>),
    /// 200 with a (possibly empty) TLV2 credential list.
    TimeLimitedV2(Vec<tlv2_creds::Tlv2Cred>),
    /// 202: still signing, with a `Retry-After` hint in seconds.
    Pending { retry_after_seconds: u64 },
}

pub async fn get_item_credentials(
    tx: &mut PgTransaction<'_>,
    encryption_key: &skus_crypto::secret::EncryptionKey,
    order: &Order,
    item: &OrderItem,
    request_id: Uuid,
    avg_retry_after: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<CredentialsResponse, Error> {
    if item.order_id != order.id {
        return Err(Error::NotFound);
    }

    match item.credential_type {
        CredentialType::SingleUse => get_single_use(tx, item.id, request_id, avg_retry_after).await,
        CredentialType::TimeLimited => {
            let issuer_id = encode_issuer(&order.merchant_id, &item.sku);
            let last_paid_at = order.last_paid_at.ok_or(Error::Unpaid)?;
            let derived = tlv1::derive_credentials(
                tx,
                encryption_key,
                &order.merchant_id,
                &issuer_id,
                item.id,
                order.id,
                last_paid_at,
                item.valid_for_iso,
                item.issuance_interval_iso,
                now,
            )
            .await?;
            Ok(CredentialsResponse::TimeLimited(derived))
        }
        CredentialType::TimeLimitedV2 => get_tlv2(tx, order.id, item.id, request_id, avg_retry_after).await,
    }
}

/// `GetCredentials(order_id)` (legacy, one-item orders only): uses `item_id`
/// as the request id (spec §4.7, §9 Open Questions).
pub async fn get_credentials(
    tx: &mut PgTransaction<'_>,
    encryption_key: &skus_crypto::secret::EncryptionKey,
    order: &Order,
    avg_retry_after: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<CredentialsResponse, Error> {
    let items = order_items::list_for_order(tx, order.id).await.map_err(anyhow::Error::from)?;
    let item = items.first().ok_or(Error::NotFound)?;
    let request_id = item.id;
    get_item_credentials(tx, encryption_key, order, item, request_id, avg_retry_after, now).await
}

async fn get_single_use(
    tx: &mut PgTransaction<'_>,
    item_id: Uuid,
    request_id: Uuid,
    avg_retry_after: chrono::Duration,
) -> Result<CredentialsResponse, Error> {
    if let Some(creds) = single_use_creds::get_by_item(tx, item_id).await.map_err(anyhow::Error::from)? {
        return Ok(CredentialsResponse::SingleUse(creds));
    }

    let row = outbox::get_by_request_id(tx, request_id).await.map_err(anyhow::Error::from)?.ok_or(Error::NotFound)?;
    if row.completed_at.is_some() {
        // The outbox says signing finished but no row exists: an invariant
        // violation the spec documents as unreachable in practice.
        return Err(anyhow::anyhow!("outbox row for {request_id} completed with no single-use credential").into());
    }
    Ok(CredentialsResponse::Pending { retry_after_seconds: retry_after_seconds(avg_retry_after) })
}

async fn get_tlv2(
    tx: &mut PgTransaction<'_>,
    order_id: Uuid,
    item_id: Uuid,
    request_id: Uuid,
    avg_retry_after: chrono::Duration,
) -> Result<CredentialsResponse, Error> {
    let row = outbox::get_by_request_id(tx, request_id).await.map_err(anyhow::Error::from)?.ok_or(Error::NotFound)?;
    if row.order_id != order_id {
        return Err(Error::WrongOrderForRequest);
    }
    if row.completed_at.is_none() {
        return Ok(CredentialsResponse::Pending { retry_after_seconds: retry_after_seconds(avg_retry_after) });
    }

    let creds = tlv2_creds::list_for_request(tx, order_id, item_id, request_id).await.map_err(anyhow::Error::from)?;
    Ok(CredentialsResponse::TimeLimitedV2(creds))
}

fn retry_after_seconds(avg: chrono::Duration) -> u64 {
    avg.num_seconds().max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_is_never_zero() {
        assert_eq!(retry_after_seconds(chrono::Duration::milliseconds(0)), 1);
        assert_eq!(retry_after_seconds(chrono::Duration::seconds(7)), 7);
    }
}
