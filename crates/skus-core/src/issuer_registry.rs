//! Issuer Registry (C1): ensures a CBR issuer exists per (merchant, sku),
//! idempotent on conflict (spec §4.1).

use {
    skus_cbr::{CbrClient, CreateIssuerParams},
    skus_database::{issuers, PgTransaction},
    skus_model::{issuer::encode_issuer, Error, OrderItem},
};

const MAX_TOKENS: u32 = 4_000_000;

/// `EnsureIssuer(merchant_id, item)` (spec §4.1). Returns the canonical
/// issuer name, creating the issuer via CBR and persisting it if this is the
/// first order for the (merchant, sku) pair.
pub async fn ensure_issuer(tx: &mut PgTransaction<'_>, cbr: &dyn CbrClient, merchant_id: &str, item: &OrderItem) -> Result<String, Error> {
    let name = encode_issuer(merchant_id, &item.sku);

    if issuers::get_by_name(tx, &name).await.map_err(anyhow::Error::from)?.is_some() {
        return Ok(name);
    }

    let params = CreateIssuerParams {
        max_tokens: MAX_TOKENS,
        buffer: Some(item.issuer_config.buffer),
        overlap: Some(item.issuer_config.overlap),
        ..Default::default()
    };

    let use_v3 = item.each_credential_valid_for_iso.is_some();
    let create_result = if use_v3 {
        let params = CreateIssuerParams { duration: Some(item.issuance_interval_iso.to_string()), ..params };
        skus_cbr::with_retry(|| cbr.create_issuer_v3(&name, &params)).await
    } else {
        skus_cbr::with_retry(|| cbr.create_issuer(&name, &params)).await
    };

    if let Err(err) = create_result {
        if !err.is_conflict() {
            return Err(anyhow::Error::from(err).context("CBR CreateIssuer").into());
        }
        tracing::debug!(issuer = %name, "issuer already exists at CBR, continuing");
    }

    let issuer = if use_v3 {
        skus_cbr::with_retry(|| cbr.get_issuer_v3(&name)).await
    } else {
        skus_cbr::with_retry(|| cbr.get_issuer(&name)).await
    }
    .map_err(|err| anyhow::Error::from(err).context("CBR GetIssuer"))?;

    issuers::create(tx, &name, &issuer.public_key).await.map_err(anyhow::Error::from)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use {
        async_trait::async_trait,
        mockall::mock,
        skus_cbr::{CbrError, IssuerResponse, SignedCredentials},
        skus_model::CredentialType,
        sqlx::Connection,
        std::str::FromStr,
        uuid::Uuid,
    };

    mock! {
        Cbr {}

        #[async_trait]
        impl CbrClient for Cbr {
            async fn create_issuer(&self, name: &str, params: &CreateIssuerParams) -> Result<(), CbrError>;
            async fn create_issuer_v3(&self, name: &str, params: &CreateIssuerParams) -> Result<(), CbrError>;
            async fn get_issuer(&self, name: &str) -> Result<IssuerResponse, CbrError>;
            async fn get_issuer_v3(&self, name: &str) -> Result<IssuerResponse, CbrError>;
            async fn sign_credentials(&self, issuer_name: &str, blinded: &[String]) -> Result<SignedCredentials, CbrError>;
            async fn redeem_credential(&self, issuer_name: &str, preimage: &str, signature: &str, payload: &str) -> Result<(), CbrError>;
            async fn redeem_credential_v3(&self, issuer_name: &str, preimage: &str, signature: &str, payload: &str) -> Result<(), CbrError>;
        }
    }

    fn sample_item() -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            sku: "premium".into(),
            credential_type: CredentialType::from_str("single-use").unwrap(),
            quantity: 1,
            price: "1".parse().unwrap(),
            subtotal: "1".parse().unwrap(),
            valid_for_iso: skus_model::iso8601::parse("P1M").unwrap(),
            each_credential_valid_for_iso: None,
            issuance_interval_iso: skus_model::iso8601::parse("P1D").unwrap(),
            issuer_config: Default::default(),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_new_issuer_calls_create_then_get() {
        let mut db = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut tx = db.begin().await.unwrap();
        skus_database::clear_DANGER_(&mut tx).await.unwrap();

        let mut cbr = MockCbr::new();
        cbr.expect_create_issuer().times(1).returning(|_, _| Ok(()));
        cbr.expect_get_issuer()
            .times(1)
            .returning(|name| Ok(IssuerResponse { name: name.to_string(), public_key: "pk".into() }));

        let item = sample_item();
        let name = ensure_issuer(&mut tx, &cbr, "brave.com", &item).await.unwrap();
        assert!(name.starts_with("brave.com?sku="));

        // Second call against the same store makes no further CBR calls.
        let name2 = ensure_issuer(&mut tx, &cbr, "brave.com", &item).await.unwrap();
        assert_eq!(name, name2);
    }
}
