//! HS2019 (HMAC-SHA-256) HTTP signature verification over the covered
//! headers `(request-target), host, date, digest, content-length,
//! content-type` (spec §4.3).

use {
    base64::{engine::general_purpose::STANDARD, Engine as _},
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

pub const COVERED_HEADERS: &[&str] =
    &["(request-target)", "host", "date", "digest", "content-length", "content-type"];

/// Builds the canonical signing string: one `name: value` pair per line, in
/// [`COVERED_HEADERS`] order. `lookup` resolves a covered header name
/// (`(request-target)` included) to its value; missing values fail closed.
pub fn signing_string<'a>(mut lookup: impl FnMut(&str) -> Option<&'a str>) -> Option<String> {
    let mut lines = Vec::with_capacity(COVERED_HEADERS.len());
    for header in COVERED_HEADERS {
        let value = lookup(header)?;
        lines.push(format!("{header}: {value}"));
    }
    Some(lines.join("\n"))
}

/// Verifies a base64-encoded HMAC-SHA256 `signature` over `signing_string`
/// using `secret`.
pub fn verify(secret: &[u8], signing_string: &str, signature: &str) -> bool {
    let Ok(signature) = STANDARD.decode(signature) else { return false };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret) else { return false };
    mac.update(signing_string.as_bytes());
    mac.verify_slice(&signature).is_ok()
}

pub fn sign(secret: &[u8], signing_string: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(signing_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn sign_then_verify_round_trips() {
        let headers: HashMap<&str, &str> = HashMap::from([
            ("(request-target)", "post /v1/orders/1/credentials"),
            ("host", "payments.brave.com"),
            ("date", "Tue, 07 Jan 2014 21:52:56 GMT"),
            ("digest", "SHA-256=abc"),
            ("content-length", "18"),
            ("content-type", "application/json"),
        ]);
        let signing = signing_string(|h| headers.get(h).copied()).unwrap();
        let signature = sign(b"secret", &signing);
        assert!(verify(b"secret", &signing, &signature));
    }

    #[test]
    fn rejects_tampered_signature() {
        let signing = signing_string(|h| match h {
            "(request-target)" => Some("get /"),
            _ => Some("x"),
        })
        .unwrap();
        let signature = sign(b"secret", &signing);
        assert!(!verify(b"other-secret", &signing, &signature));
    }

    #[test]
    fn missing_covered_header_fails_closed() {
        assert!(signing_string(|h| if h == "date" { None } else { Some("x") }).is_none());
    }
}
