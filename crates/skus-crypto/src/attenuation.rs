//! Macaroon-style caveat attenuation (spec §4.3, §9). A `keyId` is a root
//! key UUID followed by zero or more caveats; each caveat derives a new
//! secret via an HMAC chain, so a party holding only the attenuated secret
//! cannot recover the root secret or mint new caveats.

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
    uuid::Uuid,
};

const CAVEAT_SEPARATOR: char = ';';
const KEY_VALUE_SEPARATOR: char = '=';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caveat {
    Location(String),
    Sku(String),
}

impl Caveat {
    fn key(&self) -> &'static str {
        match self {
            Caveat::Location(_) => "location",
            Caveat::Sku(_) => "sku",
        }
    }

    fn value(&self) -> &str {
        match self {
            Caveat::Location(v) | Caveat::Sku(v) => v,
        }
    }

    fn encode(&self) -> String {
        format!("{}{KEY_VALUE_SEPARATOR}{}", self.key(), self.value())
    }

    fn parse(s: &str) -> Option<Self> {
        let (key, value) = s.split_once(KEY_VALUE_SEPARATOR)?;
        match key {
            "location" => Some(Caveat::Location(value.to_string())),
            "sku" => Some(Caveat::Sku(value.to_string())),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<&str> {
        match self {
            Caveat::Location(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_sku(&self) -> Option<&str> {
        match self {
            Caveat::Sku(v) => Some(v),
            _ => None,
        }
    }
}

/// Derives the attenuated `(keyId, secret)` pair for `caveats` applied to
/// `root_id`/`root_secret` in order.
pub fn attenuate(root_id: Uuid, root_secret: &[u8], caveats: &[Caveat]) -> (String, Vec<u8>) {
    let mut secret = root_secret.to_vec();
    let mut id = root_id.to_string();
    for caveat in caveats {
        let encoded = caveat.encode();
        secret = hmac_chain(&secret, encoded.as_bytes());
        id.push(CAVEAT_SEPARATOR);
        id.push_str(&encoded);
    }
    (id, secret)
}

fn hmac_chain(secret: &[u8], caveat_bytes: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(caveat_bytes);
    mac.finalize().into_bytes().to_vec()
}

/// Splits a presented `keyId` into the root key id and its ordered caveats.
pub fn parse_key_id(key_id: &str) -> Option<(Uuid, Vec<Caveat>)> {
    let mut parts = key_id.split(CAVEAT_SEPARATOR);
    let root_id: Uuid = parts.next()?.parse().ok()?;
    let caveats = parts.map(Caveat::parse).collect::<Option<Vec<_>>>()?;
    Some((root_id, caveats))
}

/// Recomputes the attenuated secret for `caveats` over `root_secret` and
/// returns it, so the verifier can use it to check the presented signature.
pub fn verify_caveats(root_secret: &[u8], caveats: &[Caveat]) -> Vec<u8> {
    let mut secret = root_secret.to_vec();
    for caveat in caveats {
        secret = hmac_chain(&secret, caveat.encode().as_bytes());
    }
    secret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuation_round_trips_through_key_id() {
        let root_id = Uuid::new_v4();
        let root_secret = b"root-secret".to_vec();
        let caveats = vec![Caveat::Location("test.brave.com".into()), Caveat::Sku("test-sku".into())];

        let (key_id, attenuated_secret) = attenuate(root_id, &root_secret, &caveats);
        let (parsed_root, parsed_caveats) = parse_key_id(&key_id).unwrap();
        assert_eq!(parsed_root, root_id);
        assert_eq!(parsed_caveats, caveats);

        let recomputed = verify_caveats(&root_secret, &parsed_caveats);
        assert_eq!(recomputed, attenuated_secret);
    }

    #[test]
    fn no_caveats_leaves_secret_untouched() {
        let root_id = Uuid::new_v4();
        let root_secret = b"root-secret".to_vec();
        let (key_id, secret) = attenuate(root_id, &root_secret, &[]);
        assert_eq!(key_id, root_id.to_string());
        assert_eq!(secret, root_secret);
    }

    #[test]
    fn different_caveat_order_yields_different_secret() {
        let root_secret = b"root-secret".to_vec();
        let a = vec![Caveat::Location("x".into()), Caveat::Sku("y".into())];
        let b = vec![Caveat::Sku("y".into()), Caveat::Location("x".into())];
        assert_ne!(verify_caveats(&root_secret, &a), verify_caveats(&root_secret, &b));
    }
}
