pub mod attenuation;
pub mod http_signature;
pub mod secret;
pub mod tlv1;

pub use attenuation::{Caveat, attenuate, parse_key_id, verify_caveats};
pub use secret::{EncryptionKey, SecretCiphertext, decrypt_secret, encrypt_secret, generate_secret};
