use aes::Aes256;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sonic_rs::JsonValueTrait;
use zeroize::Zeroizing;

use crate::crypto::kdf::{self, SecureKey};
use crate::error::{AppError, Result};
use crate::models::location::LocationSample;

/// The size of the CBC initialisation vector in bytes.
pub const IV_SIZE: usize = 16;
/// The AES block size in bytes.
const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// The wire form of one encrypted location sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Base64 of the 16-byte IV.
    pub iv: String,
    /// Base64 of the AES-256-CBC ciphertext.
    pub data: String,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    iv: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

impl EncryptedEnvelope {
    /// Serializes the envelope for transport.
    pub fn to_json(&self) -> Result<String> {
        sonic_rs::to_string(self)
            .map_err(|e| AppError::Internal(format!("Envelope serialization failed: {}", e)))
    }

    /// Parses an envelope, rejecting anything without both fields.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawEnvelope = sonic_rs::from_str(json)
            .map_err(|e| AppError::MalformedEnvelope(format!("Invalid envelope JSON: {}", e)))?;

        match (raw.iv, raw.data) {
            (Some(iv), Some(data)) if !iv.is_empty() && !data.is_empty() => Ok(Self { iv, data }),
            _ => Err(AppError::MalformedEnvelope(
                "Envelope is missing iv or data".to_string(),
            )),
        }
    }
}

/// Generates a new random IV.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypts a plaintext using AES-256-CBC with PKCS#7 padding.
pub fn encrypt(key: &SecureKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(&(*key.as_bytes()).into(), &(*iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypts an AES-256-CBC ciphertext. A padding failure means the key was
/// wrong.
pub fn decrypt(key: &SecureKey, iv: &[u8; IV_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    Aes256CbcDec::new(&(*key.as_bytes()).into(), &(*iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| AppError::InvalidCredentials)
}

/// Encrypts a location sample for the channel named by `share_code`.
///
/// # Arguments
///
/// * `sample` - The location to encrypt.
/// * `password` - The sharing password.
/// * `share_code` - The share code (KDF salt).
///
/// # Returns
///
/// The envelope serialized as a JSON string. Every call draws a fresh IV.
pub fn encrypt_location(sample: &LocationSample, password: &str, share_code: &str) -> Result<String> {
    let key = kdf::derive_key(password, share_code);
    let iv = generate_iv();

    let plaintext = Zeroizing::new(
        sonic_rs::to_vec(sample)
            .map_err(|e| AppError::Internal(format!("Location serialization failed: {}", e)))?,
    );

    let ciphertext = encrypt(&key, &iv, &plaintext);

    EncryptedEnvelope {
        iv: STANDARD.encode(iv),
        data: STANDARD.encode(ciphertext),
    }
    .to_json()
}

/// Decrypts an envelope produced by [`encrypt_location`].
///
/// # Returns
///
/// The location sample, `MalformedEnvelope` if the envelope itself is
/// broken, or `InvalidCredentials` if decryption does not yield a location.
pub fn decrypt_location(envelope: &str, password: &str, share_code: &str) -> Result<LocationSample> {
    let envelope = EncryptedEnvelope::from_json(envelope)?;

    let iv_bytes = STANDARD
        .decode(envelope.iv.as_bytes())
        .map_err(|e| AppError::MalformedEnvelope(format!("IV is not base64: {}", e)))?;
    let iv: [u8; IV_SIZE] = iv_bytes.as_slice().try_into().map_err(|_| {
        AppError::MalformedEnvelope(format!("IV must be {} bytes, got {}", IV_SIZE, iv_bytes.len()))
    })?;

    let ciphertext = STANDARD
        .decode(envelope.data.as_bytes())
        .map_err(|e| AppError::MalformedEnvelope(format!("Data is not base64: {}", e)))?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(AppError::MalformedEnvelope(format!(
            "Ciphertext length {} is not a whole number of blocks",
            ciphertext.len()
        )));
    }

    let key = kdf::derive_key(password, share_code);
    let plaintext = Zeroizing::new(decrypt(&key, &iv, &ciphertext)?);

    parse_sample(&plaintext)
}

fn parse_sample(plaintext: &[u8]) -> Result<LocationSample> {
    let text = std::str::from_utf8(plaintext).map_err(|_| AppError::InvalidCredentials)?;
    let value: sonic_rs::Value =
        sonic_rs::from_str(text).map_err(|_| AppError::InvalidCredentials)?;

    let number = |field: &str| {
        value
            .get(field)
            .and_then(|v| v.as_f64().or_else(|| v.as_i64().map(|i| i as f64)))
    };

    let latitude = number("latitude").ok_or(AppError::InvalidCredentials)?;
    let longitude = number("longitude").ok_or(AppError::InvalidCredentials)?;
    let timestamp = value
        .get("timestamp")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0);

    Ok(LocationSample {
        latitude,
        longitude,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample() -> LocationSample {
        LocationSample::new(48.858_370, 2.294_481, 1_700_000_000_000)
    }

    #[test]
    fn round_trip_recovers_sample() {
        let envelope = encrypt_location(&sample(), "secret1", "my-code").unwrap();
        let decrypted = decrypt_location(&envelope, "secret1", "my-code").unwrap();
        assert_eq!(decrypted, sample());
    }

    #[test]
    fn negative_coordinates_survive() {
        let southern = LocationSample::new(-33.868_820, -151.209_296, 42);
        let envelope = encrypt_location(&southern, "secret1", "sydney-1").unwrap();
        assert_eq!(decrypt_location(&envelope, "secret1", "sydney-1").unwrap(), southern);
    }

    #[test]
    fn every_call_uses_a_fresh_iv() {
        let a = EncryptedEnvelope::from_json(&encrypt_location(&sample(), "secret1", "my-code").unwrap()).unwrap();
        let b = EncryptedEnvelope::from_json(&encrypt_location(&sample(), "secret1", "my-code").unwrap()).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn iv_is_sixteen_bytes() {
        let envelope = EncryptedEnvelope::from_json(&encrypt_location(&sample(), "secret1", "my-code").unwrap()).unwrap();
        assert_eq!(STANDARD.decode(envelope.iv).unwrap().len(), IV_SIZE);
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let envelope = encrypt_location(&sample(), "secret1", "my-code").unwrap();
        for wrong in ["secret2", "Secret1", "secret1 ", "another-password"] {
            let err = decrypt_location(&envelope, wrong, "my-code").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        }
    }

    #[test]
    fn wrong_share_code_is_invalid_credentials() {
        let envelope = encrypt_location(&sample(), "secret1", "my-code").unwrap();
        let err = decrypt_location(&envelope, "secret1", "my-code-2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[test]
    fn missing_fields_are_malformed() {
        for json in [r#"{"iv":"AAAAAAAAAAAAAAAAAAAAAA=="}"#, r#"{"data":"abcd"}"#, r#"{}"#, r#"{"iv":"","data":""}"#] {
            let err = decrypt_location(json, "secret1", "my-code").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedEnvelope, "input: {}", json);
        }
    }

    #[test]
    fn garbage_is_malformed_not_credentials() {
        for json in ["not json", r#"{"iv":"***","data":"AAAA"}"#, r#"{"iv":"AAAA","data":"AAAAAAAAAAAAAAAAAAAAAA=="}"#] {
            let err = decrypt_location(json, "secret1", "my-code").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedEnvelope, "input: {}", json);
        }
    }

    #[test]
    fn truncated_ciphertext_is_malformed() {
        let envelope = EncryptedEnvelope::from_json(&encrypt_location(&sample(), "secret1", "my-code").unwrap()).unwrap();
        let mut data = STANDARD.decode(&envelope.data).unwrap();
        data.truncate(data.len() - 3);
        let broken = EncryptedEnvelope { iv: envelope.iv, data: STANDARD.encode(data) }.to_json().unwrap();
        let err = decrypt_location(&broken, "secret1", "my-code").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEnvelope);
    }

    #[test]
    fn decrypted_non_location_is_invalid_credentials() {
        let key = kdf::derive_key("secret1", "my-code");
        let iv = generate_iv();
        let ciphertext = encrypt(&key, &iv, br#"{"latitude":"north","longitude":2.0}"#);
        let envelope = EncryptedEnvelope { iv: STANDARD.encode(iv), data: STANDARD.encode(ciphertext) }
            .to_json()
            .unwrap();
        let err = decrypt_location(&envelope, "secret1", "my-code").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[test]
    fn integer_coordinates_and_missing_timestamp_are_accepted() {
        let key = kdf::derive_key("secret1", "my-code");
        let iv = generate_iv();
        let ciphertext = encrypt(&key, &iv, br#"{"latitude":10,"longitude":-20}"#);
        let envelope = EncryptedEnvelope { iv: STANDARD.encode(iv), data: STANDARD.encode(ciphertext) }
            .to_json()
            .unwrap();
        let decrypted = decrypt_location(&envelope, "secret1", "my-code").unwrap();
        assert_eq!(decrypted, LocationSample::new(10.0, -20.0, 0));
    }
}
