use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// PBKDF2 iteration count. Every holder of the (code, password) pair must
/// use the same value or keys will not match.
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Creates a new `SecureKey` from a byte array.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Returns a reference to the key as a byte array.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Derives the channel key from a password, using the share code as salt.
///
/// Deterministic: anyone who knows both values computes the same key, so no
/// key is ever stored or exchanged.
///
/// # Arguments
///
/// * `password` - The sharing password.
/// * `share_code` - The share code, used verbatim as the PBKDF2 salt.
///
/// # Returns
///
/// A `SecureKey` holding the 256-bit key.
pub fn derive_key(password: &str, share_code: &str) -> SecureKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        share_code.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut key,
    );
    let secure = SecureKey::new(key);
    key.zeroize();
    secure
}
