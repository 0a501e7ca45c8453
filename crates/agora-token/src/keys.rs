use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;

/// Symmetric key size for AES-256-GCM.
pub const KEY_SIZE: usize = 32;

/// Generate a random 256-bit token key.
pub fn generate_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    key
}
