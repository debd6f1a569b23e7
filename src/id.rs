//! Random reservation id generation.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const ID_LEN: usize = 32;

/// Generates a random 32-character id from a 62-symbol URL-safe alphabet
/// (~190 bits of entropy), pulling a fresh `rand::thread_rng()` per call
/// for non-cryptographic selection, the same way
/// `wmbus::radio::lora::channel_hopping::next_random` does.
pub fn random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}
