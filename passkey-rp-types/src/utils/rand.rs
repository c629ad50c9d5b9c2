//! Randomness for challenges, user handles and ceremony tokens.

use rand::{rngs::OsRng, RngCore};

/// `len` bytes from the operating system's random source.
pub fn random_vec(len: usize) -> Vec<u8> {
    let mut data = vec![0; len];
    OsRng.fill_bytes(&mut data);
    data
}
