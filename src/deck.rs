//! Randomness helpers: deck shuffling, room codes and secret tokens.

use rand::Rng;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 4;

/// Fisher-Yates shuffle in place
pub fn shuffle<T>(items: &mut [T]) {
    shuffle_with(items, &mut rand::rng());
}

pub fn shuffle_with<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Generate a random room code (4 characters)
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// 128-bit secret, hex encoded
pub fn generate_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
