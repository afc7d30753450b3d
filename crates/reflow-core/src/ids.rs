// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Short random base-36 identifiers.

use rand::Rng;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of ids minted by [`short_id`].
pub const SHORT_ID_LEN: usize = 7;

/// Draw a random 7-character lowercase base-36 id.
///
/// Uniqueness is the caller's job; the registry redraws on collision.
pub fn short_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SHORT_ID_LEN)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn ids_have_fixed_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let id = short_id(&mut rng);
            assert_eq!(id.len(), SHORT_ID_LEN);
            assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }
}
