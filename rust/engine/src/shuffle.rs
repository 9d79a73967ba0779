use rand::seq::SliceRandom;
use rand::Rng;

/// Returns a uniformly random permutation of `items` without touching the input.
///
/// `SliceRandom::shuffle` is a Fisher–Yates shuffle, so every permutation is
/// equally likely for a uniform `rng`. Empty and single-element inputs come
/// back unchanged.
///
/// # Examples
///
/// ```
/// use pairs_engine::shuffle::shuffled;
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha20Rng;
///
/// let mut rng = ChaCha20Rng::seed_from_u64(7);
/// let input = vec![1, 2, 3, 4];
/// let out = shuffled(&input, &mut rng);
///
/// let mut sorted = out.clone();
/// sorted.sort();
/// assert_eq!(sorted, input);
/// ```
pub fn shuffled<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    if out.len() > 1 {
        out.shuffle(rng);
    }
    out
}
