//! Train/validation splitting.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Split by index cut: the first `1 - val_fraction` go to training.
///
/// Items keep their incoming (on-disk) order unless `shuffle_seed` is set, in
/// which case they are shuffled deterministically before the cut. With at least
/// two items both sides are non-empty.
pub fn split_train_val<T>(mut items: Vec<T>, val_fraction: f32, shuffle_seed: Option<u64>) -> (Vec<T>, Vec<T>) {
    if let Some(seed) = shuffle_seed {
        let mut rng = StdRng::seed_from_u64(seed);
        items.shuffle(&mut rng);
    }
    let n = items.len();
    let frac = val_fraction.clamp(0.0, 1.0);
    let mut train_len = ((n as f32) * (1.0 - frac)).floor() as usize;
    if n >= 2 {
        train_len = train_len.clamp(1, n - 1);
    } else {
        train_len = n;
    }
    let val = items.split_off(train_len);
    (items, val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eighty_twenty_in_order() {
        let (train, val) = split_train_val((0..10).collect(), 0.2, None);
        assert_eq!(train, (0..8).collect::<Vec<_>>());
        assert_eq!(val, vec![8, 9]);
    }

    #[test]
    fn seeded_shuffle_is_deterministic() {
        let a = split_train_val((0..20).collect::<Vec<i32>>(), 0.2, Some(3));
        let b = split_train_val((0..20).collect::<Vec<i32>>(), 0.2, Some(3));
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 16);
    }

    #[test]
    fn tiny_sets_keep_both_sides() {
        let (train, val) = split_train_val(vec![1, 2], 0.2, None);
        assert_eq!((train.len(), val.len()), (1, 1));
        let (train, val) = split_train_val(vec![1], 0.2, None);
        assert_eq!((train.len(), val.len()), (1, 0));
    }
}
