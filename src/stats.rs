use std::collections::BTreeMap;

/// Running sums for groups of fixed-width numeric samples, keyed by `K`.
///
/// The stabilizer groups by container ID across rounds, the summary uses a
/// single unit key across the whole batch. Means are rounded only in
/// [`KeyedMean::finish`].
#[derive(Debug, Clone)]
pub struct KeyedMean<K: Ord, const N: usize> {
    groups: BTreeMap<K, Group<N>>,
}

#[derive(Debug, Clone, Copy)]
struct Group<const N: usize> {
    sums: [f64; N],
    count: usize,
}

impl<K: Ord, const N: usize> Default for KeyedMean<K, N> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K: Ord, const N: usize> KeyedMean<K, N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K, sample: [f64; N]) {
        let group = self.groups.entry(key).or_insert(Group {
            sums: [0.0; N],
            count: 0,
        });
        for (sum, value) in group.sums.iter_mut().zip(sample) {
            *sum += value;
        }
        group.count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Unrounded mean per key, ascending key order. A key's mean covers
    /// only the samples added for it.
    pub fn finish_exact(self) -> Vec<(K, [f64; N])> {
        self.groups
            .into_iter()
            .map(|(key, g)| (key, g.sums.map(|sum| sum / g.count as f64)))
            .collect()
    }

    /// [`KeyedMean::finish_exact`] rounded to whole milliseconds.
    pub fn finish(self) -> Vec<(K, [u64; N])> {
        self.finish_exact()
            .into_iter()
            .map(|(key, means)| (key, means.map(round_ms)))
            .collect()
    }
}

impl<K: Ord, const N: usize> FromIterator<(K, [f64; N])> for KeyedMean<K, N> {
    fn from_iter<I: IntoIterator<Item = (K, [f64; N])>>(iter: I) -> Self {
        let mut acc = Self::new();
        for (key, sample) in iter {
            acc.add(key, sample);
        }
        acc
    }
}

/// Nearest whole millisecond, ties away from zero. Negative and NaN inputs
/// clamp to 0.
pub fn round_ms(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    value.round() as u64
}
