//! Cumulative-weight random sampler.

use rand::Rng;

/// Elements keyed by strictly increasing cumulative weight.
///
/// A draw of `U(0, total)` selects the element owning the first boundary
/// strictly greater than the draw, so element `i` is returned with
/// probability `weight_i / total`.
#[derive(Debug, Clone)]
pub struct WeightedCollection<E> {
    // (cumulative upper boundary, element), boundaries strictly increasing
    entries: Vec<(f64, E)>,
    total: f64,
}

impl<E> Default for WeightedCollection<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            total: 0.0,
        }
    }
}

impl<E> WeightedCollection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element. Non-positive or non-finite weights are ignored.
    pub fn add(&mut self, weight: f64, value: E) -> &mut Self {
        if !(weight > 0.0) || !weight.is_finite() {
            return self;
        }
        self.total += weight;
        self.entries.push((self.total, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    /// Draw an element, or `None` when the collection is empty.
    pub fn try_next<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&E> {
        if self.entries.is_empty() {
            return None;
        }
        let draw = rng.gen_range(0.0..self.total);
        let idx = self.entries.partition_point(|(bound, _)| *bound <= draw);
        self.entries.get(idx.min(self.entries.len() - 1)).map(|(_, e)| e)
    }

    /// Draw an element.
    ///
    /// # Panics
    ///
    /// Sampling an empty collection is a programming error; check
    /// [`is_empty`](Self::is_empty) first.
    pub fn next<R: Rng + ?Sized>(&self, rng: &mut R) -> &E {
        match self.try_next(rng) {
            Some(e) => e,
            None => panic!("sampled an empty WeightedCollection"),
        }
    }

    /// Elements with their individual weights, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &E)> {
        let mut previous = 0.0;
        self.entries.iter().map(move |(bound, e)| {
            let weight = bound - previous;
            previous = *bound;
            (weight, e)
        })
    }
}

impl<E: Clone> WeightedCollection<E> {
    /// Elements in insertion order.
    pub fn to_vec(&self) -> Vec<E> {
        self.entries.iter().map(|(_, e)| e.clone()).collect()
    }
}

impl<E> FromIterator<(f64, E)> for WeightedCollection<E> {
    fn from_iter<I: IntoIterator<Item = (f64, E)>>(iter: I) -> Self {
        let mut collection = Self::new();
        for (weight, value) in iter {
            collection.add(weight, value);
        }
        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_frequencies_converge_to_weights() {
        let mut collection = WeightedCollection::new();
        collection.add(10.0, 'a').add(20.0, 'b').add(5.0, 'c');

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let draws = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..draws {
            match collection.next(&mut rng) {
                'a' => counts[0] += 1,
                'b' => counts[1] += 1,
                _ => counts[2] += 1,
            }
        }

        let expected = [10.0 / 35.0, 20.0 / 35.0, 5.0 / 35.0];
        for (count, p) in counts.iter().zip(expected) {
            let observed = *count as f64 / draws as f64;
            assert!((observed - p).abs() < 0.01, "observed {observed}, expected {p}");
        }
    }

    #[test]
    #[should_panic(expected = "empty WeightedCollection")]
    fn test_empty_collection_panics() {
        let collection: WeightedCollection<u8> = WeightedCollection::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        collection.next(&mut rng);
    }

    #[test]
    fn test_try_next_on_empty() {
        let collection: WeightedCollection<u8> = WeightedCollection::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(collection.try_next(&mut rng).is_none());
    }

    #[test]
    fn test_non_positive_weights_ignored() {
        let mut collection = WeightedCollection::new();
        collection.add(0.0, "zero").add(-3.0, "negative").add(f64::NAN, "nan").add(2.0, "kept");
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.to_vec(), vec!["kept"]);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(*collection.next(&mut rng), "kept");
        }
    }

    #[test]
    fn test_iter_reports_individual_weights_in_order() {
        let collection: WeightedCollection<&str> =
            [(1.0, "x"), (3.0, "y"), (0.5, "z")].into_iter().collect();
        let weights: Vec<(f64, &str)> = collection.iter().map(|(w, e)| (w, *e)).collect();
        assert_eq!(weights, vec![(1.0, "x"), (3.0, "y"), (0.5, "z")]);
        assert_eq!(collection.total_weight(), 4.5);
    }
}
