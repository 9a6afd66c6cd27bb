use std::marker::PhantomData;

use crate::core::rdd::{shuffle_rdd::Aggregator, Data};

// `None` is the identity so that empty partial results merge cleanly.

#[derive(Clone)]
pub struct MinByKeyAggregator<V> {
    _value: PhantomData<V>,
}

impl<V> MinByKeyAggregator<V> {
    pub fn new() -> Self {
        MinByKeyAggregator {
            _value: PhantomData,
        }
    }
}

impl<V> Default for MinByKeyAggregator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Data + Ord + Default> Aggregator for MinByKeyAggregator<V> {
    type Value = V;

    type Combiner = Option<V>;

    type Output = V;

    fn create_combiner(&self) -> Self::Combiner {
        None
    }

    fn merge_value(&self, value: Self::Value, combiner: Self::Combiner) -> Self::Combiner {
        self.merge_combiners(combiner, Some(value))
    }

    fn merge_combiners(
        &self,
        combiner1: Self::Combiner,
        combiner2: Self::Combiner,
    ) -> Self::Combiner {
        match (combiner1, combiner2) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn finalize(&self, combiner: Self::Combiner) -> Self::Output {
        // every key reaching finalize has seen at least one value
        combiner.unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct MaxByKeyAggregator<V> {
    _value: PhantomData<V>,
}

impl<V> MaxByKeyAggregator<V> {
    pub fn new() -> Self {
        MaxByKeyAggregator {
            _value: PhantomData,
        }
    }
}

impl<V> Default for MaxByKeyAggregator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Data + Ord + Default> Aggregator for MaxByKeyAggregator<V> {
    type Value = V;

    type Combiner = Option<V>;

    type Output = V;

    fn create_combiner(&self) -> Self::Combiner {
        None
    }

    fn merge_value(&self, value: Self::Value, combiner: Self::Combiner) -> Self::Combiner {
        self.merge_combiners(combiner, Some(value))
    }

    fn merge_combiners(
        &self,
        combiner1: Self::Combiner,
        combiner2: Self::Combiner,
    ) -> Self::Combiner {
        match (combiner1, combiner2) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    fn finalize(&self, combiner: Self::Combiner) -> Self::Output {
        combiner.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_ignores_empty_partials() {
        let aggr = MinByKeyAggregator::<u64>::new();
        let left = [5, 3, 9]
            .into_iter()
            .fold(aggr.create_combiner(), |acc, v| aggr.merge_value(v, acc));
        let merged = aggr.merge_combiners(aggr.create_combiner(), left);
        let merged = aggr.merge_combiners(merged, Some(4));
        assert_eq!(aggr.finalize(merged), 3);
    }

    #[test]
    fn test_max_is_order_independent() {
        let aggr = MaxByKeyAggregator::<String>::new();
        let a = aggr.merge_value("cat".to_string(), aggr.create_combiner());
        let b = aggr.merge_value("mat".to_string(), aggr.create_combiner());
        assert_eq!(
            aggr.merge_combiners(a.clone(), b.clone()),
            aggr.merge_combiners(b, a)
        );
    }
}
