use std::marker::PhantomData;

use crate::core::rdd::{shuffle_rdd::Aggregator, Data};

/// Number of values per key, whatever the values are.
#[derive(Clone)]
pub struct CountByKeyAggregator<V> {
    _value: PhantomData<V>,
}

impl<V> CountByKeyAggregator<V> {
    pub fn new() -> Self {
        CountByKeyAggregator {
            _value: PhantomData,
        }
    }
}

impl<V> Default for CountByKeyAggregator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Data> Aggregator for CountByKeyAggregator<V> {
    type Value = V;

    type Combiner = u64;

    type Output = u64;

    fn create_combiner(&self) -> Self::Combiner {
        0
    }

    fn merge_value(&self, _value: Self::Value, combiner: Self::Combiner) -> Self::Combiner {
        combiner + 1
    }

    fn merge_combiners(
        &self,
        combiner1: Self::Combiner,
        combiner2: Self::Combiner,
    ) -> Self::Combiner {
        combiner1 + combiner2
    }

    fn finalize(&self, combiner: Self::Combiner) -> Self::Output {
        combiner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_ignore_values() {
        let aggr = CountByKeyAggregator::<String>::new();
        let left = ["a", "b"]
            .iter()
            .fold(aggr.create_combiner(), |c, v| aggr.merge_value(v.to_string(), c));
        let right = aggr.merge_value("a".to_string(), aggr.create_combiner());
        assert_eq!(aggr.finalize(aggr.merge_combiners(left, right)), 3);
        assert_eq!(aggr.finalize(aggr.create_combiner()), 0);
    }
}
