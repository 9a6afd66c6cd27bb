use std::marker::PhantomData;

use crate::core::rdd::{shuffle_rdd::Aggregator, Data};

/// Collects every value of a key into a list.
///
/// Values are appended in arrival order inside a bucket and partial lists are concatenated in
/// whatever order buckets are merged, so element order across buckets is undefined.
#[derive(Clone)]
pub struct GroupByAggregator<V> {
    _value: PhantomData<V>,
}

impl<V> GroupByAggregator<V> {
    pub fn new() -> Self {
        GroupByAggregator {
            _value: PhantomData,
        }
    }
}

impl<V> Default for GroupByAggregator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Data> Aggregator for GroupByAggregator<V> {
    type Value = V;

    type Combiner = Vec<V>;

    type Output = Vec<V>;

    fn create_combiner(&self) -> Self::Combiner {
        Vec::new()
    }

    fn merge_value(&self, value: Self::Value, mut combiner: Self::Combiner) -> Self::Combiner {
        combiner.push(value);
        combiner
    }

    fn merge_combiners(
        &self,
        mut combiner1: Self::Combiner,
        combiner2: Self::Combiner,
    ) -> Self::Combiner {
        combiner1.extend(combiner2);
        combiner1
    }

    fn finalize(&self, combiner: Self::Combiner) -> Self::Output {
        combiner
    }
}
