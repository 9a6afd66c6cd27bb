use std::{collections::BTreeSet, marker::PhantomData};

use crate::core::rdd::{shuffle_rdd::Aggregator, Data};

/// Collects the distinct values of a key. Unlike `GroupByAggregator` the finalized list has a
/// defined order: ascending.
#[derive(Clone)]
pub struct DistinctAggregator<V> {
    _value: PhantomData<V>,
}

impl<V> DistinctAggregator<V> {
    pub fn new() -> Self {
        DistinctAggregator {
            _value: PhantomData,
        }
    }
}

impl<V> Default for DistinctAggregator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Data + Ord> Aggregator for DistinctAggregator<V> {
    type Value = V;

    type Combiner = BTreeSet<V>;

    type Output = Vec<V>;

    fn create_combiner(&self) -> Self::Combiner {
        BTreeSet::new()
    }

    fn merge_value(&self, value: Self::Value, mut combiner: Self::Combiner) -> Self::Combiner {
        combiner.insert(value);
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
        combiner.into_iter().collect()
    }
}
