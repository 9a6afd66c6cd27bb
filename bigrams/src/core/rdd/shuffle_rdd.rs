use std::{collections::HashMap, hash::Hash};

use super::{Data, Dependency, RddBase, RddId, RddIndex, RddWorkFns, TypedRdd, TypedRddWideWork};

pub struct ShuffleRdd<K, P, A: Aggregator> {
    pub idx: RddIndex<(K, A::Output)>,
    pub prev: RddIndex<(K, A::Value)>,
    pub partitioner: P,
    pub aggregator: A,
}

pub trait Partitioner: Clone + Send + Sync + 'static {
    type Key: Data;
    fn partitions_num(&self) -> usize;
    fn partition_by(&self, key: &Self::Key) -> usize;
}

/// Grouped reduction used by shuffles.
///
/// `create_combiner` must be an identity for `merge_combiners` and `merge_combiners` must be
/// associative and commutative: buckets reach the reducing side in no particular order.
// () -> Acc
// (V, Acc) -> Acc
// (Acc, Acc) -> Acc
// Acc -> Out
pub trait Aggregator: Clone + Send + Sync + 'static {
    type Value: Data;
    type Combiner: Data;
    type Output: Data;

    fn create_combiner(&self) -> Self::Combiner;
    fn merge_value(&self, value: Self::Value, combiner: Self::Combiner) -> Self::Combiner;
    fn merge_combiners(
        &self,
        combiner1: Self::Combiner,
        combiner2: Self::Combiner,
    ) -> Self::Combiner;
    fn finalize(&self, combiner: Self::Combiner) -> Self::Output;
}

impl<K, P, A> TypedRdd for ShuffleRdd<K, P, A>
where
    K: Data + Eq + Hash,
    P: Partitioner<Key = K>,
    A: Aggregator,
{
    type Item = (K, A::Output);
}

impl<K, P, A> TypedRddWideWork for ShuffleRdd<K, P, A>
where
    K: Data + Eq + Hash,
    P: Partitioner<Key = K>,
    A: Aggregator,
{
    type K = K;
    type V = A::Value;
    type C = A::Combiner;
    type Out = A::Output;

    fn partition_data(
        &self,
        input_partition: Vec<(Self::K, Self::V)>,
    ) -> Vec<Vec<(Self::K, Self::V)>> {
        let mut result = Vec::new();
        for _ in 0..self.partitioner.partitions_num() {
            result.push(Vec::new());
        }

        for elem in input_partition.into_iter() {
            let partition_idx = self.partitioner.partition_by(&elem.0);
            result[partition_idx].push(elem);
        }

        result
    }

    fn aggregate_inside_bucket(
        &self,
        bucket_data: Vec<(Self::K, Self::V)>,
    ) -> Vec<(Self::K, Self::C)> {
        let aggr = &self.aggregator;

        let mut bucket_by_keys = HashMap::new();
        for (k, v) in bucket_data.into_iter() {
            bucket_by_keys.entry(k).or_insert_with(Vec::new).push(v)
        }

        bucket_by_keys
            .into_iter()
            .map(|x| {
                (
                    x.0,
                    x.1.into_iter()
                        .fold(aggr.create_combiner(), |acc, y| aggr.merge_value(y, acc)),
                )
            })
            .collect()
    }

    fn aggregate_buckets(
        &self,
        buckets_aggr_data: Vec<Vec<(Self::K, Self::C)>>,
    ) -> Vec<(Self::K, Self::Out)> {
        let aggr = &self.aggregator;

        let mut combiners_by_keys = HashMap::new();
        for bucket_combiners in buckets_aggr_data.into_iter() {
            for (k, c) in bucket_combiners.into_iter() {
                combiners_by_keys.entry(k).or_insert_with(Vec::new).push(c)
            }
        }
        combiners_by_keys
            .into_iter()
            .map(|x| {
                let combined = x.1.into_iter().fold(aggr.create_combiner(), |acc1, acc2| {
                    aggr.merge_combiners(acc1, acc2)
                });
                (x.0, aggr.finalize(combined))
            })
            .collect()
    }
}

impl<K, P, A> RddBase for ShuffleRdd<K, P, A>
where
    K: Data + Eq + Hash,
    P: Partitioner<Key = K>,
    A: Aggregator,
{
    fn id(&self) -> RddId {
        self.idx.id
    }

    fn rdd_dependency(&self) -> Dependency {
        Dependency::Wide(self.prev.id)
    }

    fn partitions_num(&self) -> usize {
        self.partitioner.partitions_num()
    }

    fn work_fns(&self) -> RddWorkFns {
        RddWorkFns::Wide(self)
    }
}
