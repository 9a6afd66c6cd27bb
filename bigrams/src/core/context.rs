use std::{hash::Hash, ops::Add};

use super::rdd::{
    flat_map_rdd::FlatMapper,
    map_rdd::Mapper,
    shuffle_rdd::{Aggregator, Partitioner},
    Data, RddIndex,
};

/// Lazily builds up the rdd graph. Nothing runs until the graph is collected.
pub trait Context {
    /// every inner `Vec` becomes one partition
    fn new_from_list<T: Data + Clone>(&mut self, data: Vec<Vec<T>>) -> RddIndex<T>;

    /// splits `data` into `partitions_num` contiguous partitions, keeping element order
    fn parallelize<T: Data>(&mut self, data: Vec<T>, partitions_num: usize) -> RddIndex<T>;

    fn map<T: Data, U: Data>(&mut self, rdd: RddIndex<T>, f: fn(T) -> U) -> RddIndex<U>;

    fn map_with_state<T: Data, U: Data, M: Mapper<In = T, Out = U>>(
        &mut self,
        rdd: RddIndex<T>,
        mapper: M,
    ) -> RddIndex<U>;

    fn flat_map<T: Data, U: Data, I: IntoIterator<Item = U> + 'static>(
        &mut self,
        rdd: RddIndex<T>,
        f: fn(T) -> I,
    ) -> RddIndex<U>;

    fn flat_map_with_state<
        T: Data,
        U: Data,
        I: IntoIterator<Item = U>,
        F: FlatMapper<In = T, OutIterable = I>,
    >(
        &mut self,
        rdd: RddIndex<T>,
        flat_mapper: F,
    ) -> RddIndex<U>;

    // (K, V) -> (K, Out)
    fn shuffle<K, P, A>(
        &mut self,
        rdd: RddIndex<(K, A::Value)>,
        partitioner: P,
        aggregator: A,
    ) -> RddIndex<(K, A::Output)>
    where
        K: Data + Eq + Hash,
        P: Partitioner<Key = K>,
        A: Aggregator;

    // (K, V) -> (K, Vec<V>)
    fn group_by<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, Vec<V>)>
    where
        K: Data + Eq + Hash,
        V: Data,
        P: Partitioner<Key = K>;

    // (K, Add) -> (K, Add)
    fn sum_by_key<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, V)>
    where
        K: Data + Eq + Hash,
        V: Data + Add<Output = V> + Default,
        P: Partitioner<Key = K>;

    fn min_by_key<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, V)>
    where
        K: Data + Eq + Hash,
        V: Data + Ord + Default,
        P: Partitioner<Key = K>;

    fn max_by_key<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, V)>
    where
        K: Data + Eq + Hash,
        V: Data + Ord + Default,
        P: Partitioner<Key = K>;

    fn count_by_key<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, u64)>
    where
        K: Data + Eq + Hash,
        V: Data,
        P: Partitioner<Key = K>;

    // (K, V) -> (K, sorted distinct Vec<V>)
    fn distinct_by_key<K, V, P>(
        &mut self,
        rdd: RddIndex<(K, V)>,
        partitioner: P,
    ) -> RddIndex<(K, Vec<V>)>
    where
        K: Data + Eq + Hash,
        V: Data + Ord,
        P: Partitioner<Key = K>;
}
