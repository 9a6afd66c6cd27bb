use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

use crate::core::rdd::{shuffle_rdd::Partitioner, Data};

#[derive(Clone)]
pub struct HashPartitioner<T> {
    num_partitions: usize,
    _value: PhantomData<T>,
}

impl<T> HashPartitioner<T> {
    /// `num_partitions` of zero is treated as one.
    pub fn new(num_partitions: usize) -> Self {
        Self {
            num_partitions: num_partitions.max(1),
            _value: PhantomData,
        }
    }
}

impl<T: Data + Hash> Partitioner for HashPartitioner<T> {
    type Key = T;

    fn partitions_num(&self) -> usize {
        self.num_partitions
    }

    fn partition_by(&self, key: &Self::Key) -> usize {
        let mut s = DefaultHasher::new();
        key.hash(&mut s);
        s.finish() as usize % self.num_partitions
    }
}
