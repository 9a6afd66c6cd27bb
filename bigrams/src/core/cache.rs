use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use super::rdd::RddPartitionId;
use crate::error::{Error, Result};

/// Serialized shuffle buckets, keyed by the wide partition they belong to and the narrow
/// partition which produced them. Shared between all executors of the process.
///
/// Entries live until the dag scheduler prunes them: every job keeps only the buckets of
/// shuffles in its own lineage.
#[derive(Clone, Default, Debug)]
pub struct BucketCache {
    inner: Arc<Mutex<HashMap<(RddPartitionId, usize), Vec<u8>>>>,
}

impl BucketCache {
    pub fn has(&self, wide_partition: RddPartitionId, narrow_partition_id: usize) -> bool {
        self.inner
            .lock()
            .contains_key(&(wide_partition, narrow_partition_id))
    }

    /// A bucket which is already present is overwritten. Recomputing a partition yields the same
    /// bytes, so the last writer wins.
    pub fn put(&self, wide_partition: RddPartitionId, narrow_partition_id: usize, data: Vec<u8>) {
        self.inner
            .lock()
            .insert((wide_partition, narrow_partition_id), data);
    }

    /// Buckets stay in the cache, a later job over the same graph reads them again.
    pub fn fetch_all(
        &self,
        wide_partition: RddPartitionId,
        narrow_partitions_num: usize,
    ) -> Result<Vec<Vec<u8>>> {
        let inner = self.inner.lock();
        (0..narrow_partitions_num)
            .map(|narrow_partition_id| {
                inner
                    .get(&(wide_partition, narrow_partition_id))
                    .cloned()
                    .ok_or(Error::MissingBucket {
                        partition: wide_partition,
                        narrow_partition_id,
                    })
            })
            .collect()
    }

    /// Drops every bucket whose wide partition fails `keep`.
    pub fn retain(&self, mut keep: impl FnMut(RddPartitionId) -> bool) {
        self.inner
            .lock()
            .retain(|(wide_partition, _), _| keep(*wide_partition));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
