use std::{
    any::{type_name, Any},
    marker::PhantomData,
    sync::atomic::{AtomicUsize, Ordering},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};

// TODO: maybe add uuid so that we can't pass one rdd index to another context
#[derive(Serialize, Deserialize)]
pub struct RddIndex<T> {
    pub id: RddId,
    #[serde(skip)]
    _data: PhantomData<T>,
}

impl<T> RddIndex<T> {
    pub fn new(id: RddId) -> Self {
        RddIndex {
            id,
            _data: PhantomData,
        }
    }
}

impl<T> Clone for RddIndex<T> {
    fn clone(&self) -> RddIndex<T> {
        RddIndex::new(self.id)
    }
}

impl<T> Copy for RddIndex<T> {}

#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct RddId(pub usize);
impl RddId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> RddId {
        static COUNTER: AtomicUsize = AtomicUsize::new(1);
        RddId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct RddPartitionId {
    pub rdd_id: RddId,
    pub partition_id: usize,
}

pub trait Data: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Data for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Materialized partition or shuffle bucket, always a `Vec<Item>` of the producing rdd.
pub type AnyPartition = Box<dyn Any + Send>;

pub(crate) fn downcast_partition<T: 'static>(partition: AnyPartition) -> Result<T> {
    partition
        .downcast::<T>()
        .map(|typed| *typed)
        .map_err(|_| Error::PartitionType(type_name::<T>()))
}

pub enum Dependency {
    Narrow(RddId),
    Wide(RddId),
    No,
}

pub trait NarrowRddWork {
    /// `input_partition` is the materialized parent partition, `None` for source rdds.
    /// Ownership of results is passed back to the executor.
    fn work(
        &self,
        input_partition: Option<AnyPartition>,
        partition_id: usize,
    ) -> Result<AnyPartition>;
}

trait TypedRddWideWork: TypedRdd<Item = (Self::K, Self::Out)> {
    type K: Data;
    type V: Data;
    type C: Data;
    type Out: Data;

    fn partition_data(
        &self,
        input_partition: Vec<(Self::K, Self::V)>,
    ) -> Vec<Vec<(Self::K, Self::V)>>;
    fn aggregate_inside_bucket(
        &self,
        bucket_data: Vec<(Self::K, Self::V)>,
    ) -> Vec<(Self::K, Self::C)>;
    fn aggregate_buckets(
        &self,
        buckets_aggr_data: Vec<Vec<(Self::K, Self::C)>>,
    ) -> Vec<(Self::K, Self::Out)>;
}

///per partition:
// 1.
// partition_data Vec<(K, V)> --> Vec<Vec<(K, V)>>
// 2. aggregate bucket
// aggregate_inside_bucket Vec<(K, V)> --> Vec<(K, C)>
// 3. buckets cross the shuffle boundary serialized
// 4.
// aggregate_buckets Vec<Vec<(K, C)>> --> Vec<(K, Out)>
pub trait RddWideWork {
    /// distributes data in local buckets according to K
    fn partition_data(&self, input_partition: AnyPartition) -> Result<Vec<AnyPartition>>;

    /// aggregates data in single bucket
    fn aggregate_inside_bucket(&self, bucket_data: AnyPartition) -> Result<AnyPartition>;

    /// aggregates data from multiple buckets into single Vector
    fn aggregate_buckets(&self, buckets_aggr_data: Vec<AnyPartition>) -> Result<AnyPartition>;

    fn serialize_bucket(&self, bucket: &(dyn Any + Send)) -> Result<Vec<u8>>;

    fn deserialize_bucket(&self, serialized_bucket: &[u8]) -> Result<AnyPartition>;
}

impl<T> RddWideWork for T
where
    T: TypedRddWideWork,
{
    fn partition_data(&self, input_partition: AnyPartition) -> Result<Vec<AnyPartition>> {
        Ok(
            <Self as TypedRddWideWork>::partition_data(self, downcast_partition(input_partition)?)
                .into_iter()
                .map(|x| -> AnyPartition { Box::new(x) })
                .collect(),
        )
    }

    fn aggregate_inside_bucket(&self, bucket_data: AnyPartition) -> Result<AnyPartition> {
        Ok(Box::new(<Self as TypedRddWideWork>::aggregate_inside_bucket(
            self,
            downcast_partition(bucket_data)?,
        )))
    }

    fn aggregate_buckets(&self, buckets_aggr_data: Vec<AnyPartition>) -> Result<AnyPartition> {
        let buckets = buckets_aggr_data
            .into_iter()
            .map(downcast_partition)
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(<Self as TypedRddWideWork>::aggregate_buckets(
            self, buckets,
        )))
    }

    fn serialize_bucket(&self, bucket: &(dyn Any + Send)) -> Result<Vec<u8>> {
        let data = bucket
            .downcast_ref::<Vec<(T::K, T::C)>>()
            .ok_or(Error::PartitionType(type_name::<Vec<(T::K, T::C)>>()))?;
        Ok(rmp_serde::to_vec(data)?)
    }

    fn deserialize_bucket(&self, serialized_bucket: &[u8]) -> Result<AnyPartition> {
        let data: Vec<(T::K, T::C)> = rmp_serde::from_slice(serialized_bucket)?;
        Ok(Box::new(data))
    }
}

pub enum RddWorkFns<'a> {
    Narrow(&'a dyn NarrowRddWork),
    Wide(&'a dyn RddWideWork),
}

pub trait RddBase: Send + Sync {
    /// Fetch unique id for this rdd
    fn id(&self) -> RddId;

    /// rdd dependencies
    fn rdd_dependency(&self) -> Dependency;

    fn partitions_num(&self) -> usize;

    fn work_fns(&self) -> RddWorkFns;
}

trait TypedNarrowRddWork {
    type InputItem: Data;
    type OutputItem: Data;

    fn work(
        &self,
        input_partition: Option<Vec<Self::InputItem>>,
        partition_id: usize,
    ) -> Vec<Self::OutputItem>;
}

/// methods for Rdd which are dependent on `Item` type
trait TypedRdd {
    type Item: Data;
}

impl<T> NarrowRddWork for T
where
    T: TypedNarrowRddWork,
{
    fn work(
        &self,
        input_partition: Option<AnyPartition>,
        partition_id: usize,
    ) -> Result<AnyPartition> {
        let typed_input = input_partition.map(downcast_partition).transpose()?;
        Ok(Box::new(<Self as TypedNarrowRddWork>::work(
            self,
            typed_input,
            partition_id,
        )))
    }
}

pub mod data_rdd;

pub mod map_rdd;

pub mod flat_map_rdd;

pub mod shuffle_rdd;
