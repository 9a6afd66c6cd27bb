use log::trace;

use crate::error::{Error, Result};

use super::{
    cache::BucketCache,
    graph::Graph,
    rdd::{AnyPartition, Dependency, RddPartitionId, RddWorkFns},
    task_scheduler::WideTask,
};

/// Materializes partitions. Narrow chains are recomputed inside a single task, wide rdds are
/// read from the buckets earlier tasks left in `received_buckets`.
#[derive(Clone, Default, Debug)]
pub struct Executor {
    pub received_buckets: BucketCache,
}

impl Executor {
    pub fn new(received_buckets: BucketCache) -> Self {
        Self { received_buckets }
    }

    pub fn resolve(&self, graph: &Graph, id: RddPartitionId) -> Result<AnyPartition> {
        let rdd = graph.get_rdd(id.rdd_id).ok_or(Error::RddNotFound(id.rdd_id))?;
        match rdd.work_fns() {
            RddWorkFns::Narrow(narrow_work) => {
                let input_partition = match rdd.rdd_dependency() {
                    Dependency::Narrow(dep_rdd_id) => Some(self.resolve(
                        graph,
                        RddPartitionId {
                            rdd_id: dep_rdd_id,
                            partition_id: id.partition_id,
                        },
                    )?),
                    Dependency::Wide(_) | Dependency::No => None,
                };
                trace!("running narrow work for {id:?}");
                narrow_work.work(input_partition, id.partition_id)
            }
            RddWorkFns::Wide(wide_work) => {
                let narrow_partitions_num = match rdd.rdd_dependency() {
                    Dependency::Wide(dep_rdd_id) => graph
                        .get_rdd(dep_rdd_id)
                        .ok_or(Error::RddNotFound(dep_rdd_id))?
                        .partitions_num(),
                    Dependency::Narrow(_) | Dependency::No => 0,
                };
                let buckets = self
                    .received_buckets
                    .fetch_all(id, narrow_partitions_num)?
                    .iter()
                    .map(|bucket| wide_work.deserialize_bucket(bucket))
                    .collect::<Result<Vec<_>>>()?;
                trace!("merging {} buckets for {id:?}", buckets.len());
                wide_work.aggregate_buckets(buckets)
            }
        }
    }

    /// Runs the map side of a shuffle: materializes one narrow partition, splits it per target
    /// wide partition and pre-aggregates every bucket. Returns serialized buckets, indexed by
    /// wide partition id.
    pub fn resolve_task(&self, graph: &Graph, wide_task: &WideTask) -> Result<Vec<Vec<u8>>> {
        let wide_rdd = graph
            .get_rdd(wide_task.wide_rdd_id)
            .ok_or(Error::RddNotFound(wide_task.wide_rdd_id))?;
        let wide_work = match wide_rdd.work_fns() {
            RddWorkFns::Wide(wide_work) => wide_work,
            RddWorkFns::Narrow(_) => return Err(Error::NotShuffle(wide_task.wide_rdd_id)),
        };
        let narrow_partition = self.resolve(
            graph,
            RddPartitionId {
                rdd_id: wide_task.narrow_rdd_id,
                partition_id: wide_task.narrow_partition_id,
            },
        )?;
        wide_work
            .partition_data(narrow_partition)?
            .into_iter()
            .map(|bucket| {
                let aggregated = wide_work.aggregate_inside_bucket(bucket)?;
                wide_work.serialize_bucket(aggregated.as_ref())
            })
            .collect()
    }
}
