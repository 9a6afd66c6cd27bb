use std::{fmt::Debug, hash::Hash, ops::Add};

use log::info;
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{Error, Result},
    Config,
};

use self::{
    count_by_key::CountByKeyAggregator,
    distinct::DistinctAggregator,
    extrema::{MaxByKeyAggregator, MinByKeyAggregator},
    group_by::GroupByAggregator,
    sum_by_key::SumByKeyAggregator,
};

use super::{
    cache::BucketCache,
    context::Context,
    dag_scheduler::{DagScheduler, Job},
    graph::Graph,
    rdd::{
        data_rdd::DataRdd,
        downcast_partition,
        flat_map_rdd::{FlatMapRdd, FlatMapper, FnPtrFlatMapper},
        map_rdd::{FnPtrMapper, MapRdd, Mapper},
        shuffle_rdd::{Aggregator, Partitioner, ShuffleRdd},
        Data, RddId, RddIndex,
    },
    task_scheduler::{DagMessage, TaskScheduler, WorkerEvent},
};

/// Handle of the in-process engine: holds the graph built up by user code and hands jobs to the
/// dag scheduler.
pub struct Spark {
    /// Resposible for storing current graph build up by user
    graph: Graph,
    job_channel: mpsc::Sender<Job>,
    bucket_cache: BucketCache,
}

impl Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("graph", &self.graph)
            .field("target_rdd_id", &self.target_rdd_id)
            .finish()
    }
}

impl Spark {
    /// Starts the dag scheduler and task scheduler on the current tokio runtime.
    pub async fn new(config: &Config) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>(32);
        let (dag_msg_tx, dag_msg_rx) = mpsc::channel::<DagMessage>(32);
        let (dag_evt_tx, dag_evt_rx) = mpsc::channel::<WorkerEvent>(32);

        // dag scheduler  ----Message---->  task scheduler
        //                <----Event------  workers
        let bucket_cache = BucketCache::default();
        let dag_scheduler =
            DagScheduler::new(job_rx, dag_msg_tx, dag_evt_rx, bucket_cache.clone());
        tokio::spawn(async move { dag_scheduler.start().await });
        let task_scheduler = TaskScheduler::new(
            dag_msg_rx,
            dag_evt_tx,
            config.workers,
            bucket_cache.clone(),
        );
        tokio::spawn(async move { task_scheduler.start().await });
        info!("engine started with {} workers", config.workers);

        Spark {
            graph: Graph::default(),
            job_channel: job_tx,
            bucket_cache,
        }
    }

    pub async fn collect<T: Data>(&mut self, rdd: RddIndex<T>) -> Result<Vec<T>> {
        let (mat_tx, mat_rx) = oneshot::channel();
        let job = Job {
            graph: self.graph.clone(),
            target_rdd_id: rdd.id,
            materialized_data_channel: mat_tx,
        };
        self.job_channel
            .send(job)
            .await
            .map_err(|_| Error::SchedulerGone)?;
        let partitions = mat_rx.await.map_err(|_| Error::SchedulerGone)??;
        let mut collected = Vec::new();
        for partition in partitions {
            collected.extend(downcast_partition::<Vec<T>>(partition)?);
        }
        Ok(collected)
    }

    /// Number of shuffle buckets currently held for reuse by later jobs.
    pub fn cached_buckets(&self) -> usize {
        self.bucket_cache.len()
    }

    fn partitions_num_of(&self, id: RddId) -> usize {
        self.graph
            .get_rdd(id)
            .map(|rdd| rdd.partitions_num())
            .unwrap_or(1)
    }
}

impl Context for Spark {
    fn new_from_list<T: Data + Clone>(&mut self, data: Vec<Vec<T>>) -> RddIndex<T> {
        let idx = RddIndex::new(RddId::new());
        self.graph.store_new_rdd(DataRdd {
            idx,
            partitions_num: data.len(),
            data,
        });
        idx
    }

    fn parallelize<T: Data>(&mut self, data: Vec<T>, partitions_num: usize) -> RddIndex<T> {
        let partitions_num = partitions_num.max(1);
        let len = data.len();
        let mut items = data.into_iter();
        let partitions = (0..partitions_num)
            .map(|i| {
                let size = (i + 1) * len / partitions_num - i * len / partitions_num;
                items.by_ref().take(size).collect()
            })
            .collect();
        self.new_from_list(partitions)
    }

    fn map<T: Data, U: Data>(&mut self, rdd: RddIndex<T>, f: fn(T) -> U) -> RddIndex<U> {
        self.map_with_state(rdd, FnPtrMapper(f))
    }

    fn map_with_state<T: Data, U: Data, M: Mapper<In = T, Out = U>>(
        &mut self,
        rdd: RddIndex<T>,
        mapper: M,
    ) -> RddIndex<U> {
        let idx = RddIndex::new(RddId::new());
        let partitions_num = self.partitions_num_of(rdd.id);
        self.graph.store_new_rdd(MapRdd {
            idx,
            partitions_num,
            prev: rdd,
            mapper,
        });
        idx
    }

    fn flat_map<T: Data, U: Data, I: IntoIterator<Item = U> + 'static>(
        &mut self,
        rdd: RddIndex<T>,
        f: fn(T) -> I,
    ) -> RddIndex<U> {
        self.flat_map_with_state(rdd, FnPtrFlatMapper(f))
    }

    fn flat_map_with_state<
        T: Data,
        U: Data,
        I: IntoIterator<Item = U>,
        F: FlatMapper<In = T, OutIterable = I>,
    >(
        &mut self,
        rdd: RddIndex<T>,
        flat_mapper: F,
    ) -> RddIndex<U> {
        let idx = RddIndex::new(RddId::new());
        let partitions_num = self.partitions_num_of(rdd.id);
        self.graph.store_new_rdd(FlatMapRdd {
            idx,
            partitions_num,
            prev: rdd,
            flat_mapper,
        });
        idx
    }

    fn shuffle<K, P, A>(
        &mut self,
        rdd: RddIndex<(K, A::Value)>,
        partitioner: P,
        aggregator: A,
    ) -> RddIndex<(K, A::Output)>
    where
        K: Data + Eq + Hash,
        P: Partitioner<Key = K>,
        A: Aggregator,
    {
        let idx = RddIndex::new(RddId::new());
        self.graph.store_new_rdd(ShuffleRdd {
            idx,
            prev: rdd,
            partitioner,
            aggregator,
        });
        idx
    }

    fn group_by<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, Vec<V>)>
    where
        K: Data + Eq + Hash,
        V: Data,
        P: Partitioner<Key = K>,
    {
        self.shuffle(rdd, partitioner, GroupByAggregator::new())
    }

    fn sum_by_key<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, V)>
    where
        K: Data + Eq + Hash,
        V: Data + Add<Output = V> + Default,
        P: Partitioner<Key = K>,
    {
        self.shuffle(rdd, partitioner, SumByKeyAggregator::new())
    }

    fn min_by_key<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, V)>
    where
        K: Data + Eq + Hash,
        V: Data + Ord + Default,
        P: Partitioner<Key = K>,
    {
        self.shuffle(rdd, partitioner, MinByKeyAggregator::new())
    }

    fn max_by_key<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, V)>
    where
        K: Data + Eq + Hash,
        V: Data + Ord + Default,
        P: Partitioner<Key = K>,
    {
        self.shuffle(rdd, partitioner, MaxByKeyAggregator::new())
    }

    fn count_by_key<K, V, P>(&mut self, rdd: RddIndex<(K, V)>, partitioner: P) -> RddIndex<(K, u64)>
    where
        K: Data + Eq + Hash,
        V: Data,
        P: Partitioner<Key = K>,
    {
        self.shuffle(rdd, partitioner, CountByKeyAggregator::new())
    }

    fn distinct_by_key<K, V, P>(
        &mut self,
        rdd: RddIndex<(K, V)>,
        partitioner: P,
    ) -> RddIndex<(K, Vec<V>)>
    where
        K: Data + Eq + Hash,
        V: Data + Ord,
        P: Partitioner<Key = K>,
    {
        self.shuffle(rdd, partitioner, DistinctAggregator::new())
    }
}

pub mod hash_partitioner;

pub mod group_by;

pub mod sum_by_key;

pub mod extrema;

pub mod count_by_key;

pub mod distinct;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use hash_partitioner::HashPartitioner;

    fn config(workers: usize) -> Config {
        Config {
            workers,
            partitions: 3,
        }
    }

    fn word_pairs() -> Vec<(String, u64)> {
        ["cat", "mat", "cat", "hat", "cat", "mat"]
            .iter()
            .enumerate()
            .map(|(i, w)| (w.to_string(), i as u64))
            .collect()
    }

    #[test]
    fn test_parallelize_keeps_order_and_sizes() {
        tokio_test::block_on(async {
            let mut spark = Spark::new(&config(1)).await;
            let rdd = spark.parallelize((0..10).collect::<Vec<u32>>(), 3);
            assert_eq!(spark.partitions_num_of(rdd.id), 3);
            assert_eq!(spark.collect(rdd).await.unwrap(), (0..10).collect::<Vec<_>>());
        });
    }

    #[tokio::test]
    async fn test_collect_narrow_only() {
        let mut spark = Spark::new(&config(2)).await;
        let rdd = spark.new_from_list(vec![vec![1u64, 2], vec![], vec![3]]);
        let rdd = spark.map(rdd, |x| x * 10);
        let rdd = spark.flat_map(rdd, |x| vec![x, x + 1]);
        assert_eq!(
            spark.collect(rdd).await.unwrap(),
            vec![10, 11, 20, 21, 30, 31]
        );
    }

    #[tokio::test]
    async fn test_sum_by_key() {
        let mut spark = Spark::new(&config(4)).await;
        let data = vec![
            vec![
                ("wow".to_string(), 1),
                ("ok".to_string(), 100),
                ("ok".to_string(), 200),
            ],
            vec![("wow".to_string(), 2), ("x".to_string(), 102)],
        ];
        let rdd = spark.new_from_list(data);
        let rdd = spark.sum_by_key(rdd, HashPartitioner::new(8));
        let mut result = spark.collect(rdd).await.unwrap();
        result.sort();
        assert_eq!(
            result,
            vec![
                ("ok".to_string(), 300),
                ("wow".to_string(), 3),
                ("x".to_string(), 102)
            ]
        );
    }

    #[tokio::test]
    async fn test_chained_shuffles() {
        let mut spark = Spark::new(&config(3)).await;
        let rdd = spark.parallelize(word_pairs(), 4);
        let counted = spark.count_by_key(rdd, HashPartitioner::new(2));
        let inverted = spark.map(counted, |(word, count)| (count, word));
        let grouped = spark.distinct_by_key(inverted, HashPartitioner::new(5));
        let mut result = spark.collect(grouped).await.unwrap();
        result.sort();
        assert_eq!(
            result,
            vec![
                (1, vec!["hat".to_string()]),
                (2, vec!["mat".to_string()]),
                (3, vec!["cat".to_string()])
            ]
        );
    }

    #[tokio::test]
    async fn test_min_max_by_key() {
        let mut spark = Spark::new(&config(2)).await;
        let rdd = spark.parallelize(word_pairs(), 3);
        let min = spark.min_by_key(rdd, HashPartitioner::new(2));
        let max = spark.max_by_key(rdd, HashPartitioner::new(2));
        let mut min = spark.collect(min).await.unwrap();
        let mut max = spark.collect(max).await.unwrap();
        min.sort();
        max.sort();
        assert_eq!(
            min,
            vec![
                ("cat".to_string(), 0),
                ("hat".to_string(), 3),
                ("mat".to_string(), 1)
            ]
        );
        assert_eq!(
            max,
            vec![
                ("cat".to_string(), 4),
                ("hat".to_string(), 3),
                ("mat".to_string(), 5)
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_twice_reuses_shuffle() {
        let mut spark = Spark::new(&config(2)).await;
        let rdd = spark.parallelize(word_pairs(), 2);
        let rdd = spark.group_by(rdd, HashPartitioner::new(3));
        let rdd = spark.map(rdd, |(word, ids)| (word, ids.len()));
        let mut first = spark.collect(rdd).await.unwrap();
        let mut second = spark.collect(rdd).await.unwrap();
        first.sort();
        second.sort();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn test_shuffle_of_empty_source() {
        let mut spark = Spark::new(&config(2)).await;
        let rdd = spark.new_from_list(Vec::<Vec<(String, u64)>>::new());
        let rdd = spark.sum_by_key(rdd, HashPartitioner::new(3));
        let result = tokio::time::timeout(Duration::from_secs(5), spark.collect(rdd))
            .await
            .expect("collect of an empty shuffle hung");
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_buckets_of_unrelated_shuffles_are_dropped() {
        let mut spark = Spark::new(&config(2)).await;
        let first = spark.parallelize(word_pairs(), 2);
        let first = spark.count_by_key(first, HashPartitioner::new(3));
        let mut expected = spark.collect(first).await.unwrap();
        assert_eq!(spark.cached_buckets(), 2 * 3);

        let second = spark.parallelize(word_pairs(), 3);
        let second = spark.sum_by_key(second, HashPartitioner::new(2));
        spark.collect(second).await.unwrap();
        assert_eq!(spark.cached_buckets(), 3 * 2);

        // a pruned shuffle is computed again
        let mut again = spark.collect(first).await.unwrap();
        expected.sort();
        again.sort();
        assert_eq!(again, expected);
        assert_eq!(spark.cached_buckets(), 2 * 3);
    }

    #[tokio::test]
    async fn test_unknown_rdd_is_an_error() {
        let mut spark = Spark::new(&config(1)).await;
        let dangling: RddIndex<u64> = RddIndex::new(RddId::new());
        assert!(matches!(
            spark.collect(dangling).await,
            Err(Error::RddNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_panicking_task_fails_the_job() {
        let mut spark = Spark::new(&config(2)).await;
        let rdd = spark.new_from_list(vec![vec![1u64], vec![0]]);
        let rdd = spark.map(rdd, |x| 10 / x);
        assert!(matches!(
            spark.collect(rdd).await,
            Err(Error::TaskFailed { .. })
        ));

        // the engine keeps serving jobs after a failure
        let ok = spark.new_from_list(vec![vec![2u64]]);
        assert_eq!(spark.collect(ok).await.unwrap(), vec![2]);
    }
}
