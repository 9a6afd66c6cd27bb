use std::collections::{HashMap, HashSet};

use async_recursion::async_recursion;
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};

use crate::{
    core::task_scheduler::{ResultTask, Task},
    error::{Error, Result},
};

use super::{
    cache::BucketCache,
    graph::Graph,
    rdd::{AnyPartition, Dependency, RddId, RddPartitionId},
    task_scheduler::{BucketReceivedEvent, DagMessage, TaskKind, TaskOutput, WideTask, WorkerEvent},
};

// e.g. collect
pub struct Job {
    pub graph: Graph,
    pub target_rdd_id: RddId,
    pub materialized_data_channel: oneshot::Sender<Result<Vec<AnyPartition>>>,
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Debug)]
pub struct TaskId(usize);

pub struct DagScheduler {
    /// used to receive jobs from user code
    job_receiver: mpsc::Receiver<Job>,
    /// used to send tasks to taskscheduler
    task_sender: mpsc::Sender<DagMessage>,
    /// used to receive events from workers
    event_receiver: mpsc::Receiver<WorkerEvent>,
    /// used to generate unique ids for tasks, never reset so late events of a failed job can't
    /// be mistaken for the current one
    task_id_ctr: usize,

    /// id -> task
    tasks: HashMap<TaskId, Task>,
    /// tasks waiting for some dependency
    waiting_tasks: HashSet<TaskId>,
    /// tasks handed to the task scheduler
    running_tasks: HashSet<TaskId>,
    /// tasks which completed in the current job
    finished_tasks: HashSet<TaskId>,
    /// number of buckets left to receive at this wide rdd partition
    bucket_aggr_tracker: HashMap<RddPartitionId, usize>,
    bucket_aggr_ids: HashMap<RddPartitionId, HashSet<usize>>,
    /// task -> all the wide rdd partitions(inputs) that are used in this tasks
    task_deps: HashMap<TaskId, Vec<RddPartitionId>>,
    /// wide rdd partition -> all the tasks that depend on it
    childs: HashMap<RddPartitionId, Vec<TaskId>>,
    /// wide rdd partition -> all of its buckets are in the bucket cache
    cached: HashMap<RddPartitionId, bool>,
    /// wide rdd id -> all of its tasks
    stage_tasks: HashMap<RddId, Vec<TaskId>>,
    /// shared with the executors, pruned to the lineage of the running job
    bucket_cache: BucketCache,
}

impl DagScheduler {
    pub fn new(
        job_receiver: mpsc::Receiver<Job>,
        task_sender: mpsc::Sender<DagMessage>,
        event_receiver: mpsc::Receiver<WorkerEvent>,
        bucket_cache: BucketCache,
    ) -> Self {
        Self {
            job_receiver,
            task_sender,
            event_receiver,
            task_id_ctr: Default::default(),
            tasks: Default::default(),
            waiting_tasks: Default::default(),
            running_tasks: Default::default(),
            finished_tasks: Default::default(),
            bucket_aggr_tracker: Default::default(),
            bucket_aggr_ids: Default::default(),
            task_deps: Default::default(),
            childs: Default::default(),
            cached: Default::default(),
            stage_tasks: Default::default(),
            bucket_cache,
        }
    }

    fn new_task_id(&mut self) -> TaskId {
        self.task_id_ctr += 1;
        TaskId(self.task_id_ctr)
    }

    fn get_missing_deps(&self, task_id: &TaskId) -> Vec<RddPartitionId> {
        self.task_deps
            .get(task_id)
            .map(|deps| {
                deps.iter()
                    .filter(|dep_rpid| !*self.cached.get(dep_rpid).unwrap_or(&false))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    #[async_recursion]
    async fn try_submit_task(&mut self, task_id: TaskId) -> Result<()> {
        let already_submitted = self.waiting_tasks.contains(&task_id)
            || self.running_tasks.contains(&task_id)
            || self.finished_tasks.contains(&task_id);
        if already_submitted {
            return Ok(());
        }
        let todo_deps = self.get_missing_deps(&task_id);
        if todo_deps.is_empty() {
            // All dependecies are ready, commence task execution!
            let task = match self.tasks.get(&task_id) {
                Some(task) => task.clone(),
                None => return Ok(()),
            };
            self.running_tasks.insert(task.id);
            debug!("submitting task: {task:?}");
            self.task_sender
                .send(DagMessage::SubmitTask(task))
                .await
                .map_err(|_| Error::SchedulerGone)?;
        } else {
            // Try to run dependecies, put task on waiting queue
            self.waiting_tasks.insert(task_id);
            for dep_rpid in todo_deps {
                let dep_stage = self
                    .stage_tasks
                    .get(&dep_rpid.rdd_id)
                    .cloned()
                    .unwrap_or_default();
                for task_id in dep_stage {
                    self.try_submit_task(task_id).await?;
                }
            }
        }
        Ok(())
    }

    /// stores task and creates parent->child child->parent links
    fn store_task(&mut self, task_id: TaskId, task: Task, wide_dependecies: Vec<RddPartitionId>) {
        debug!("task created: {task:?} deps: {wide_dependecies:?}");
        self.tasks.insert(task_id, task);
        wide_dependecies.iter().for_each(|rpid| {
            self.childs
                .entry(*rpid)
                .or_insert_with(Vec::new)
                .push(task_id)
        });
        self.task_deps.insert(task_id, wide_dependecies);
    }

    fn create_stage_tasks(&mut self, graph: &Graph, rdd_id: RddId) -> Result<()> {
        let rdd = graph.get_rdd(rdd_id).ok_or(Error::RddNotFound(rdd_id))?;
        match rdd.rdd_dependency() {
            Dependency::Narrow(dep_rdd_id) => self.create_stage_tasks(graph, dep_rdd_id)?,
            Dependency::Wide(dep_rdd_id) => {
                self.create_stage_tasks(graph, dep_rdd_id)?;
                let mut stage_tasks = Vec::new();
                let prev_rdd = graph
                    .get_rdd(dep_rdd_id)
                    .ok_or(Error::RddNotFound(dep_rdd_id))?;
                for narrow_partition_id in 0..prev_rdd.partitions_num() {
                    let task_id = self.new_task_id();
                    let wide_task = WideTask {
                        wide_rdd_id: rdd_id,
                        narrow_rdd_id: dep_rdd_id,
                        narrow_partition_id,
                    };
                    let task = Task {
                        id: task_id,
                        kind: TaskKind::WideTask(wide_task),
                    };
                    let task_wide_dependecies = Self::get_direct_dependencies(
                        graph,
                        RddPartitionId {
                            rdd_id: dep_rdd_id,
                            partition_id: narrow_partition_id,
                        },
                    )?;
                    self.store_task(task_id, task, task_wide_dependecies);
                    stage_tasks.push(task_id);
                }
                for wide_partition_id in 0..rdd.partitions_num() {
                    let rpid = RddPartitionId {
                        rdd_id,
                        partition_id: wide_partition_id,
                    };
                    if *self.cached.get(&rpid).unwrap_or(&false) {
                        continue;
                    }
                    // a failed job may have left a partial count behind
                    self.bucket_aggr_tracker
                        .insert(rpid, prev_rdd.partitions_num());
                    self.bucket_aggr_ids.remove(&rpid);
                    if prev_rdd.partitions_num() == 0 {
                        // no wide task will ever report a bucket here
                        self.cached.insert(rpid, true);
                    }
                }
                self.stage_tasks.insert(rdd_id, stage_tasks);
            }
            Dependency::No => {}
        }
        Ok(())
    }

    // Returns direct wide partition dependecies
    fn get_direct_dependencies(graph: &Graph, node: RddPartitionId) -> Result<Vec<RddPartitionId>> {
        let rdd = graph
            .get_rdd(node.rdd_id)
            .ok_or(Error::RddNotFound(node.rdd_id))?;
        match rdd.rdd_dependency() {
            Dependency::Narrow(dep_rdd_id) => Self::get_direct_dependencies(
                graph,
                RddPartitionId {
                    rdd_id: dep_rdd_id,
                    partition_id: node.partition_id,
                },
            ),
            Dependency::Wide(_) => Ok(vec![node]),
            Dependency::No => Ok(Vec::new()),
        }
    }

    /// Every rdd the target is computed from, the target included.
    fn lineage(graph: &Graph, target_rdd_id: RddId) -> Result<HashSet<RddId>> {
        let mut lineage = HashSet::new();
        let mut todo = vec![target_rdd_id];
        while let Some(rdd_id) = todo.pop() {
            if !lineage.insert(rdd_id) {
                continue;
            }
            let rdd = graph.get_rdd(rdd_id).ok_or(Error::RddNotFound(rdd_id))?;
            match rdd.rdd_dependency() {
                Dependency::Narrow(dep_rdd_id) | Dependency::Wide(dep_rdd_id) => {
                    todo.push(dep_rdd_id)
                }
                Dependency::No => {}
            }
        }
        Ok(lineage)
    }

    /// Forgets shuffle outputs the next job can't read, so a long lived handle only keeps
    /// buckets of the latest job's lineage.
    fn prune_shuffle_state(&mut self, lineage: &HashSet<RddId>) {
        let in_lineage = |rpid: &RddPartitionId| lineage.contains(&rpid.rdd_id);
        self.cached.retain(|rpid, _| in_lineage(rpid));
        self.bucket_aggr_tracker.retain(|rpid, _| in_lineage(rpid));
        self.bucket_aggr_ids.retain(|rpid, _| in_lineage(rpid));
        self.bucket_cache.retain(|rpid| in_lineage(&rpid));
    }

    async fn process_bucket_receive_event(&mut self, e: BucketReceivedEvent) -> Result<()> {
        debug!("bucket receive event: {e:?}");
        let buckets_left = match self.bucket_aggr_tracker.get_mut(&e.wide_partition) {
            Some(buckets_left) => buckets_left,
            None => {
                warn!("bucket for untracked partition: {e:?}");
                return Ok(());
            }
        };
        let received_bucket_set = self.bucket_aggr_ids.entry(e.wide_partition).or_default();
        if !received_bucket_set.insert(e.narrow_partition_id) {
            debug!("received duplicate bucket: {e:?}");
            return Ok(());
        }
        *buckets_left = buckets_left.saturating_sub(1);
        if *buckets_left == 0 {
            self.cached.insert(e.wide_partition, true);
            let childs = self
                .childs
                .get(&e.wide_partition)
                .cloned()
                .unwrap_or_default();
            for task_id in childs {
                // try to schedule this task if all the deps have freed up
                if self.waiting_tasks.remove(&task_id) {
                    self.try_submit_task(task_id).await?;
                }
            }
        }
        Ok(())
    }

    async fn run_job(&mut self, graph: &Graph, target_rdd_id: RddId) -> Result<Vec<AnyPartition>> {
        let target_partitions_num = graph
            .get_rdd(target_rdd_id)
            .ok_or(Error::RddNotFound(target_rdd_id))?
            .partitions_num();

        let lineage = Self::lineage(graph, target_rdd_id)?;
        self.prune_shuffle_state(&lineage);
        self.create_stage_tasks(graph, target_rdd_id)?;
        debug!("wide tasks created");

        let mut result_stage_tasks = Vec::new();
        for partition_id in 0..target_partitions_num {
            let rpid = RddPartitionId {
                rdd_id: target_rdd_id,
                partition_id,
            };
            let task_id = self.new_task_id();
            let task = Task {
                id: task_id,
                kind: TaskKind::ResultTask(ResultTask {
                    rdd_partition_id: rpid,
                }),
            };
            let deps = Self::get_direct_dependencies(graph, rpid)?;
            self.store_task(task_id, task, deps);
            result_stage_tasks.push(task_id);
        }
        debug!("result tasks created");

        self.task_sender
            .send(DagMessage::NewGraph(graph.clone()))
            .await
            .map_err(|_| Error::SchedulerGone)?;

        for task_id in result_stage_tasks {
            self.try_submit_task(task_id).await?;
        }

        let mut result_v: Vec<Option<AnyPartition>> =
            (0..target_partitions_num).map(|_| None).collect();
        let mut num_received = 0;
        while num_received < target_partitions_num {
            let event = self
                .event_receiver
                .recv()
                .await
                .ok_or(Error::SchedulerGone)?;
            match event {
                WorkerEvent::Success(task, output) => {
                    if !self.running_tasks.remove(&task.id) {
                        debug!("ignoring result of stale task {:?}", task.id);
                        continue;
                    }
                    self.finished_tasks.insert(task.id);
                    if let (TaskKind::ResultTask(result_task), TaskOutput::Materialized(data)) =
                        (task.kind, output)
                    {
                        let slot = &mut result_v[result_task.rdd_partition_id.partition_id];
                        if slot.is_none() {
                            num_received += 1;
                        }
                        *slot = Some(data);
                    }
                }
                WorkerEvent::BucketReceived(e) => self.process_bucket_receive_event(e).await?,
                WorkerEvent::Fail(task_id, reason) => {
                    if self.running_tasks.contains(&task_id) {
                        return Err(Error::TaskFailed {
                            task: task_id,
                            reason,
                        });
                    }
                    debug!("ignoring failure of stale task {task_id:?}: {reason}");
                }
            }
        }

        Ok(result_v.into_iter().flatten().collect())
    }

    fn finish_job(&mut self) {
        self.tasks.clear();
        self.task_deps.clear();
        self.childs.clear();
        self.stage_tasks.clear();
        self.waiting_tasks.clear();
        self.running_tasks.clear();
        self.finished_tasks.clear();
    }

    pub async fn start(mut self) {
        info!("dag scheduler is running");
        while let Some(job) = self.job_receiver.recv().await {
            info!("new job received target_rdd_id={:?}", job.target_rdd_id);
            let result = self.run_job(&job.graph, job.target_rdd_id).await;
            match &result {
                Ok(partitions) => info!(
                    "job for {:?} finished with {} partitions",
                    job.target_rdd_id,
                    partitions.len()
                ),
                Err(e) => warn!("job for {:?} failed: {e}", job.target_rdd_id),
            }
            self.finish_job();
            if job.materialized_data_channel.send(result).is_err() {
                warn!("job for {:?} was dropped before it finished", job.target_rdd_id);
            }
        }
        info!("dag scheduler shutting down");
    }
}
