use std::{fmt::Debug, sync::Arc};

use log::{debug, info};
use tokio::sync::{mpsc, Semaphore};

use crate::worker;

use super::{
    cache::BucketCache,
    dag_scheduler::TaskId,
    executor::Executor,
    graph::Graph,
    rdd::{AnyPartition, RddId, RddPartitionId},
};

#[derive(Debug, Clone)]
pub struct BucketReceivedEvent {
    pub wide_partition: RddPartitionId,
    pub narrow_partition_id: usize,
}

pub enum TaskOutput {
    /// partition of the job's target rdd
    Materialized(AnyPartition),
    /// buckets were left in the shared bucket cache
    Shuffled,
}

impl Debug for TaskOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutput::Materialized(_) => f.write_str("Materialized"),
            TaskOutput::Shuffled => f.write_str("Shuffled"),
        }
    }
}

#[derive(Debug)]
pub enum WorkerEvent {
    Success(Task, TaskOutput),
    BucketReceived(BucketReceivedEvent),
    Fail(TaskId, String),
}

#[derive(Debug)]
pub enum DagMessage {
    NewGraph(Graph),
    SubmitTask(Task),
}

/// Runs tasks submitted by the dag scheduler on at most `workers` blocking threads at a time.
pub struct TaskScheduler {
    // from dag scheduler
    taskset_receiver: mpsc::Receiver<DagMessage>,
    // to dag scheduler
    dag_event_sender: mpsc::Sender<WorkerEvent>,
    executor: Executor,
    workers: Arc<Semaphore>,
    current_graph: Arc<Graph>,
}

impl TaskScheduler {
    pub fn new(
        taskset_receiver: mpsc::Receiver<DagMessage>,
        dag_event_sender: mpsc::Sender<WorkerEvent>,
        workers: usize,
        bucket_cache: BucketCache,
    ) -> Self {
        Self {
            taskset_receiver,
            dag_event_sender,
            executor: Executor::new(bucket_cache),
            workers: Arc::new(Semaphore::new(workers.max(1))),
            current_graph: Arc::default(),
        }
    }

    pub fn handle_dag_message(&mut self, dag_message: DagMessage) {
        match dag_message {
            // tasks of a job are queued behind its graph on the same channel
            DagMessage::NewGraph(g) => {
                debug!("task scheduler received {g:?}");
                self.current_graph = Arc::new(g);
            }
            DagMessage::SubmitTask(task) => {
                debug!("spawning task {:?}", task.id);
                tokio::spawn(worker::run(
                    task,
                    self.current_graph.clone(),
                    self.executor.clone(),
                    self.workers.clone(),
                    self.dag_event_sender.clone(),
                ));
            }
        }
    }

    pub async fn start(mut self) {
        info!("task scheduler is running");
        while let Some(dag_message) = self.taskset_receiver.recv().await {
            self.handle_dag_message(dag_message);
        }
        info!("task scheduler shutting down");
    }
}

#[derive(Clone, Debug)]
pub struct WideTask {
    pub wide_rdd_id: RddId,
    pub narrow_rdd_id: RddId,
    pub narrow_partition_id: usize,
}

#[derive(Clone, Debug)]
pub struct ResultTask {
    pub rdd_partition_id: RddPartitionId,
}

#[derive(Clone, Debug)]
pub enum TaskKind {
    ResultTask(ResultTask),
    WideTask(WideTask),
}

#[derive(Clone, Debug)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
}
