use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{mpsc, Semaphore};

use crate::core::executor::Executor;
use crate::core::graph::Graph;
use crate::core::rdd::RddPartitionId;
use crate::core::task_scheduler::{BucketReceivedEvent, Task, TaskKind, TaskOutput, WorkerEvent};
use crate::error::Result;

/// Runs one task once a worker slot frees up and reports the outcome to the dag scheduler.
pub(crate) async fn run(
    task: Task,
    graph: Arc<Graph>,
    executor: Executor,
    workers: Arc<Semaphore>,
    event_sender: mpsc::Sender<WorkerEvent>,
) {
    let task_id = task.id;
    let task_run_permit = match workers.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            debug!("worker pool closed, dropping task {task_id:?}");
            return;
        }
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let worker_events = match run_task(&executor, &graph, task) {
            Ok(worker_events) => worker_events,
            Err(e) => vec![WorkerEvent::Fail(task_id, e.to_string())],
        };
        drop(task_run_permit);
        worker_events
    })
    .await;

    let worker_events = match outcome {
        Ok(worker_events) => worker_events,
        Err(e) => {
            warn!("task {task_id:?} panicked: {e}");
            vec![WorkerEvent::Fail(task_id, format!("worker thread panicked: {e}"))]
        }
    };

    for worker_event in worker_events {
        if event_sender.send(worker_event).await.is_err() {
            debug!("dag scheduler is gone, dropping events of task {task_id:?}");
            break;
        }
    }
}

fn run_task(executor: &Executor, graph: &Graph, task: Task) -> Result<Vec<WorkerEvent>> {
    match task.kind.clone() {
        TaskKind::ResultTask(result_task) => {
            let materialized = executor.resolve(graph, result_task.rdd_partition_id)?;
            Ok(vec![WorkerEvent::Success(
                task,
                TaskOutput::Materialized(materialized),
            )])
        }
        TaskKind::WideTask(wide_task) => {
            let serialized_buckets = executor.resolve_task(graph, &wide_task)?;
            let mut worker_events = Vec::with_capacity(serialized_buckets.len() + 1);
            for (wide_partition_id, bucket) in serialized_buckets.into_iter().enumerate() {
                let rpid = RddPartitionId {
                    rdd_id: wide_task.wide_rdd_id,
                    partition_id: wide_partition_id,
                };
                executor
                    .received_buckets
                    .put(rpid, wide_task.narrow_partition_id, bucket);
                worker_events.push(WorkerEvent::BucketReceived(BucketReceivedEvent {
                    wide_partition: rpid,
                    narrow_partition_id: wide_task.narrow_partition_id,
                }));
            }
            worker_events.push(WorkerEvent::Success(task, TaskOutput::Shuffled));
            Ok(worker_events)
        }
    }
}
