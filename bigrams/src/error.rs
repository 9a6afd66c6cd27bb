use thiserror::Error;

use crate::core::{
    dag_scheduler::TaskId,
    rdd::{RddId, RddPartitionId},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't parse config file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// 1-based line number of the input line which isn't valid UTF-8
    #[error("input line {line} is not valid UTF-8")]
    MalformedLine { line: usize },

    #[error("couldn't encode shuffle bucket: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("couldn't decode shuffle bucket: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("rdd {0:?} is not part of the graph")]
    RddNotFound(RddId),

    #[error("rdd {0:?} is not a shuffle")]
    NotShuffle(RddId),

    #[error("partition data is not a `{0}`")]
    PartitionType(&'static str),

    #[error("bucket from narrow partition {narrow_partition_id} never reached {partition:?}")]
    MissingBucket {
        partition: RddPartitionId,
        narrow_partition_id: usize,
    },

    #[error("task {task:?} failed: {reason}")]
    TaskFailed { task: TaskId, reason: String },

    #[error("scheduler shut down before the job finished")]
    SchedulerGone,
}
