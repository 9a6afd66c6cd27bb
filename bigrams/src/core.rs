pub mod rdd;

pub mod cache;

pub mod graph;

pub mod context;

pub mod executor;

pub mod dag_scheduler;

pub mod task_scheduler;

pub mod spark;
