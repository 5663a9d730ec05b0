//! # Prometheus Local Scheduler
//!
//! An admission-controlled job scheduler for a single workstation.
//!
//! Shell-command tasks wait in a priority queue and are launched only while
//! the machine's current CPU load, free memory, battery, time of day, and GPU
//! state satisfy the active policy. Background and batch work (training runs,
//! data processing) can then share the machine with interactive use.
//!
//! ## Key Features
//!
//! - **Admission Control**: a pure evaluator reports every violated rule, not just the first
//! - **Swappable Policies**: exactly one active rule set, with built-in presets
//!   (`performance`, `balanced_defaults`, `sip-battery`)
//! - **Priority Queue**: lower priority number first, FIFO among equals
//! - **Durable State**: tasks, audit events, and policies survive restarts; the
//!   heap is rebuilt from stored `queued` tasks
//! - **Process Tracking**: captured logs with rotation, best-effort cancel,
//!   non-blocking reaping
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_local_scheduler::builders::SchedulerBuilder;
//! use prometheus_local_scheduler::config::SchedulerConfig;
//! use prometheus_local_scheduler::core::TaskSpec;
//! use prometheus_local_scheduler::runtime::TokioSpawner;
//!
//! let scheduler = SchedulerBuilder::from_config(SchedulerConfig::from_env()?)
//!     .metrics(Arc::new(my_metrics))
//!     .build_with(&TokioSpawner::current())?;
//!
//! let task = scheduler.enqueue(TaskSpec::new("train", "python train.py").with_gpu(4096))?;
//! let plan = scheduler.simulate(&Default::default())?;
//! ```
//!
//! The metrics provider is supplied by the embedder; see
//! [`core::MetricsProvider`] and [`infra::StaticMetrics`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling types, seams, and the scheduler itself.
pub mod core;
/// Configuration models and environment loading.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Infrastructure adapters for queues, durable stores, and metrics.
pub mod infra;
/// Runtime adapters (tokio, local processes) and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
