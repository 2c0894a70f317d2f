//! # seproc
//!
//! Process supervision for the seboot supervisor.
//!
//! [`daemon`] detaches the calling process (double fork + setsid) and guards
//! single-instance runs through a PID file. [`supervisor`] turns a command
//! line into a monitored child whose stdout/stderr stream line-by-line into
//! a [`selog::LogStore`].

pub mod daemon;
pub mod supervisor;

pub use daemon::{daemonize, process_alive, PidFile};
pub use supervisor::{run_and_capture, spawn_captured, spawn_daemon, RunningChild, SpawnError};
