mod sweeper;

pub use sweeper::{
    probe_connections, run_guarded, sweep_once, LivenessSweeper, ProbeReport, SweepReport,
};
