//! Library defaults for `GroupConfig`

/// Name prefix of loop threads (`eventLoopGroup-<pool>-<n>`)
pub const POOL_NAME: &str = "eventLoopGroup";

/// Quiet period for graceful shutdown
pub const QUIET_PERIOD_MS: u64 = 2_000;

/// Hard deadline for graceful shutdown
pub const SHUTDOWN_TIMEOUT_MS: u64 = 15_000;

/// Longest an idle loop sleeps before re-checking its state
pub const PARK_TIMEOUT_MS: u64 = 100;

/// 0 = platform default stack size for loop threads
pub const STACK_SIZE: usize = 0;

/// Hard cap on loops per group
pub const MAX_LOOPS: usize = 1024;

/// Two loops per available core
pub fn num_loops() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus * 2).min(MAX_LOOPS)
}
