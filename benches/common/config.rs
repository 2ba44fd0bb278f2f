use std::env;

/// Configuration for benchmarks, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Simulated upstream latency in milliseconds (from UPSTREAM_LATENCY_MS env var, defaults to 20)
    pub upstream_latency_ms: u64,

    /// Concurrent readers per cold key (from BENCH_READERS env var, defaults to 32)
    pub readers: usize,

    /// Sample size for benchmarks (from BENCH_SAMPLE_SIZE env var, defaults to 100)
    pub sample_size: usize,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            upstream_latency_ms: env_or("UPSTREAM_LATENCY_MS", 20),
            readers: env_or("BENCH_READERS", 32),
            sample_size: env_or("BENCH_SAMPLE_SIZE", 100),
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        let config = Self::default();
        eprintln!("Benchmark Configuration:");
        eprintln!("  Upstream Latency: {}ms", config.upstream_latency_ms);
        eprintln!("  Readers: {}", config.readers);
        eprintln!("  Sample Size: {}", config.sample_size);
        config
    }
}
