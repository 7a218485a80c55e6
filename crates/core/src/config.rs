//! Configuration for the KPU simulator.
//!
//! This module defines the hierarchical configuration used to size every
//! component of the simulated fabric. It provides:
//! 1. **Defaults:** Baseline component counts and capacities.
//! 2. **Structures:** Hierarchical config for memory, engines, and compute.
//!
//! Configuration is supplied via JSON (`Config::default()` for the CLI, or
//! `serde_json::from_str` for a saved configuration file).

use serde::{Deserialize, Serialize};

/// Default configuration constants for the simulator.
mod defaults {
    /// Number of KPU external memory banks.
    pub const MEMORY_BANK_COUNT: usize = 2;
    /// Capacity of one external memory bank, in megabytes.
    pub const MEMORY_BANK_CAPACITY_MB: u64 = 256;
    /// Modeled bandwidth of one external memory bank, in GB/s.
    pub const MEMORY_BANDWIDTH_GBPS: f64 = 100.0;

    /// Number of L3 cache tiles.
    pub const L3_TILE_COUNT: usize = 4;
    /// Capacity of one L3 tile, in kilobytes.
    pub const L3_TILE_CAPACITY_KB: u64 = 2048;

    /// Number of L2 cache banks.
    pub const L2_BANK_COUNT: usize = 4;
    /// Capacity of one L2 bank, in kilobytes.
    pub const L2_BANK_CAPACITY_KB: u64 = 512;

    /// Number of L1 streaming buffers.
    pub const L1_BUFFER_COUNT: usize = 4;
    /// Capacity of one L1 buffer, in kilobytes.
    pub const L1_BUFFER_CAPACITY_KB: u64 = 64;

    /// Number of DMA engines.
    pub const DMA_ENGINE_COUNT: usize = 2;
    /// Number of Block Movers.
    pub const BLOCK_MOVER_COUNT: usize = 2;
    /// Number of Streamers.
    pub const STREAMER_COUNT: usize = 2;

    /// Number of compute tiles (Compute Fabric instances).
    pub const COMPUTE_TILE_COUNT: usize = 1;
    /// Systolic array row count.
    pub const PROCESSOR_ARRAY_ROWS: usize = 4;
    /// Systolic array column count.
    pub const PROCESSOR_ARRAY_COLS: usize = 4;
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use kpu_core::Config;
///
/// let config = Config::default();
/// assert_eq!(config.memory.bank_count, 2);
/// assert_eq!(config.compute.processor_array_rows, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Memory hierarchy sizing (external banks, L3, L2, L1).
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Engine instance counts (DMA, Block Mover, Streamer).
    #[serde(default)]
    pub engines: EngineConfig,
    /// Compute Fabric sizing and mode.
    #[serde(default)]
    pub compute: ComputeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            engines: EngineConfig::default(),
            compute: ComputeConfig::default(),
        }
    }
}

/// Memory hierarchy sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Number of external memory banks.
    #[serde(default = "MemoryConfig::default_bank_count")]
    pub bank_count: usize,

    /// Capacity of one external memory bank, in megabytes.
    #[serde(default = "MemoryConfig::default_bank_capacity_mb")]
    pub bank_capacity_mb: u64,

    /// Modeled bandwidth of one external memory bank, in GB/s.
    #[serde(default = "MemoryConfig::default_bandwidth_gbps")]
    pub bandwidth_gbps: f64,

    /// Number of L3 cache tiles.
    #[serde(default = "MemoryConfig::default_l3_tile_count")]
    pub l3_tile_count: usize,

    /// Capacity of one L3 tile, in kilobytes.
    #[serde(default = "MemoryConfig::default_l3_tile_capacity_kb")]
    pub l3_tile_capacity_kb: u64,

    /// Number of L2 cache banks.
    #[serde(default = "MemoryConfig::default_l2_bank_count")]
    pub l2_bank_count: usize,

    /// Capacity of one L2 bank, in kilobytes.
    #[serde(default = "MemoryConfig::default_l2_bank_capacity_kb")]
    pub l2_bank_capacity_kb: u64,

    /// Number of L1 streaming buffers.
    #[serde(default = "MemoryConfig::default_l1_buffer_count")]
    pub l1_buffer_count: usize,

    /// Capacity of one L1 buffer, in kilobytes.
    #[serde(default = "MemoryConfig::default_l1_buffer_capacity_kb")]
    pub l1_buffer_capacity_kb: u64,
}

impl MemoryConfig {
    /// Returns the default external memory bank count.
    fn default_bank_count() -> usize {
        defaults::MEMORY_BANK_COUNT
    }

    /// Returns the default external memory bank capacity in megabytes.
    fn default_bank_capacity_mb() -> u64 {
        defaults::MEMORY_BANK_CAPACITY_MB
    }

    /// Returns the default modeled bandwidth in GB/s.
    fn default_bandwidth_gbps() -> f64 {
        defaults::MEMORY_BANDWIDTH_GBPS
    }

    /// Returns the default L3 tile count.
    fn default_l3_tile_count() -> usize {
        defaults::L3_TILE_COUNT
    }

    /// Returns the default L3 tile capacity in kilobytes.
    fn default_l3_tile_capacity_kb() -> u64 {
        defaults::L3_TILE_CAPACITY_KB
    }

    /// Returns the default L2 bank count.
    fn default_l2_bank_count() -> usize {
        defaults::L2_BANK_COUNT
    }

    /// Returns the default L2 bank capacity in kilobytes.
    fn default_l2_bank_capacity_kb() -> u64 {
        defaults::L2_BANK_CAPACITY_KB
    }

    /// Returns the default L1 buffer count.
    fn default_l1_buffer_count() -> usize {
        defaults::L1_BUFFER_COUNT
    }

    /// Returns the default L1 buffer capacity in kilobytes.
    fn default_l1_buffer_capacity_kb() -> u64 {
        defaults::L1_BUFFER_CAPACITY_KB
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            bank_count: defaults::MEMORY_BANK_COUNT,
            bank_capacity_mb: defaults::MEMORY_BANK_CAPACITY_MB,
            bandwidth_gbps: defaults::MEMORY_BANDWIDTH_GBPS,
            l3_tile_count: defaults::L3_TILE_COUNT,
            l3_tile_capacity_kb: defaults::L3_TILE_CAPACITY_KB,
            l2_bank_count: defaults::L2_BANK_COUNT,
            l2_bank_capacity_kb: defaults::L2_BANK_CAPACITY_KB,
            l1_buffer_count: defaults::L1_BUFFER_COUNT,
            l1_buffer_capacity_kb: defaults::L1_BUFFER_CAPACITY_KB,
        }
    }
}

/// Engine instance counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of DMA engines (external memory ↔ L3).
    #[serde(default = "EngineConfig::default_dma_engine_count")]
    pub dma_engine_count: usize,

    /// Number of Block Movers (L3 ↔ L2).
    #[serde(default = "EngineConfig::default_block_mover_count")]
    pub block_mover_count: usize,

    /// Number of Streamers (L2 ↔ L1).
    #[serde(default = "EngineConfig::default_streamer_count")]
    pub streamer_count: usize,
}

impl EngineConfig {
    /// Returns the default DMA engine count.
    fn default_dma_engine_count() -> usize {
        defaults::DMA_ENGINE_COUNT
    }

    /// Returns the default Block Mover count.
    fn default_block_mover_count() -> usize {
        defaults::BLOCK_MOVER_COUNT
    }

    /// Returns the default Streamer count.
    fn default_streamer_count() -> usize {
        defaults::STREAMER_COUNT
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dma_engine_count: defaults::DMA_ENGINE_COUNT,
            block_mover_count: defaults::BLOCK_MOVER_COUNT,
            streamer_count: defaults::STREAMER_COUNT,
        }
    }
}

/// Compute Fabric sizing and execution mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Number of Compute Fabric instances (compute tiles).
    #[serde(default = "ComputeConfig::default_compute_tile_count")]
    pub compute_tile_count: usize,

    /// Systolic array row count, per compute tile.
    #[serde(default = "ComputeConfig::default_processor_array_rows")]
    pub processor_array_rows: usize,

    /// Systolic array column count, per compute tile.
    #[serde(default = "ComputeConfig::default_processor_array_cols")]
    pub processor_array_cols: usize,

    /// When `true`, `MATMUL` dispatches to the systolic array; when `false`,
    /// to the functional `BASIC_MATMUL` fallback.
    #[serde(default = "ComputeConfig::default_use_systolic_array_mode")]
    pub use_systolic_array_mode: bool,
}

impl ComputeConfig {
    /// Returns the default compute tile count.
    fn default_compute_tile_count() -> usize {
        defaults::COMPUTE_TILE_COUNT
    }

    /// Returns the default systolic array row count.
    fn default_processor_array_rows() -> usize {
        defaults::PROCESSOR_ARRAY_ROWS
    }

    /// Returns the default systolic array column count.
    fn default_processor_array_cols() -> usize {
        defaults::PROCESSOR_ARRAY_COLS
    }

    /// Returns whether the systolic array is used by default.
    fn default_use_systolic_array_mode() -> bool {
        true
    }
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            compute_tile_count: defaults::COMPUTE_TILE_COUNT,
            processor_array_rows: defaults::PROCESSOR_ARRAY_ROWS,
            processor_array_cols: defaults::PROCESSOR_ARRAY_COLS,
            use_systolic_array_mode: true,
        }
    }
}
