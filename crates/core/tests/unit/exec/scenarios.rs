//! Full-pipeline and ordering scenarios for the concurrent executor.
//!
//! Each test assembles a complete `DMProgram` and drives it through
//! `ConcurrentExecutor::run`, checking the resulting memory contents rather
//! than any one engine's internal state.

use kpu_core::common::{Address, EngineMask, MemoryKind};
use kpu_core::config::Config;
use kpu_core::exec::{ConcurrentExecutor, ExecutionState, HardwareContext};
use kpu_core::isa::{
    ActivationKind, DMInstruction, DMProgram, ElementKind, MatrixDims, MatrixId, Operation, ProgramHeader, StreamGeometry, TileCoord,
    TileShape, Transform,
};

fn header(m: u32, n: u32, k: u32) -> ProgramHeader {
    ProgramHeader {
        matrix_dims: MatrixDims { m, n, k },
        tile_shape: TileShape { ti: m, tj: n, tk: k },
        element_kind: ElementKind::F32,
        bias: None,
        activation: ActivationKind::None,
    }
}

fn write_f32_matrix(bytes: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
}

fn read_f32_matrix(bytes: &[u8], count: usize) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .take(count)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

/// Loads A and B external-memory tiles all the way through L3, L2, and L1,
/// fires a `MATMUL`, and evacuates C back to L2 -- the full depth the data
/// movement pipeline supports (`BM_MOVE` only runs L3 -> L2, so the
/// round trip stops there rather than returning C to external memory).
#[test]
fn matmul_pipeline_2x2_evacuates_c_to_l2() {
    let config = Config::default();
    let mut executor = ConcurrentExecutor::new(HardwareContext::new(&config));
    executor
        .hardware_mut()
        .decoder
        .register(Address::new(0), 1 << 20, MemoryKind::External, 0)
        .unwrap();

    let a_base = Address::new(0);
    let b_base = Address::new(4096);
    let mut a_bytes = Vec::new();
    write_f32_matrix(&mut a_bytes, &[1.0, 2.0, 3.0, 4.0]);
    let mut b_bytes = Vec::new();
    write_f32_matrix(&mut b_bytes, &[5.0, 6.0, 7.0, 8.0]);
    executor.hardware_mut().external[0].write(a_base, &a_bytes).unwrap();
    executor.hardware_mut().external[0].write(b_base, &b_bytes).unwrap();

    let mut program = DMProgram::new(header(2, 2, 2), a_base, b_base, Address::new(8192));
    program.push(DMInstruction::new(
        0,
        Operation::DmaLoad {
            matrix: MatrixId::A,
            tile: TileCoord::new(0, 0),
            src_base: a_base,
            dst_l3_tile: 0,
            dst_offset: Address::new(0),
            size: 16,
        },
    ));
    program.push(DMInstruction::new(
        1,
        Operation::DmaLoad {
            matrix: MatrixId::B,
            tile: TileCoord::new(0, 0),
            src_base: b_base,
            dst_l3_tile: 1,
            dst_offset: Address::new(0),
            size: 16,
        },
    ));
    program.push(DMInstruction::new(2, Operation::Barrier { mask: EngineMask::DMA }));
    program.push(DMInstruction::new(
        3,
        Operation::BmMove {
            src_l3_tile: 0,
            src_offset: Address::new(0),
            dst_l2_bank: 0,
            dst_offset: Address::new(0),
            rows: 2,
            cols: 2,
            element_size: 4,
            transform: Transform::Identity,
        },
    ));
    program.push(DMInstruction::new(
        4,
        Operation::BmMove {
            src_l3_tile: 1,
            src_offset: Address::new(0),
            dst_l2_bank: 1,
            dst_offset: Address::new(0),
            rows: 2,
            cols: 2,
            element_size: 4,
            transform: Transform::Identity,
        },
    ));
    program.push(DMInstruction::new(5, Operation::Barrier { mask: EngineMask::BLOCK_MOVER }));
    program.push(DMInstruction::new(
        6,
        Operation::StrRow {
            src_l2_bank: 0,
            dst_l1_buffer: 0,
            geometry: StreamGeometry {
                l2_addr: Address::new(0),
                l1_addr: Address::new(0),
                height: 2,
                width: 2,
                element_size: 4,
                fabric_size: 4,
            },
        },
    ));
    program.push(DMInstruction::new(
        7,
        Operation::StrCol {
            src_l2_bank: 1,
            dst_l1_buffer: 0,
            geometry: StreamGeometry {
                l2_addr: Address::new(0),
                l1_addr: Address::new(64),
                height: 2,
                width: 2,
                element_size: 4,
                fabric_size: 4,
            },
        },
    ));
    program.push(DMInstruction::new(8, Operation::Barrier { mask: EngineMask::STREAMER }));
    program.push(DMInstruction::new(
        9,
        Operation::Matmul {
            compute_tile: 0,
            l1_buffer_id: 0,
            a_addr: Address::new(0),
            b_addr: Address::new(64),
            c_addr: Address::new(128),
            m: 2,
            n: 2,
            k: 2,
        },
    ));
    program.push(DMInstruction::new(10, Operation::Barrier { mask: EngineMask::COMPUTE }));
    program.push(DMInstruction::new(
        11,
        Operation::StrOut {
            src_l1_buffer: 0,
            dst_l2_bank: 2,
            geometry: StreamGeometry {
                l2_addr: Address::new(0),
                l1_addr: Address::new(128),
                height: 2,
                width: 2,
                element_size: 4,
                fabric_size: 4,
            },
        },
    ));
    program.push(DMInstruction::new(12, Operation::Barrier { mask: EngineMask::STREAMER }));

    kpu_core::isa::validate_program(&program, &config).unwrap();
    executor.load_program(program);

    let completed = executor.run(10_000).unwrap();
    assert!(completed);
    assert_eq!(executor.state(), ExecutionState::Completed);

    let mut c_bytes = [0u8; 16];
    executor.hardware().l2[2].read(Address::new(0), &mut c_bytes).unwrap();
    assert_eq!(read_f32_matrix(&c_bytes, 4), vec![19.0, 22.0, 43.0, 50.0]);
}

/// A 4x4 matmul against the identity matrix should reproduce B unchanged,
/// fully occupying the default 4x4 systolic array.
#[test]
fn identity_matmul_4x4_reproduces_b() {
    let config = Config::default();
    let mut executor = ConcurrentExecutor::new(HardwareContext::new(&config));
    executor
        .hardware_mut()
        .decoder
        .register(Address::new(0), 1 << 20, MemoryKind::External, 0)
        .unwrap();

    let identity: Vec<f32> = (0..16).map(|i| if i % 5 == 0 { 1.0 } else { 0.0 }).collect();
    let b_values: Vec<f32> = (1..=16).map(|v| v as f32).collect();

    let a_base = Address::new(0);
    let b_base = Address::new(4096);
    let mut a_bytes = Vec::new();
    write_f32_matrix(&mut a_bytes, &identity);
    let mut b_bytes = Vec::new();
    write_f32_matrix(&mut b_bytes, &b_values);
    executor.hardware_mut().external[0].write(a_base, &a_bytes).unwrap();
    executor.hardware_mut().external[0].write(b_base, &b_bytes).unwrap();

    let mut program = DMProgram::new(header(4, 4, 4), a_base, b_base, Address::new(8192));
    program.push(DMInstruction::new(
        0,
        Operation::DmaLoad {
            matrix: MatrixId::A,
            tile: TileCoord::new(0, 0),
            src_base: a_base,
            dst_l3_tile: 0,
            dst_offset: Address::new(0),
            size: 64,
        },
    ));
    program.push(DMInstruction::new(
        1,
        Operation::DmaLoad {
            matrix: MatrixId::B,
            tile: TileCoord::new(0, 0),
            src_base: b_base,
            dst_l3_tile: 1,
            dst_offset: Address::new(0),
            size: 64,
        },
    ));
    program.push(DMInstruction::new(2, Operation::Barrier { mask: EngineMask::DMA }));
    program.push(DMInstruction::new(
        3,
        Operation::BmMove {
            src_l3_tile: 0,
            src_offset: Address::new(0),
            dst_l2_bank: 0,
            dst_offset: Address::new(0),
            rows: 4,
            cols: 4,
            element_size: 4,
            transform: Transform::Identity,
        },
    ));
    program.push(DMInstruction::new(
        4,
        Operation::BmMove {
            src_l3_tile: 1,
            src_offset: Address::new(0),
            dst_l2_bank: 1,
            dst_offset: Address::new(0),
            rows: 4,
            cols: 4,
            element_size: 4,
            transform: Transform::Identity,
        },
    ));
    program.push(DMInstruction::new(5, Operation::Barrier { mask: EngineMask::BLOCK_MOVER }));
    program.push(DMInstruction::new(
        6,
        Operation::StrRow {
            src_l2_bank: 0,
            dst_l1_buffer: 0,
            geometry: StreamGeometry {
                l2_addr: Address::new(0),
                l1_addr: Address::new(0),
                height: 4,
                width: 4,
                element_size: 4,
                fabric_size: 4,
            },
        },
    ));
    program.push(DMInstruction::new(
        7,
        Operation::StrCol {
            src_l2_bank: 1,
            dst_l1_buffer: 0,
            geometry: StreamGeometry {
                l2_addr: Address::new(0),
                l1_addr: Address::new(256),
                height: 4,
                width: 4,
                element_size: 4,
                fabric_size: 4,
            },
        },
    ));
    program.push(DMInstruction::new(8, Operation::Barrier { mask: EngineMask::STREAMER }));
    program.push(DMInstruction::new(
        9,
        Operation::Matmul {
            compute_tile: 0,
            l1_buffer_id: 0,
            a_addr: Address::new(0),
            b_addr: Address::new(256),
            c_addr: Address::new(512),
            m: 4,
            n: 4,
            k: 4,
        },
    ));
    program.push(DMInstruction::new(10, Operation::Barrier { mask: EngineMask::COMPUTE }));
    program.push(DMInstruction::new(
        11,
        Operation::StrOut {
            src_l1_buffer: 0,
            dst_l2_bank: 2,
            geometry: StreamGeometry {
                l2_addr: Address::new(0),
                l1_addr: Address::new(512),
                height: 4,
                width: 4,
                element_size: 4,
                fabric_size: 4,
            },
        },
    ));
    program.push(DMInstruction::new(12, Operation::Barrier { mask: EngineMask::STREAMER }));

    kpu_core::isa::validate_program(&program, &config).unwrap();
    executor.load_program(program);

    assert!(executor.run(10_000).unwrap());
    assert_eq!(executor.state(), ExecutionState::Completed);

    let mut c_bytes = [0u8; 64];
    executor.hardware().l2[2].read(Address::new(0), &mut c_bytes).unwrap();
    assert_eq!(read_f32_matrix(&c_bytes, 16), b_values);
}

/// A tile loaded into L3 and stored back out to a different external
/// address should arrive unchanged.
#[test]
fn round_trip_dma_external_to_l3_and_back() {
    let config = Config::default();
    let mut executor = ConcurrentExecutor::new(HardwareContext::new(&config));
    executor
        .hardware_mut()
        .decoder
        .register(Address::new(0), 1 << 20, MemoryKind::External, 0)
        .unwrap();

    let src_addr = Address::new(0);
    let dst_addr = Address::new(4096);
    let mut payload = Vec::new();
    write_f32_matrix(&mut payload, &[11.0, 22.0, 33.0, 44.0]);
    executor.hardware_mut().external[0].write(src_addr, &payload).unwrap();

    let mut program = DMProgram::new(header(2, 2, 2), src_addr, src_addr, dst_addr);
    program.push(DMInstruction::new(
        0,
        Operation::DmaLoad {
            matrix: MatrixId::A,
            tile: TileCoord::new(0, 0),
            src_base: src_addr,
            dst_l3_tile: 0,
            dst_offset: Address::new(0),
            size: 16,
        },
    ));
    program.push(DMInstruction::new(1, Operation::Barrier { mask: EngineMask::DMA }));
    program.push(DMInstruction::new(
        2,
        Operation::DmaStore {
            matrix: MatrixId::A,
            tile: TileCoord::new(0, 0),
            src_l3_tile: 0,
            src_offset: Address::new(0),
            dst_base: dst_addr,
            size: 16,
        },
    ));
    program.push(DMInstruction::new(3, Operation::Barrier { mask: EngineMask::DMA }));

    kpu_core::isa::validate_program(&program, &config).unwrap();
    executor.load_program(program);

    assert!(executor.run(10_000).unwrap());
    assert_eq!(executor.state(), ExecutionState::Completed);

    let mut out = [0u8; 16];
    executor.hardware().external[0].read(dst_addr, &mut out).unwrap();
    assert_eq!(read_f32_matrix(&out, 4), vec![11.0, 22.0, 33.0, 44.0]);
}

/// A `BARRIER(DMA)` must hold back a dependent `BM_MOVE` until both DMA
/// loads it masks have retired, even though the loads take many cycles.
#[test]
fn barrier_holds_dependent_instruction_until_engines_drain() {
    let mut config = Config::default();
    config.memory.bandwidth_gbps = 1.0; // 1 byte/cycle: a 16-byte load takes 16 cycles.
    let mut executor = ConcurrentExecutor::new(HardwareContext::new(&config));
    executor
        .hardware_mut()
        .decoder
        .register(Address::new(0), 1 << 20, MemoryKind::External, 0)
        .unwrap();

    let a_base = Address::new(0);
    let b_base = Address::new(4096);
    let mut a_bytes = Vec::new();
    write_f32_matrix(&mut a_bytes, &[1.0, 2.0, 3.0, 4.0]);
    executor.hardware_mut().external[0].write(a_base, &a_bytes).unwrap();
    executor.hardware_mut().external[0].write(b_base, &a_bytes).unwrap();

    let mut program = DMProgram::new(header(2, 2, 2), a_base, b_base, Address::new(8192));
    program.push(DMInstruction::new(
        0,
        Operation::DmaLoad {
            matrix: MatrixId::A,
            tile: TileCoord::new(0, 0),
            src_base: a_base,
            dst_l3_tile: 0,
            dst_offset: Address::new(0),
            size: 16,
        },
    ));
    program.push(DMInstruction::new(
        1,
        Operation::DmaLoad {
            matrix: MatrixId::B,
            tile: TileCoord::new(0, 0),
            src_base: b_base,
            dst_l3_tile: 1,
            dst_offset: Address::new(0),
            size: 16,
        },
    ));
    program.push(DMInstruction::new(2, Operation::Barrier { mask: EngineMask::DMA }));
    program.push(DMInstruction::new(
        3,
        Operation::BmMove {
            src_l3_tile: 0,
            src_offset: Address::new(0),
            dst_l2_bank: 0,
            dst_offset: Address::new(0),
            rows: 2,
            cols: 2,
            element_size: 4,
            transform: Transform::Identity,
        },
    ));

    kpu_core::isa::validate_program(&program, &config).unwrap();
    executor.load_program(program);

    executor.step().unwrap();
    assert_eq!(executor.program_counter(), 2, "the barrier must stop issuance until both loads retire");

    for _ in 0..10 {
        executor.step().unwrap();
        assert_eq!(executor.program_counter(), 2, "loads still in flight; BM_MOVE must not have issued yet");
    }

    assert!(executor.run(10_000).unwrap());
    assert_eq!(executor.program_counter(), 4);
    assert_eq!(executor.state(), ExecutionState::Completed);

    let mut out = [0u8; 16];
    executor.hardware().l2[0].read(Address::new(0), &mut out).unwrap();
    assert_eq!(read_f32_matrix(&out, 4), vec![1.0, 2.0, 3.0, 4.0]);
}

/// `BM_MOVE` with `TRANSPOSE` swaps rows and columns as data streams L3 -> L2,
/// exercised through the full ISA pipeline rather than the engine directly.
#[test]
fn transpose_block_move_swaps_layout() {
    let config = Config::default();
    let mut executor = ConcurrentExecutor::new(HardwareContext::new(&config));
    executor
        .hardware_mut()
        .decoder
        .register(Address::new(0), 1 << 20, MemoryKind::External, 0)
        .unwrap();

    let a_base = Address::new(0);
    executor.hardware_mut().external[0].write(a_base, &[10, 20, 30, 40]).unwrap();

    let mut program = DMProgram::new(header(2, 2, 2), a_base, a_base, a_base);
    program.push(DMInstruction::new(
        0,
        Operation::DmaLoad {
            matrix: MatrixId::A,
            tile: TileCoord::new(0, 0),
            src_base: a_base,
            dst_l3_tile: 0,
            dst_offset: Address::new(0),
            size: 4,
        },
    ));
    program.push(DMInstruction::new(1, Operation::Barrier { mask: EngineMask::DMA }));
    program.push(DMInstruction::new(
        2,
        Operation::BmMove {
            src_l3_tile: 0,
            src_offset: Address::new(0),
            dst_l2_bank: 0,
            dst_offset: Address::new(0),
            rows: 2,
            cols: 2,
            element_size: 1,
            transform: Transform::Transpose,
        },
    ));
    program.push(DMInstruction::new(3, Operation::Barrier { mask: EngineMask::BLOCK_MOVER }));

    kpu_core::isa::validate_program(&program, &config).unwrap();
    executor.load_program(program);

    assert!(executor.run(10_000).unwrap());
    assert_eq!(executor.state(), ExecutionState::Completed);

    let mut out = [0u8; 4];
    executor.hardware().l2[0].read(Address::new(0), &mut out).unwrap();
    // source rows [10,20],[30,40] -> transposed [10,30],[20,40]
    assert_eq!(out, [10, 30, 20, 40]);
}

/// A program containing only `NOP x N` must take exactly `N` cycles: each
/// `NOP` advances the clock by one, it does not retire for free alongside
/// its neighbors in the same `step`.
#[test]
fn nop_only_program_takes_n_cycles() {
    const N: usize = 5;
    let config = Config::default();
    let mut executor = ConcurrentExecutor::new(HardwareContext::new(&config));

    let mut program = DMProgram::new(header(1, 1, 1), Address::new(0), Address::new(0), Address::new(0));
    for i in 0..N {
        program.push(DMInstruction::new(i as u64, Operation::Nop));
    }

    kpu_core::isa::validate_program(&program, &config).unwrap();
    executor.load_program(program);

    assert!(executor.run(10_000).unwrap());
    assert_eq!(executor.state(), ExecutionState::Completed);
    assert_eq!(executor.current_cycle(), N as u64);
}
