//! `validate_program` boundary checks, exercised against the public API
//! rather than `validate.rs`'s own crate-internal unit tests.

use kpu_core::common::{Address, EngineMask};
use kpu_core::config::Config;
use kpu_core::isa::{
    validate_program, ActivationKind, DMInstruction, DMProgram, ElementKind, MatrixDims, MatrixId, Operation, ProgramHeader, TileCoord,
    TileShape,
};

fn header() -> ProgramHeader {
    ProgramHeader {
        matrix_dims: MatrixDims { m: 4, n: 4, k: 4 },
        tile_shape: TileShape { ti: 2, tj: 2, tk: 2 },
        element_kind: ElementKind::F32,
        bias: None,
        activation: ActivationKind::None,
    }
}

#[test]
fn rejects_tile_coordinate_outside_matrix_grid() {
    let mut program = DMProgram::new(header(), Address::new(0), Address::new(0), Address::new(0));
    // A's tile grid is 2x2 (m/ti = 4/2, k/tk = 4/2); row 2 is out of bounds.
    program.push(DMInstruction::new(
        0,
        Operation::DmaLoad {
            matrix: MatrixId::A,
            tile: TileCoord::new(2, 0),
            src_base: Address::new(0),
            dst_l3_tile: 0,
            dst_offset: Address::new(0),
            size: 16,
        },
    ));
    assert!(validate_program(&program, &Config::default()).is_err());
}

#[test]
fn rejects_engine_id_beyond_configured_count() {
    let config = Config::default();
    let mut program = DMProgram::new(header(), Address::new(0), Address::new(0), Address::new(0));
    program.push(DMInstruction::new(
        0,
        Operation::DmaLoad {
            matrix: MatrixId::A,
            tile: TileCoord::new(0, 0),
            src_base: Address::new(0),
            dst_l3_tile: config.memory.l3_tile_count, // one past the end
            dst_offset: Address::new(0),
            size: 16,
        },
    ));
    assert!(validate_program(&program, &config).is_err());
}

#[test]
fn rejects_empty_mask_barrier_as_not_satisfying_matmul_requirement() {
    let mut program = DMProgram::new(header(), Address::new(0), Address::new(0), Address::new(0));
    program.push(DMInstruction::new(
        0,
        Operation::Matmul {
            compute_tile: 0,
            l1_buffer_id: 0,
            a_addr: Address::new(0),
            b_addr: Address::new(0),
            c_addr: Address::new(0),
            m: 1,
            n: 1,
            k: 1,
        },
    ));
    // An empty-mask barrier waits on nothing, so it cannot stand in for a
    // real barrier after a MATMUL.
    program.push(DMInstruction::new(1, Operation::Barrier { mask: EngineMask::NONE }));
    assert!(validate_program(&program, &Config::default()).is_err());
}

#[test]
fn accepts_program_with_real_barrier_after_matmul() {
    let mut program = DMProgram::new(header(), Address::new(0), Address::new(0), Address::new(0));
    program.push(DMInstruction::new(
        0,
        Operation::Matmul {
            compute_tile: 0,
            l1_buffer_id: 0,
            a_addr: Address::new(0),
            b_addr: Address::new(0),
            c_addr: Address::new(0),
            m: 1,
            n: 1,
            k: 1,
        },
    ));
    program.push(DMInstruction::new(1, Operation::Barrier { mask: EngineMask::COMPUTE }));
    assert!(validate_program(&program, &Config::default()).is_ok());
}
