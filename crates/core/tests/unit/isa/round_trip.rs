//! `.kpubin` and `.kpukernel` round-trip tests: a program encoded and
//! decoded back should compare equal, field for field.

use kpu_core::common::{Address, EngineMask};
use kpu_core::isa::{
    binary, ActivationKind, BiasConfig, DMInstruction, DMProgram, ElementKind, MatrixDims, MatrixId, Operation, ProgramHeader, StreamGeometry,
    TileCoord, TileShape, Transform,
};

fn sample_program() -> DMProgram {
    let header = ProgramHeader {
        matrix_dims: MatrixDims { m: 4, n: 4, k: 4 },
        tile_shape: TileShape { ti: 2, tj: 2, tk: 2 },
        element_kind: ElementKind::F32,
        bias: Some(BiasConfig {
            addr: Address::new(9000),
            element_kind: ElementKind::F64,
        }),
        activation: ActivationKind::Relu,
    };
    let mut program = DMProgram::new(header, Address::new(0), Address::new(1024), Address::new(2048));

    program.push(DMInstruction::new(
        0,
        Operation::DmaLoad {
            matrix: MatrixId::A,
            tile: TileCoord::new(1, 0),
            src_base: Address::new(0),
            dst_l3_tile: 0,
            dst_offset: Address::new(0),
            size: 16,
        },
    ));
    program.push(DMInstruction::new(
        1,
        Operation::DmaStore {
            matrix: MatrixId::C,
            tile: TileCoord::new(0, 1),
            src_l3_tile: 2,
            src_offset: Address::new(64),
            dst_base: Address::new(4096),
            size: 16,
        },
    ));
    program.push(DMInstruction::new(
        2,
        Operation::BmMove {
            src_l3_tile: 0,
            src_offset: Address::new(0),
            dst_l2_bank: 1,
            dst_offset: Address::new(0),
            rows: 2,
            cols: 2,
            element_size: 4,
            transform: Transform::Pad { dst_rows: 4, dst_cols: 4 },
        },
    ));
    let geometry = StreamGeometry {
        l2_addr: Address::new(0),
        l1_addr: Address::new(0),
        height: 2,
        width: 2,
        element_size: 4,
        fabric_size: 4,
    };
    program.push(DMInstruction::new(
        3,
        Operation::StrRow {
            src_l2_bank: 1,
            dst_l1_buffer: 0,
            geometry,
        },
    ));
    program.push(DMInstruction::new(
        4,
        Operation::StrCol {
            src_l2_bank: 1,
            dst_l1_buffer: 0,
            geometry,
        },
    ));
    program.push(DMInstruction::new(
        5,
        Operation::StrOut {
            src_l1_buffer: 0,
            dst_l2_bank: 2,
            geometry,
        },
    ));
    program.push(DMInstruction::new(
        6,
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
    program.push(DMInstruction::new(7, Operation::Barrier { mask: EngineMask::ALL }));
    program.push(DMInstruction::new(8, Operation::WaitId { target: 6 }));
    program.push(DMInstruction::new(9, Operation::Nop));
    program
}

#[test]
fn kpubin_round_trip_preserves_program() {
    let program = sample_program();
    let bytes = binary::write_program(&program);
    let decoded = binary::read_program(&bytes).unwrap();
    assert_eq!(decoded, program);
}

#[test]
fn kpubin_rejects_corrupted_trailer() {
    let program = sample_program();
    let mut bytes = binary::write_program(&program);
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(binary::read_program(&bytes).is_err());
}

#[test]
fn kpubin_rejects_bad_magic() {
    let mut bytes = binary::write_program(&sample_program());
    bytes[0] = b'X';
    assert!(binary::read_program(&bytes).is_err());
}

#[test]
fn kpukernel_json_round_trip_preserves_program() {
    let program = sample_program();
    let text = binary::to_json(&program).unwrap();
    let decoded = binary::from_json(&text).unwrap();
    assert_eq!(decoded, program);
}

#[test]
fn kpukernel_json_rejects_malformed_text() {
    assert!(binary::from_json("{ not json").is_err());
}
