//! Textual program disassembly.

use std::fmt::Write as _;

use super::instruction::{Operation, Transform};
use super::program::DMProgram;

/// Renders a program as a textual disassembly: a header line summarizing
/// dimensions and tiling, then one `id  opcode  operands` line per
/// instruction.
#[must_use]
pub fn disassemble_program(program: &DMProgram) -> String {
    let mut out = String::new();
    let dims = program.header.matrix_dims;
    let tiles = program.header.tile_shape;
    let _ = writeln!(
        out,
        "; M={} N={} K={}  tile={}x{}x{}  elem={:?}  activation={:?}",
        dims.m, dims.n, dims.k, tiles.ti, tiles.tj, tiles.tk, program.header.element_kind, program.header.activation
    );
    let _ = writeln!(
        out,
        "; a_base={}  b_base={}  c_base={}",
        program.a_base, program.b_base, program.c_base
    );
    for instr in &program.instructions {
        let _ = writeln!(out, "{:>5}  {:<9} {}", instr.id, instr.op.opcode_name(), operands(&instr.op));
    }
    out
}

fn operands(op: &Operation) -> String {
    match op {
        Operation::DmaLoad {
            matrix,
            tile,
            src_base,
            dst_l3_tile,
            dst_offset,
            size,
        } => format!(
            "{matrix:?} tile=({},{}) src={src_base} dst=l3#{dst_l3_tile}+{dst_offset} size={size}",
            tile.row, tile.col
        ),
        Operation::DmaStore {
            matrix,
            tile,
            src_l3_tile,
            src_offset,
            dst_base,
            size,
        } => format!(
            "{matrix:?} tile=({},{}) src=l3#{src_l3_tile}+{src_offset} dst={dst_base} size={size}",
            tile.row, tile.col
        ),
        Operation::BmMove {
            src_l3_tile,
            src_offset,
            dst_l2_bank,
            dst_offset,
            rows,
            cols,
            element_size,
            transform,
        } => format!(
            "l3#{src_l3_tile}+{src_offset} -> l2#{dst_l2_bank}+{dst_offset}  {rows}x{cols}x{element_size}  {}",
            transform_name(transform)
        ),
        Operation::StrRow {
            src_l2_bank,
            dst_l1_buffer,
            geometry,
        }
        | Operation::StrCol {
            src_l2_bank,
            dst_l1_buffer,
            geometry,
        } => format!(
            "l2#{src_l2_bank}+{} -> l1#{dst_l1_buffer}+{}  {}x{}x{} fabric={}",
            geometry.l2_addr, geometry.l1_addr, geometry.height, geometry.width, geometry.element_size, geometry.fabric_size
        ),
        Operation::StrOut {
            src_l1_buffer,
            dst_l2_bank,
            geometry,
        } => format!(
            "l1#{src_l1_buffer}+{} -> l2#{dst_l2_bank}+{}  {}x{}x{} fabric={}",
            geometry.l1_addr, geometry.l2_addr, geometry.height, geometry.width, geometry.element_size, geometry.fabric_size
        ),
        Operation::Matmul {
            compute_tile,
            l1_buffer_id,
            a_addr,
            b_addr,
            c_addr,
            m,
            n,
            k,
        } => format!(
            "tile#{compute_tile} l1#{l1_buffer_id} a={a_addr} b={b_addr} c={c_addr} m={m} n={n} k={k}"
        ),
        Operation::Barrier { mask } => format!("mask={mask:?}"),
        Operation::WaitId { target } => format!("id={target}"),
        Operation::Nop => String::new(),
    }
}

fn transform_name(transform: &Transform) -> String {
    match transform {
        Transform::Identity => "IDENTITY".to_string(),
        Transform::Transpose => "TRANSPOSE".to_string(),
        Transform::Pad { dst_rows, dst_cols } => format!("PAD({dst_rows}x{dst_cols})"),
    }
}
