//! Static program validation.

use crate::common::{EngineMask, KpuError, KpuResult};
use crate::config::Config;

use super::instruction::{MatrixId, Operation, TileCoord};
use super::program::DMProgram;

/// Validates a program against a configuration before it is loaded into the
/// executor.
///
/// Checks:
/// (a) instruction ids are strictly increasing;
/// (b) every tile coordinate falls within the program's matrix/tile bounds;
/// (c) every engine id an instruction references is within the configured
///     instance count;
/// (d) if any `MATMUL` is present, at least one `BARRIER` precedes the end
///     of the program.
///
/// # Errors
///
/// Returns `InvalidProgram` describing the first violation found.
pub fn validate_program(program: &DMProgram, config: &Config) -> KpuResult<()> {
    check_monotone_ids(program)?;
    check_tile_bounds(program)?;
    check_engine_ids(program, config)?;
    check_barrier_precedes_matmul(program)?;
    Ok(())
}

fn check_monotone_ids(program: &DMProgram) -> KpuResult<()> {
    let mut last: Option<u32> = None;
    for instr in &program.instructions {
        if let Some(prev) = last {
            if instr.id <= prev {
                return Err(KpuError::InvalidProgram(format!(
                    "instruction id {} does not strictly increase after {prev}",
                    instr.id
                )));
            }
        }
        last = Some(instr.id);
    }
    Ok(())
}

fn check_tile_bounds(program: &DMProgram) -> KpuResult<()> {
    let dims = program.header.matrix_dims;
    let tiles = program.header.tile_shape;
    let tile_grid = |matrix: MatrixId| -> (u32, u32) {
        match matrix {
            MatrixId::A => (dims.m.div_ceil(tiles.ti), dims.k.div_ceil(tiles.tk)),
            MatrixId::B => (dims.k.div_ceil(tiles.tk), dims.n.div_ceil(tiles.tj)),
            MatrixId::C => (dims.m.div_ceil(tiles.ti), dims.n.div_ceil(tiles.tj)),
        }
    };
    let in_bounds = |matrix: MatrixId, tile: TileCoord| -> bool {
        let (rows, cols) = tile_grid(matrix);
        tile.row < rows && tile.col < cols
    };

    for instr in &program.instructions {
        match &instr.op {
            Operation::DmaLoad { matrix, tile, .. } | Operation::DmaStore { matrix, tile, .. } => {
                if !in_bounds(*matrix, *tile) {
                    return Err(KpuError::InvalidProgram(format!(
                        "instruction {}: tile {:?} out of bounds for matrix {matrix:?}",
                        instr.id, tile
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_engine_ids(program: &DMProgram, config: &Config) -> KpuResult<()> {
    for instr in &program.instructions {
        let (label, id, count) = match &instr.op {
            Operation::DmaLoad { dst_l3_tile, .. } => ("L3 tile", *dst_l3_tile, config.memory.l3_tile_count),
            Operation::DmaStore { src_l3_tile, .. } => ("L3 tile", *src_l3_tile, config.memory.l3_tile_count),
            Operation::BmMove {
                src_l3_tile,
                dst_l2_bank,
                ..
            } => {
                if *src_l3_tile >= config.memory.l3_tile_count {
                    return Err(out_of_range(instr.id, "L3 tile", *src_l3_tile, config.memory.l3_tile_count));
                }
                ("L2 bank", *dst_l2_bank, config.memory.l2_bank_count)
            }
            Operation::StrRow { src_l2_bank, dst_l1_buffer, .. }
            | Operation::StrCol { src_l2_bank, dst_l1_buffer, .. } => {
                if *src_l2_bank >= config.memory.l2_bank_count {
                    return Err(out_of_range(instr.id, "L2 bank", *src_l2_bank, config.memory.l2_bank_count));
                }
                ("L1 buffer", *dst_l1_buffer, config.memory.l1_buffer_count)
            }
            Operation::StrOut { src_l1_buffer, dst_l2_bank, .. } => {
                if *dst_l2_bank >= config.memory.l2_bank_count {
                    return Err(out_of_range(instr.id, "L2 bank", *dst_l2_bank, config.memory.l2_bank_count));
                }
                ("L1 buffer", *src_l1_buffer, config.memory.l1_buffer_count)
            }
            Operation::Matmul {
                compute_tile,
                l1_buffer_id,
                ..
            } => {
                if *compute_tile >= config.compute.compute_tile_count {
                    return Err(out_of_range(
                        instr.id,
                        "compute tile",
                        *compute_tile,
                        config.compute.compute_tile_count,
                    ));
                }
                ("L1 buffer", *l1_buffer_id, config.memory.l1_buffer_count)
            }
            Operation::Barrier { .. } | Operation::WaitId { .. } | Operation::Nop => continue,
        };
        if id >= count {
            return Err(out_of_range(instr.id, label, id, count));
        }
    }
    Ok(())
}

fn out_of_range(instr_id: u32, label: &str, id: usize, count: usize) -> KpuError {
    KpuError::InvalidProgram(format!(
        "instruction {instr_id}: {label} id {id} is out of range (configured count {count})"
    ))
}

fn check_barrier_precedes_matmul(program: &DMProgram) -> KpuResult<()> {
    let has_matmul = program.instructions.iter().any(|i| matches!(i.op, Operation::Matmul { .. }));
    if !has_matmul {
        return Ok(());
    }
    let has_barrier = program
        .instructions
        .iter()
        .any(|i| matches!(i.op, Operation::Barrier { mask } if !mask.is_empty()));
    if !has_barrier {
        return Err(KpuError::InvalidProgram(
            "program contains MATMUL but no BARRIER precedes the end of the program".to_string(),
        ));
    }
    Ok(())
}
