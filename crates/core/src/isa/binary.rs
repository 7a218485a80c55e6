//! `.kpubin` binary program format.
//!
//! Layout: magic `"KPUB"`, version (u32), header, instruction count (u32),
//! then each instruction as `(id u32, opcode u8, operand blob)`, followed by
//! a trailing CRC32 of everything written before it. All integers are
//! little-endian.
//!
//! No crate in the dependency stack provides CRC32, so it is hand-rolled
//! here (IEEE 802.3 polynomial, the same one `zip`/`gzip` use).

use crate::common::{Address, EngineMask, KpuError, KpuResult};

use super::instruction::{DMInstruction, MatrixId, Operation, StreamGeometry, TileCoord, Transform};
use super::program::{ActivationKind, BiasConfig, DMProgram, ElementKind, MatrixDims, ProgramHeader, TileShape};

const MAGIC: [u8; 4] = *b"KPUB";
const VERSION: u32 = 1;

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn address(&mut self, v: Address) {
        self.u64(v.val());
    }

    fn tile(&mut self, v: TileCoord) {
        self.u32(v.row);
        self.u32(v.col);
    }

    fn geometry(&mut self, v: StreamGeometry) {
        self.address(v.l2_addr);
        self.address(v.l1_addr);
        self.u32(v.height);
        self.u32(v.width);
        self.u32(v.element_size);
        self.u32(v.fabric_size);
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn need(&self, n: usize) -> KpuResult<()> {
        if self.pos + n > self.buf.len() {
            return Err(KpuError::InvalidProgram("unexpected end of .kpubin data".to_string()));
        }
        Ok(())
    }

    fn u8(&mut self) -> KpuResult<u8> {
        self.need(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn u32(&mut self) -> KpuResult<u32> {
        self.need(4)?;
        let v = u32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn u64(&mut self) -> KpuResult<u64> {
        self.need(8)?;
        let v = u64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn address(&mut self) -> KpuResult<Address> {
        Ok(Address::new(self.u64()?))
    }

    fn tile(&mut self) -> KpuResult<TileCoord> {
        let row = self.u32()?;
        let col = self.u32()?;
        Ok(TileCoord::new(row, col))
    }

    fn geometry(&mut self) -> KpuResult<StreamGeometry> {
        Ok(StreamGeometry {
            l2_addr: self.address()?,
            l1_addr: self.address()?,
            height: self.u32()?,
            width: self.u32()?,
            element_size: self.u32()?,
            fabric_size: self.u32()?,
        })
    }
}

fn matrix_id_to_u8(m: MatrixId) -> u8 {
    match m {
        MatrixId::A => 0,
        MatrixId::B => 1,
        MatrixId::C => 2,
    }
}

fn matrix_id_from_u8(v: u8) -> KpuResult<MatrixId> {
    match v {
        0 => Ok(MatrixId::A),
        1 => Ok(MatrixId::B),
        2 => Ok(MatrixId::C),
        other => Err(KpuError::InvalidProgram(format!("unknown matrix id tag {other}"))),
    }
}

fn element_kind_to_u8(e: ElementKind) -> u8 {
    match e {
        ElementKind::F32 => 0,
        ElementKind::F64 => 1,
    }
}

fn element_kind_from_u8(v: u8) -> KpuResult<ElementKind> {
    match v {
        0 => Ok(ElementKind::F32),
        1 => Ok(ElementKind::F64),
        other => Err(KpuError::InvalidProgram(format!("unknown element kind tag {other}"))),
    }
}

fn activation_to_u8(a: ActivationKind) -> u8 {
    match a {
        ActivationKind::None => 0,
        ActivationKind::Relu => 1,
        ActivationKind::Sigmoid => 2,
        ActivationKind::Tanh => 3,
    }
}

fn activation_from_u8(v: u8) -> KpuResult<ActivationKind> {
    match v {
        0 => Ok(ActivationKind::None),
        1 => Ok(ActivationKind::Relu),
        2 => Ok(ActivationKind::Sigmoid),
        3 => Ok(ActivationKind::Tanh),
        other => Err(KpuError::InvalidProgram(format!("unknown activation tag {other}"))),
    }
}

const OP_DMA_LOAD: u8 = 0;
const OP_DMA_STORE: u8 = 1;
const OP_BM_MOVE: u8 = 2;
const OP_STR_ROW: u8 = 3;
const OP_STR_COL: u8 = 4;
const OP_STR_OUT: u8 = 5;
const OP_MATMUL: u8 = 6;
const OP_BARRIER: u8 = 7;
const OP_WAIT_ID: u8 = 8;
const OP_NOP: u8 = 9;

const TRANSFORM_IDENTITY: u8 = 0;
const TRANSFORM_TRANSPOSE: u8 = 1;
const TRANSFORM_PAD: u8 = 2;

/// Serializes a program to its canonical `.kpubin` byte representation.
#[must_use]
pub fn write_program(program: &DMProgram) -> Vec<u8> {
    let mut w = Writer::new();
    w.buf.extend_from_slice(&MAGIC);
    w.u32(VERSION);

    let dims = program.header.matrix_dims;
    let tiles = program.header.tile_shape;
    w.u64(u64::from(dims.m));
    w.u64(u64::from(dims.n));
    w.u64(u64::from(dims.k));
    w.u64(u64::from(tiles.ti));
    w.u64(u64::from(tiles.tj));
    w.u64(u64::from(tiles.tk));
    w.u8(element_kind_to_u8(program.header.element_kind));
    w.u8(0); // flags, reserved
    w.u8(u8::from(program.header.bias.is_some()));
    w.u8(activation_to_u8(program.header.activation));
    if let Some(bias) = program.header.bias {
        w.address(bias.addr);
        w.u8(element_kind_to_u8(bias.element_kind));
    }
    w.address(program.a_base);
    w.address(program.b_base);
    w.address(program.c_base);

    w.u32(program.instructions.len() as u32);
    for instr in &program.instructions {
        w.u32(instr.id);
        write_operation(&mut w, &instr.op);
    }

    let crc = crc32(&w.buf);
    w.u32(crc);
    w.buf
}

fn write_operation(w: &mut Writer, op: &Operation) {
    match op {
        Operation::DmaLoad {
            matrix,
            tile,
            src_base,
            dst_l3_tile,
            dst_offset,
            size,
        } => {
            w.u8(OP_DMA_LOAD);
            w.u8(matrix_id_to_u8(*matrix));
            w.tile(*tile);
            w.address(*src_base);
            w.u32(*dst_l3_tile as u32);
            w.address(*dst_offset);
            w.u64(*size);
        }
        Operation::DmaStore {
            matrix,
            tile,
            src_l3_tile,
            src_offset,
            dst_base,
            size,
        } => {
            w.u8(OP_DMA_STORE);
            w.u8(matrix_id_to_u8(*matrix));
            w.tile(*tile);
            w.u32(*src_l3_tile as u32);
            w.address(*src_offset);
            w.address(*dst_base);
            w.u64(*size);
        }
        Operation::BmMove {
            src_l3_tile,
            src_offset,
            dst_l2_bank,
            dst_offset,
            rows,
            cols,
            element_size,
            transform,
        } => {
            w.u8(OP_BM_MOVE);
            w.u32(*src_l3_tile as u32);
            w.address(*src_offset);
            w.u32(*dst_l2_bank as u32);
            w.address(*dst_offset);
            w.u32(*rows);
            w.u32(*cols);
            w.u32(*element_size);
            match transform {
                Transform::Identity => w.u8(TRANSFORM_IDENTITY),
                Transform::Transpose => w.u8(TRANSFORM_TRANSPOSE),
                Transform::Pad { dst_rows, dst_cols } => {
                    w.u8(TRANSFORM_PAD);
                    w.u32(*dst_rows);
                    w.u32(*dst_cols);
                }
            }
        }
        Operation::StrRow {
            src_l2_bank,
            dst_l1_buffer,
            geometry,
        } => {
            w.u8(OP_STR_ROW);
            w.u32(*src_l2_bank as u32);
            w.u32(*dst_l1_buffer as u32);
            w.geometry(*geometry);
        }
        Operation::StrCol {
            src_l2_bank,
            dst_l1_buffer,
            geometry,
        } => {
            w.u8(OP_STR_COL);
            w.u32(*src_l2_bank as u32);
            w.u32(*dst_l1_buffer as u32);
            w.geometry(*geometry);
        }
        Operation::StrOut {
            src_l1_buffer,
            dst_l2_bank,
            geometry,
        } => {
            w.u8(OP_STR_OUT);
            w.u32(*src_l1_buffer as u32);
            w.u32(*dst_l2_bank as u32);
            w.geometry(*geometry);
        }
        Operation::Matmul {
            compute_tile,
            l1_buffer_id,
            a_addr,
            b_addr,
            c_addr,
            m,
            n,
            k,
        } => {
            w.u8(OP_MATMUL);
            w.u32(*compute_tile as u32);
            w.u32(*l1_buffer_id as u32);
            w.address(*a_addr);
            w.address(*b_addr);
            w.address(*c_addr);
            w.u32(*m);
            w.u32(*n);
            w.u32(*k);
        }
        Operation::Barrier { mask } => {
            w.u8(OP_BARRIER);
            w.u8(mask.bits());
        }
        Operation::WaitId { target } => {
            w.u8(OP_WAIT_ID);
            w.u32(*target);
        }
        Operation::Nop => w.u8(OP_NOP),
    }
}

/// Deserializes a program from its `.kpubin` byte representation.
///
/// # Errors
///
/// Returns `InvalidProgram` if the magic, CRC, or any field fails to parse.
pub fn read_program(data: &[u8]) -> KpuResult<DMProgram> {
    if data.len() < 4 + 4 {
        return Err(KpuError::InvalidProgram("data too short for .kpubin header".to_string()));
    }
    if data[0..4] != MAGIC {
        return Err(KpuError::InvalidProgram("bad magic, not a .kpubin file".to_string()));
    }
    let (body, trailer) = data.split_at(data.len() - 4);
    let expected_crc = u32::from_le_bytes(trailer.try_into().unwrap());
    let actual_crc = crc32(body);
    if expected_crc != actual_crc {
        return Err(KpuError::InvalidProgram(format!(
            "CRC mismatch: expected {expected_crc:#010x}, computed {actual_crc:#010x}"
        )));
    }

    let mut r = Reader::new(body);
    r.pos = 4; // skip magic
    let version = r.u32()?;
    if version != VERSION {
        return Err(KpuError::InvalidProgram(format!("unsupported .kpubin version {version}")));
    }

    let m = r.u64()? as u32;
    let n = r.u64()? as u32;
    let k = r.u64()? as u32;
    let ti = r.u64()? as u32;
    let tj = r.u64()? as u32;
    let tk = r.u64()? as u32;
    let element_kind = element_kind_from_u8(r.u8()?)?;
    let _flags = r.u8()?;
    let has_bias = r.u8()? != 0;
    let activation = activation_from_u8(r.u8()?)?;
    let bias = if has_bias {
        let addr = r.address()?;
        let element_kind = element_kind_from_u8(r.u8()?)?;
        Some(BiasConfig { addr, element_kind })
    } else {
        None
    };
    let a_base = r.address()?;
    let b_base = r.address()?;
    let c_base = r.address()?;

    let header = ProgramHeader {
        matrix_dims: MatrixDims { m, n, k },
        tile_shape: TileShape { ti, tj, tk },
        element_kind,
        bias,
        activation,
    };
    let mut program = DMProgram::new(header, a_base, b_base, c_base);

    let count = r.u32()?;
    for _ in 0..count {
        let id = r.u32()?;
        let op = read_operation(&mut r)?;
        program.push(DMInstruction::new(id, op));
    }

    Ok(program)
}

fn read_operation(r: &mut Reader) -> KpuResult<Operation> {
    let tag = r.u8()?;
    let op = match tag {
        OP_DMA_LOAD => Operation::DmaLoad {
            matrix: matrix_id_from_u8(r.u8()?)?,
            tile: r.tile()?,
            src_base: r.address()?,
            dst_l3_tile: r.u32()? as usize,
            dst_offset: r.address()?,
            size: r.u64()?,
        },
        OP_DMA_STORE => Operation::DmaStore {
            matrix: matrix_id_from_u8(r.u8()?)?,
            tile: r.tile()?,
            src_l3_tile: r.u32()? as usize,
            src_offset: r.address()?,
            dst_base: r.address()?,
            size: r.u64()?,
        },
        OP_BM_MOVE => {
            let src_l3_tile = r.u32()? as usize;
            let src_offset = r.address()?;
            let dst_l2_bank = r.u32()? as usize;
            let dst_offset = r.address()?;
            let rows = r.u32()?;
            let cols = r.u32()?;
            let element_size = r.u32()?;
            let transform = match r.u8()? {
                TRANSFORM_IDENTITY => Transform::Identity,
                TRANSFORM_TRANSPOSE => Transform::Transpose,
                TRANSFORM_PAD => {
                    let dst_rows = r.u32()?;
                    let dst_cols = r.u32()?;
                    Transform::Pad { dst_rows, dst_cols }
                }
                other => return Err(KpuError::InvalidProgram(format!("unknown transform tag {other}"))),
            };
            Operation::BmMove {
                src_l3_tile,
                src_offset,
                dst_l2_bank,
                dst_offset,
                rows,
                cols,
                element_size,
                transform,
            }
        }
        OP_STR_ROW => Operation::StrRow {
            src_l2_bank: r.u32()? as usize,
            dst_l1_buffer: r.u32()? as usize,
            geometry: r.geometry()?,
        },
        OP_STR_COL => Operation::StrCol {
            src_l2_bank: r.u32()? as usize,
            dst_l1_buffer: r.u32()? as usize,
            geometry: r.geometry()?,
        },
        OP_STR_OUT => Operation::StrOut {
            src_l1_buffer: r.u32()? as usize,
            dst_l2_bank: r.u32()? as usize,
            geometry: r.geometry()?,
        },
        OP_MATMUL => Operation::Matmul {
            compute_tile: r.u32()? as usize,
            l1_buffer_id: r.u32()? as usize,
            a_addr: r.address()?,
            b_addr: r.address()?,
            c_addr: r.address()?,
            m: r.u32()?,
            n: r.u32()?,
            k: r.u32()?,
        },
        OP_BARRIER => Operation::Barrier {
            mask: EngineMask::from_bits(r.u8()?),
        },
        OP_WAIT_ID => Operation::WaitId { target: r.u32()? },
        OP_NOP => Operation::Nop,
        other => return Err(KpuError::InvalidProgram(format!("unknown opcode tag {other}"))),
    };
    Ok(op)
}

/// Serializes a program to the `.kpukernel` textual JSON encoding, using the
/// same `serde`-derived structures as `.kpubin`'s header.
///
/// # Errors
///
/// Returns `InvalidProgram` if serialization fails (it cannot for a
/// well-formed `DMProgram`, but the error is surfaced rather than unwrapped).
pub fn to_json(program: &DMProgram) -> KpuResult<String> {
    serde_json::to_string_pretty(program).map_err(|e| KpuError::InvalidProgram(format!("serializing program: {e}")))
}

/// Deserializes a program from its `.kpukernel` textual JSON encoding.
///
/// # Errors
///
/// Returns `InvalidProgram` if `text` is not a valid `DMProgram` document.
pub fn from_json(text: &str) -> KpuResult<DMProgram> {
    serde_json::from_str(text).map_err(|e| KpuError::InvalidProgram(format!("parsing program: {e}")))
}

fn crc32(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (POLY & mask);
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EngineMask;

    fn sample_program() -> DMProgram {
        let header = ProgramHeader {
            matrix_dims: MatrixDims { m: 2, n: 2, k: 2 },
            tile_shape: TileShape { ti: 2, tj: 2, tk: 2 },
            element_kind: ElementKind::F32,
            bias: None,
            activation: ActivationKind::None,
        };
        let mut program = DMProgram::new(header, Address::new(0x1000), Address::new(0x2000), Address::new(0x3000));
        program.push(DMInstruction::new(
            0,
            Operation::DmaLoad {
                matrix: MatrixId::A,
                tile: TileCoord::new(0, 0),
                src_base: Address::new(0x1000),
                dst_l3_tile: 0,
                dst_offset: Address::new(0),
                size: 16,
            },
        ));
        program.push(DMInstruction::new(1, Operation::Barrier { mask: EngineMask::DMA }));
        program.push(DMInstruction::new(2, Operation::Nop));
        program
    }

    #[test]
    fn round_trips_structurally_equal() {
        let program = sample_program();
        let bytes = write_program(&program);
        let decoded = read_program(&bytes).unwrap();
        assert_eq!(program, decoded);
    }

    #[test]
    fn rejects_corrupted_crc() {
        let program = sample_program();
        let mut bytes = write_program(&program);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(read_program(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = write_program(&sample_program());
        bytes[0] = b'X';
        assert!(read_program(&bytes).is_err());
    }
}
