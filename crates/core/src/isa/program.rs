//! Program structure: header, metadata, and the instruction list.

use serde::{Deserialize, Serialize};

use crate::common::Address;

use super::instruction::DMInstruction;

/// Element type a program's matrices are stored as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// 32-bit IEEE 754 float (default).
    F32,
    /// 64-bit IEEE 754 float.
    F64,
}

impl ElementKind {
    /// Size of one element in bytes.
    #[must_use]
    pub fn size_bytes(self) -> u32 {
        match self {
            ElementKind::F32 => 4,
            ElementKind::F64 => 8,
        }
    }
}

/// Activation applied at evacuation time, if a kernel fuses one in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationKind {
    /// No activation.
    None,
    /// Rectified linear unit.
    Relu,
    /// Logistic sigmoid.
    Sigmoid,
    /// Hyperbolic tangent.
    Tanh,
}

/// Matrix dimensions `M, N, K` for `C[M,N] = A[M,K] x B[K,N]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixDims {
    /// Output row count / A row count.
    pub m: u32,
    /// Output column count / B column count.
    pub n: u32,
    /// Reduction dimension / A column count / B row count.
    pub k: u32,
}

/// Tile shape `Ti, Tj, Tk` the program's loop nest was tiled at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileShape {
    /// Output tile row count.
    pub ti: u32,
    /// Output tile column count.
    pub tj: u32,
    /// Reduction tile size.
    pub tk: u32,
}

/// Optional fused bias, added before the activation at evacuation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiasConfig {
    /// Address the bias vector is read from.
    pub addr: Address,
    /// Element kind of the bias vector.
    pub element_kind: ElementKind,
}

/// Program-level metadata: dimensions, tiling, element kind, and an optional
/// fused bias/activation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgramHeader {
    /// Overall matrix dimensions the program computes.
    pub matrix_dims: MatrixDims,
    /// Tile shape the loop nest was compiled with.
    pub tile_shape: TileShape,
    /// Element kind of A, B, and C.
    pub element_kind: ElementKind,
    /// Fused bias, if any.
    pub bias: Option<BiasConfig>,
    /// Fused activation, applied after any bias add.
    pub activation: ActivationKind,
}

/// A Data Movement ISA program: a header plus an ordered instruction list
/// and the external-memory base addresses for A, B, and C.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DMProgram {
    /// Program metadata.
    pub header: ProgramHeader,
    /// Base address of matrix A in external memory.
    pub a_base: Address,
    /// Base address of matrix B in external memory.
    pub b_base: Address,
    /// Base address of matrix C in external memory.
    pub c_base: Address,
    /// Instructions, in program order.
    pub instructions: Vec<DMInstruction>,
}

impl DMProgram {
    /// Creates a new program with no instructions.
    #[must_use]
    pub fn new(header: ProgramHeader, a_base: Address, b_base: Address, c_base: Address) -> Self {
        Self {
            header,
            a_base,
            b_base,
            c_base,
            instructions: Vec::new(),
        }
    }

    /// Appends an instruction to the program.
    pub fn push(&mut self, instr: DMInstruction) {
        self.instructions.push(instr);
    }

    /// Number of instructions in the program.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
