//! Data Movement ISA: instruction encoding, program structure, validation,
//! disassembly, and binary (de)serialization.
//!
//! 1. **Instruction:** `DMInstruction`, `Operation`, and the operand types
//!    each opcode carries.
//! 2. **Program:** `DMProgram`, its header, and the matrix/tile metadata.
//! 3. **Validate:** Static checks run before a program is loaded.
//! 4. **Disasm:** Textual disassembly for debugging and the `kpubin-disasm`
//!    tool.
//! 5. **Binary:** The canonical `.kpubin` on-disk format.

/// The canonical `.kpubin` binary program format.
pub mod binary;
/// Textual program disassembly.
pub mod disasm;
/// Instruction set: opcodes and their operands.
pub mod instruction;
/// Program structure: header, matrix/tile metadata, instruction list.
pub mod program;
/// Static program validation.
pub mod validate;

pub use disasm::disassemble_program;
pub use instruction::{DMInstruction, MatrixId, Operation, StreamGeometry, TileCoord, Transform};
pub use program::{ActivationKind, BiasConfig, DMProgram, ElementKind, MatrixDims, ProgramHeader, TileShape};
pub use validate::validate_program;
