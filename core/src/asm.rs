//! Minimal EVM assembler
//!
//! Enough to write small contracts by hand: opcodes, pushes, labels resolved
//! to fixed-width `PUSH2` jump targets, and raw data sections appended after
//! the code.

use crate::errors::{LabError, Result};

/// Opcodes used by the bundled contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Stop = 0x00,
    Add = 0x01,
    Mul = 0x02,
    Sub = 0x03,
    Lt = 0x10,
    Eq = 0x14,
    IsZero = 0x15,
    And = 0x16,
    Shr = 0x1c,
    Keccak256 = 0x20,
    Caller = 0x33,
    CallValue = 0x34,
    CallDataLoad = 0x35,
    CallDataSize = 0x36,
    CallDataCopy = 0x37,
    CodeSize = 0x38,
    CodeCopy = 0x39,
    MLoad = 0x51,
    MStore = 0x52,
    SLoad = 0x54,
    SStore = 0x55,
    Jump = 0x56,
    JumpI = 0x57,
    JumpDest = 0x5b,
    Dup1 = 0x80,
    Dup2 = 0x81,
    Dup3 = 0x82,
    Swap2 = 0x91,
    Create = 0xf0,
    Return = 0xf3,
    Revert = 0xfd,
    SelfDestruct = 0xff,
}

const PUSH1: u8 = 0x60;
const PUSH2: u8 = 0x61;

/// Handle to a code position, bound once and referenced any number of times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Bytecode builder
///
/// ```rust,ignore
/// let mut asm = Assembler::new();
/// let done = asm.new_label();
/// asm.op(Op::CallValue).push_label(done).op(Op::JumpI);
/// asm.push_u64(0).op(Op::Dup1).op(Op::Revert);
/// asm.jumpdest(done).op(Op::Stop);
/// let code = asm.finish()?;
/// ```
#[derive(Debug, Default)]
pub struct Assembler {
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
    error: Option<String>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(&mut self, op: Op) -> &mut Self {
        self.code.push(op as u8);
        self
    }

    /// Push an integer with the narrowest PUSH (never PUSH0, to stay London-compatible)
    pub fn push_u64(&mut self, value: u64) -> &mut Self {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
        self.push_bytes(&bytes[skip..])
    }

    /// Push 1 to 32 bytes as-is
    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        if bytes.is_empty() || bytes.len() > 32 {
            self.fail(format!("cannot push {} bytes", bytes.len()));
            return self;
        }
        self.code.push(PUSH1 + (bytes.len() as u8 - 1));
        self.code.extend_from_slice(bytes);
        self
    }

    /// Allocate an unbound label
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current offset without emitting anything
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let offset = self.code.len();
        match self.labels.get(label.0).copied() {
            Some(None) => self.labels[label.0] = Some(offset),
            Some(Some(_)) => self.fail(format!("label {} bound twice", label.0)),
            None => self.fail(format!("label {} was not allocated here", label.0)),
        }
        self
    }

    /// Bind a label and emit JUMPDEST
    pub fn jumpdest(&mut self, label: Label) -> &mut Self {
        self.bind(label).op(Op::JumpDest)
    }

    /// Push a label's offset as PUSH2, patched in [`Assembler::finish`]
    pub fn push_label(&mut self, label: Label) -> &mut Self {
        self.code.push(PUSH2);
        self.fixups.push((self.code.len(), label));
        self.code.extend_from_slice(&[0, 0]);
        self
    }

    /// `PUSH2 label; JUMPI`
    pub fn jump_if(&mut self, label: Label) -> &mut Self {
        self.push_label(label).op(Op::JumpI)
    }

    /// `PUSH2 label; JUMP`
    pub fn jump(&mut self, label: Label) -> &mut Self {
        self.push_label(label).op(Op::Jump)
    }

    /// Append raw bytes (data, embedded code)
    pub fn append(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// Resolve labels and return the bytecode
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if let Some(err) = self.error.take() {
            return Err(LabError::InvalidBytecode(err));
        }
        for (pos, label) in &self.fixups {
            let target = self.labels[label.0]
                .ok_or_else(|| LabError::InvalidBytecode(format!("unbound label {}", label.0)))?;
            let target = u16::try_from(target).map_err(|_| {
                LabError::InvalidBytecode(format!("label offset {target} exceeds PUSH2"))
            })?;
            self.code[*pos..*pos + 2].copy_from_slice(&target.to_be_bytes());
        }
        Ok(self.code)
    }

    fn fail(&mut self, msg: String) {
        self.error.get_or_insert(msg);
    }
}
