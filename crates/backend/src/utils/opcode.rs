use std::{iter::Peekable, str::SplitWhitespace};

use alloy_primitives::U256;
use once_cell::sync::Lazy;
use revm::interpreter::{
    opcode::{DIFFICULTY, JUMP, JUMPI, KECCAK256, PUSH0, PUSH1, PUSH32, SELFDESTRUCT},
    OpCode,
};
use rustc_hash::FxHashMap;

use crate::error::CoverageError;

/// Mnemonic to opcode byte, including the names older compilers print.
static MNEMONICS: Lazy<FxHashMap<&'static str, u8>> = Lazy::new(|| {
    let mut map: FxHashMap<_, _> =
        (0..=u8::MAX).filter_map(|byte| OpCode::new(byte).map(|op| (op.as_str(), byte))).collect();
    map.insert("SHA3", KECCAK256);
    map.insert("SUICIDE", SELFDESTRUCT);
    map.insert("PREVRANDAO", DIFFICULTY);
    map
});

/// Returns the byte width of the immediate operand of a PUSH opcode.
#[inline]
pub fn push_width(opcode: u8) -> usize {
    if (PUSH1..=PUSH32).contains(&opcode) {
        (opcode - PUSH0) as usize
    } else {
        0
    }
}

/// One instruction of a disassembled opcode string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpcodeStep {
    /// Program counter (byte offset in the deployed bytecode).
    pub pc: usize,
    /// Mnemonic as printed by the compiler.
    pub op: String,
    /// Opcode byte, if the mnemonic is known.
    pub code: Option<u8>,
    /// Immediate operand as printed by the compiler, e.g. `0x4F`.
    pub operand: Option<String>,
    /// Decoded immediate operand.
    pub value: Option<U256>,
}

impl OpcodeStep {
    #[inline]
    pub fn is(&self, opcode: u8) -> bool {
        self.code == Some(opcode)
    }

    #[inline]
    pub fn is_jump(&self) -> bool {
        self.is(JUMP) || self.is(JUMPI)
    }
}

/// Splits the compiler's opcode string (e.g. `PUSH1 0x80 PUSH1 0x40 MSTORE`) into instructions.
///
/// An operand token belongs to the preceding PUSH and advances the program counter by the PUSH
/// width instead of producing an instruction of its own. Any other `0x` token is a byte the
/// compiler could not name, such as the ones inside the metadata hash, and takes one byte.
pub struct Disassembler<'a> {
    tokens: Peekable<SplitWhitespace<'a>>,
    pc: usize,
}

impl<'a> Disassembler<'a> {
    pub fn new(opcodes: &'a str) -> Self {
        Self { tokens: opcodes.split_whitespace().peekable(), pc: 0 }
    }
}

impl Iterator for Disassembler<'_> {
    type Item = Result<OpcodeStep, CoverageError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.tokens.next()?;
        let mut step = OpcodeStep {
            pc: self.pc,
            op: token.to_string(),
            code: None,
            operand: None,
            value: None,
        };
        self.pc += 1;

        if token.starts_with("0x") {
            trace!(pc = step.pc, byte = token, "unnamed byte");
            return Some(Ok(step));
        }

        step.code = MNEMONICS.get(token).copied();
        let width = match step.code {
            Some(code) => push_width(code),
            None => {
                trace!(pc = step.pc, op = token, "unknown mnemonic");
                0
            }
        };

        if width > 0 {
            if let Some(operand) = self.tokens.next_if(|next| next.starts_with("0x")) {
                let Ok(value) = U256::from_str_radix(&operand[2..], 16) else {
                    return Some(Err(CoverageError::InvalidOperand {
                        op: token.to_string(),
                        operand: operand.to_string(),
                        pc: step.pc,
                    }));
                };
                step.operand = Some(operand.to_string());
                step.value = Some(value);
                self.pc += width;
            }
        }

        Some(Ok(step))
    }
}
