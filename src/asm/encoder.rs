//! Pass 2: turn one tokenized line into machine words.

use super::error::AsmError;
use super::lexer::Line;
use super::symbols::SymbolTable;
use crate::instructions::{lookup, Format, ImmForm};
use crate::isa::mips32::{IMM_MASK, RD_SHIFT, RS_SHIFT, RT_SHIFT, SHAMT_SHIFT, TARGET_MASK};
use crate::memory::Word;
use crate::registers;

/// Words produced by a line plus the recoverable diagnostics raised on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoded {
    pub words: Vec<Word>,
    pub warnings: Vec<AsmError>,
}

/// Parse a decimal or `0x` hexadecimal integer with an optional sign.
pub fn parse_int(token: &str) -> Option<i64> {
    let t = token.trim();
    let (neg, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let v = match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            i64::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) => t.parse().ok()?,
        None => return None,
    };
    Some(if neg { -v } else { v })
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

struct Fields<'s> {
    line: usize,
    addr: u32,
    symbols: &'s SymbolTable,
    warnings: Vec<AsmError>,
}

impl Fields<'_> {
    fn syntax(&mut self, msg: String) {
        self.warnings.push(AsmError::Syntax {
            line: self.line,
            msg,
        });
    }

    fn unresolved(&self, name: &str) -> AsmError {
        AsmError::UnresolvedSymbol {
            line: self.line,
            name: name.to_string(),
        }
    }

    /// Register field; problems are reported and the field becomes 0.
    fn reg(&mut self, token: Option<&str>, what: &str) -> u32 {
        match token {
            None => {
                self.syntax(format!("missing {what} register"));
                0
            }
            Some(t) => match registers::resolve(t) {
                Some(r) => r as u32,
                None => {
                    self.syntax(format!("`{t}` is not a register"));
                    0
                }
            },
        }
    }

    /// Range-check `v` against `lo..=hi` and mask it to `bits`.
    fn fit(&mut self, token: &str, v: i64, lo: i64, hi: i64, bits: u32) -> u32 {
        if v < lo || v > hi {
            self.warnings.push(AsmError::MalformedImmediate {
                line: self.line,
                token: token.to_string(),
                bits,
            });
        }
        let mask = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
        (v as u32) & mask
    }

    /// Numeric value of `token`, resolving symbols first.
    fn value(&mut self, token: &str) -> Result<Option<i64>, AsmError> {
        if let Some(a) = self.symbols.get(token) {
            return Ok(Some(a as i64));
        }
        if let Some(v) = parse_int(token) {
            return Ok(Some(v));
        }
        if is_identifier(token) && registers::resolve(token).is_none() {
            return Err(self.unresolved(token));
        }
        self.syntax(format!("`{token}` is not a number or symbol"));
        Ok(None)
    }

    /// 16-bit immediate checked against the range of `form`.
    fn imm16(&mut self, token: Option<&str>, form: ImmForm) -> Result<u32, AsmError> {
        let Some(t) = token else {
            self.syntax("missing immediate".to_string());
            return Ok(0);
        };
        Ok(match self.value(t)? {
            Some(v) => {
                let (lo, hi) = form.range();
                self.fit(t, v, lo, hi, 16)
            }
            None => 0,
        })
    }

    fn shamt(&mut self, token: Option<&str>) -> u32 {
        let Some(t) = token else {
            self.syntax("missing shift amount".to_string());
            return 0;
        };
        match parse_int(t) {
            Some(v) => self.fit(t, v, 0, 31, 5),
            None => {
                self.syntax(format!("`{t}` is not a shift amount"));
                0
            }
        }
    }

    /// Word offset from the following instruction to the target.
    fn branch_offset(&mut self, token: Option<&str>) -> Result<u32, AsmError> {
        let Some(t) = token else {
            self.syntax("missing branch target".to_string());
            return Ok(0);
        };
        let offset = if let Some(a) = self.symbols.get(t) {
            (a as i64 - (self.addr as i64 + 4)) / 4
        } else if let Some(v) = parse_int(t) {
            v
        } else if is_identifier(t) && registers::resolve(t).is_none() {
            return Err(self.unresolved(t));
        } else {
            self.syntax(format!("`{t}` is not a branch target"));
            return Ok(0);
        };
        Ok(self.fit(t, offset, -(1 << 15), (1 << 15) - 1, 16))
    }

    fn jump_target(&mut self, token: Option<&str>) -> Result<u32, AsmError> {
        let Some(t) = token else {
            self.syntax("missing jump target".to_string());
            return Ok(0);
        };
        let address = if let Some(a) = self.symbols.get(t) {
            a as i64
        } else if let Some(v) = parse_int(t) {
            if v % 4 != 0 {
                self.warnings.push(AsmError::MalformedImmediate {
                    line: self.line,
                    token: t.to_string(),
                    bits: 26,
                });
            }
            v
        } else if registers::resolve(t).is_some() {
            self.syntax(format!("jump target `{t}` is a register, use jr"));
            return Ok(0);
        } else if is_identifier(t) {
            return Err(self.unresolved(t));
        } else {
            self.syntax(format!("`{t}` is not a jump target"));
            return Ok(0);
        };
        Ok(self.fit(t, address >> 2, 0, TARGET_MASK as i64, 26))
    }

    /// `imm(rs)`, `(rs)` or a bare `imm`, returning `(imm, rs)`.
    fn mem_operand(&mut self, operand: &str) -> Result<(u32, u32), AsmError> {
        if operand.is_empty() {
            self.syntax("missing memory operand".to_string());
            return Ok((0, 0));
        }
        let (imm, base) = match operand.split_once('(') {
            Some((imm, base)) => {
                if !base.ends_with(')') {
                    self.syntax(format!("unclosed `(` in `{operand}`"));
                }
                (imm, Some(base))
            }
            None => (operand, None),
        };
        let imm = if imm.is_empty() {
            0
        } else {
            self.imm16(Some(imm), ImmForm::Memory)?
        };
        let rs = match base {
            Some(b) => self.reg(Some(b), "base"),
            None => 0,
        };
        Ok((imm, rs))
    }

    fn extra(&mut self, operands: &[&str], expected: usize) {
        if let Some(t) = operands.get(expected) {
            self.syntax(format!("unexpected operand `{t}`"));
        }
    }

    fn data(&mut self, token: &str, lo: i64, hi: i64, bits: u32) -> Result<u32, AsmError> {
        Ok(match self.value(token)? {
            Some(v) => self.fit(token, v, lo, hi, bits),
            None => 0,
        })
    }
}

/// Encode the instruction or directive on `line`, placed at byte address `addr`.
///
/// Only unresolved symbols are returned as errors; everything else is
/// collected in [`Encoded::warnings`] and the affected field is zeroed or
/// masked so the word count always matches the symbol pass.
pub fn encode_line(
    line: &Line<'_>,
    addr: u32,
    symbols: &SymbolTable,
) -> Result<Encoded, AsmError> {
    let mut f = Fields {
        line: line.number,
        addr,
        symbols,
        warnings: Vec::new(),
    };
    let mut words = Vec::new();
    let Some(mnemonic) = line.mnemonic() else {
        return Ok(Encoded::default());
    };
    let Some(desc) = lookup(mnemonic) else {
        f.warnings.push(AsmError::UnknownMnemonic {
            line: line.number,
            mnemonic: mnemonic.to_string(),
        });
        return Ok(Encoded {
            words,
            warnings: f.warnings,
        });
    };
    let ops = line.operands();
    let op = |i: usize| ops.get(i).copied();

    let fields = match desc.format {
        Format::Word => {
            for t in ops {
                let v = f.data(t, -(1 << 31), u32::MAX as i64, 32)?;
                words.push(Word::data(v));
            }
            None
        }
        Format::Byte => {
            let mut bytes = Vec::with_capacity(ops.len());
            for t in ops {
                bytes.push(f.data(t, -128, 255, 8)? as u8);
            }
            for chunk in bytes.chunks(4) {
                let mut le = [0u8; 4];
                le[..chunk.len()].copy_from_slice(chunk);
                words.push(Word::data(u32::from_le_bytes(le)));
            }
            None
        }
        Format::R => {
            let rd = f.reg(op(0), "destination");
            let rs = f.reg(op(1), "source");
            let rt = f.reg(op(2), "second source");
            f.extra(ops, 3);
            Some(rd << RD_SHIFT | rs << RS_SHIFT | rt << RT_SHIFT)
        }
        Format::Shift => {
            let rd = f.reg(op(0), "destination");
            let rt = f.reg(op(1), "source");
            let shamt = f.shamt(op(2));
            f.extra(ops, 3);
            Some(rd << RD_SHIFT | rt << RT_SHIFT | shamt << SHAMT_SHIFT)
        }
        Format::JumpReg => {
            let rs = f.reg(op(0), "target");
            f.extra(ops, 1);
            Some(rs << RS_SHIFT)
        }
        Format::I(form @ (ImmForm::Arith | ImmForm::Logical)) => {
            let rt = f.reg(op(0), "destination");
            let rs = f.reg(op(1), "source");
            let imm = f.imm16(op(2), form)?;
            f.extra(ops, 3);
            Some(rt << RT_SHIFT | rs << RS_SHIFT | imm)
        }
        Format::I(ImmForm::Upper) => {
            let rt = f.reg(op(0), "destination");
            let imm = f.imm16(op(1), ImmForm::Upper)?;
            f.extra(ops, 2);
            Some(rt << RT_SHIFT | imm)
        }
        Format::I(ImmForm::Memory) => {
            let rt = f.reg(op(0), "data");
            // `4 ($t1)` splits into two tokens
            let operand = ops.get(1..).unwrap_or(&[]).concat();
            let (imm, rs) = f.mem_operand(&operand)?;
            Some(rt << RT_SHIFT | rs << RS_SHIFT | (imm & IMM_MASK))
        }
        Format::Branch => {
            let rs = f.reg(op(0), "first");
            let rt = f.reg(op(1), "second");
            let offset = f.branch_offset(op(2))?;
            f.extra(ops, 3);
            Some(rs << RS_SHIFT | rt << RT_SHIFT | offset)
        }
        Format::J => {
            let target = f.jump_target(op(0))?;
            f.extra(ops, 1);
            Some(target)
        }
        Format::Syscall => Some(0),
    };
    if let Some(bits) = fields {
        words.push(Word::instr(desc.bits | bits));
    }
    Ok(Encoded {
        words,
        warnings: f.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn enc(src: &str, addr: u32, symbols: &SymbolTable) -> Encoded {
        encode_line(&tokenize(1, src), addr, symbols).unwrap()
    }

    fn one(src: &str) -> u32 {
        let e = enc(src, 0, &SymbolTable::new());
        assert!(e.warnings.is_empty(), "{:?}", e.warnings);
        assert_eq!(e.words.len(), 1);
        e.words[0].value
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-8"), Some(-8));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("--1"), None);
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("12ab"), None);
    }

    #[test]
    fn encodes_each_format() {
        assert_eq!(one("add $t2, $t0, $t1"), 0x0109_5020);
        assert_eq!(one("sll $t0, $t1, 4"), 0x0009_4100);
        assert_eq!(one("jr $ra"), 0x03E0_0008);
        assert_eq!(one("addi $t0, $zero, -1"), 0x2008_FFFF);
        assert_eq!(one("lui $at, 0x1001"), 0x3C01_1001);
        assert_eq!(one("lw $t0, 4($t1)"), 0x8D28_0004);
        assert_eq!(one("sw $t0, -4 ($sp)"), 0xAFA8_FFFC);
        assert_eq!(one("syscall"), 0x0000_000C);
        assert_eq!(one("sll $zero, $zero, 0"), 0);
    }

    #[test]
    fn symbols_in_branches_jumps_and_immediates() {
        let mut t = SymbolTable::new();
        t.insert("LOOP", 0x10, 1).unwrap();
        t.insert("FAR", 0x100, 1).unwrap();
        assert_eq!(enc("beq $zero, $zero, LOOP", 0x10, &t).words[0].value, 0x1000_FFFF);
        assert_eq!(enc("bne $t0, $t1, FAR", 0x10, &t).words[0].value & 0xFFFF, 0x3B);
        assert_eq!(enc("j FAR", 0, &t).words[0].value, 0x0800_0040);
        assert_eq!(enc("jal 0x100", 0, &t).words[0].value, 0x0C00_0040);
        assert_eq!(enc("ori $t0, $zero, FAR", 0, &t).words[0].value, 0x3408_0100);
        assert_eq!(enc("lw $t0, FAR($zero)", 0, &t).words[0].value, 0x8C08_0100);
    }

    #[test]
    fn unresolved_target_is_fatal() {
        let err = encode_line(&tokenize(7, "j nowhere"), 0, &SymbolTable::new()).unwrap_err();
        assert_eq!(
            err,
            AsmError::UnresolvedSymbol {
                line: 7,
                name: "nowhere".into()
            }
        );
    }

    #[test]
    fn recoverable_problems_become_warnings() {
        let e = enc("add $t0, $bogus, $t1", 0, &SymbolTable::new());
        assert_eq!(e.words.len(), 1);
        assert!(matches!(e.warnings[..], [AsmError::Syntax { line: 1, .. }]));

        let e = enc("addi $t0, $zero, 70000", 0, &SymbolTable::new());
        assert_eq!(e.words[0].value & 0xFFFF, 70000 & 0xFFFF);
        assert!(matches!(e.warnings[..], [AsmError::MalformedImmediate { bits: 16, .. }]));

        let e = enc("mul $t0, $t1, $t2", 0, &SymbolTable::new());
        assert!(e.words.is_empty());
        assert!(matches!(e.warnings[..], [AsmError::UnknownMnemonic { .. }]));

        let e = enc("j $ra", 0, &SymbolTable::new());
        assert!(matches!(e.warnings[..], [AsmError::Syntax { .. }]));
    }

    #[test]
    fn sign_extended_immediates_stop_at_i16() {
        let t = SymbolTable::new();
        for src in [
            "addi $t0, $zero, 40000",
            "addiu $t0, $zero, 32768",
            "slti $t2, $zero, 40000",
            "sltiu $t2, $zero, -32769",
            "lw $t1, 40000($zero)",
            "sw $t1, 0x8000($sp)",
        ] {
            let e = enc(src, 0, &t);
            assert_eq!(e.words.len(), 1, "{src}");
            assert!(
                matches!(e.warnings[..], [AsmError::MalformedImmediate { bits: 16, .. }]),
                "{src}: {:?}",
                e.warnings
            );
        }
        assert_eq!(one("addi $t0, $zero, 32767"), 0x2008_7FFF);
        assert_eq!(one("lw $t0, -32768($zero)"), 0x8C08_8000);
    }

    #[test]
    fn zero_extended_immediates_take_u16() {
        assert_eq!(one("ori $t0, $zero, 0xFFFF"), 0x3408_FFFF);
        assert_eq!(one("ori $t0, $zero, 40000"), 0x3408_9C40);
        assert_eq!(one("lui $t0, 65535"), 0x3C08_FFFF);
        for src in ["ori $t0, $zero, -1", "lui $t0, 0x10000"] {
            let e = enc(src, 0, &SymbolTable::new());
            assert!(
                matches!(e.warnings[..], [AsmError::MalformedImmediate { bits: 16, .. }]),
                "{src}: {:?}",
                e.warnings
            );
        }
    }

    #[test]
    fn data_directives() {
        let t = SymbolTable::new();
        let w = enc(".word 1, -1, 0xFFFFFFFF", 0, &t).words;
        assert_eq!(w, vec![Word::data(1), Word::data(u32::MAX), Word::data(u32::MAX)]);
        let b = enc(".byte 1, 2, 3, 4, 0xFF", 0, &t).words;
        assert_eq!(b, vec![Word::data(0x0403_0201), Word::data(0xFF)]);
    }
}
