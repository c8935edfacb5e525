use mips_rs::asm::symbols;
use mips_rs::decoder::{Decoder, Op};
use mips_rs::isa::mips32::Mips32Decoder;
use mips_rs::{assemble, AsmConfig, AsmError, Assembler, Word};
use pretty_assertions::assert_eq;

fn words(src: &str) -> Vec<u32> {
    assemble(src).unwrap().words.iter().map(|w| w.value).collect()
}

#[test]
fn self_loop_branch_encodes_minus_one() {
    let w = words("LOOP: beq $zero, $zero, LOOP");
    assert_eq!(w[0] & 0xFFFF, 0xFFFF);
    assert_eq!(w[0] >> 26, 0x04);
}

#[test]
fn branch_and_jump_fields_point_at_labels() {
    let src = "\
start:  addi $t0, $zero, 3
loop:   addi $t0, $t0, -1
        bne  $t0, $zero, loop
        beq  $zero, $zero, out
        sll  $zero, $zero, 0
out:    jal  start
        j    out
";
    let p = assemble(src).unwrap();
    let w: Vec<u32> = p.words.iter().map(|w| w.value).collect();
    // bne at 0x8 back to 0x4: (4 - 12) / 4 = -2
    assert_eq!(w[2] & 0xFFFF, 0xFFFE);
    // beq at 0xC forward to 0x14: (0x14 - 0x10) / 4 = 1
    assert_eq!(w[3] & 0xFFFF, 1);
    // word 0 is still emitted
    assert_eq!(p.words[4], Word::instr(0));
    assert_eq!(w[5], 0x0C00_0000);
    assert_eq!(w[6] & 0x03FF_FFFF, 0x14 >> 2);
}

#[test]
fn r_type_fields_round_trip_through_the_decoder() {
    let dec = Mips32Decoder::new();
    for (src, op) in [
        ("add $s0, $a1, $t9", Op::Add),
        ("addu $s0, $a1, $t9", Op::Addu),
        ("sub $s0, $a1, $t9", Op::Sub),
        ("and $s0, $a1, $t9", Op::And),
        ("or $s0, $a1, $t9", Op::Or),
        ("slt $s0, $a1, $t9", Op::Slt),
        ("sltu $s0, $a1, $t9", Op::Sltu),
    ] {
        let d = dec.decode(words(src)[0]).unwrap();
        assert_eq!(d.op, op, "{src}");
        assert_eq!((d.rd, d.rs, d.rt), (16, 5, 25), "{src}");
    }
}

#[test]
fn labels_resolve_from_a_nonzero_base() {
    let asm = Assembler::new(AsmConfig {
        base_pc: 0x0040_0000,
        ..AsmConfig::default()
    });
    let p = asm
        .assemble(&["main: j end", "      .word main, end", "end:  syscall"])
        .unwrap();
    assert_eq!(p.symbols.get("end"), Some(0x0040_000C));
    assert_eq!(p.words[0].value & 0x03FF_FFFF, 0x0040_000C >> 2);
    assert_eq!(p.words[1], Word::data(0x0040_0000));
    assert_eq!(p.words[2], Word::data(0x0040_000C));
    assert_eq!(p.end(), 0x0040_0010);
}

#[test]
fn symbol_pass_is_idempotent() {
    let src = ["a: .byte 1 2 3 4 5", "b: .word 9", "c:", "d: syscall"];
    let first = symbols::build(&src, 0x100);
    let second = symbols::build(&src, 0x100);
    assert_eq!(first, second);
    assert_eq!(first.0.get("c"), Some(0x10C));
    assert_eq!(first.0.get("d"), Some(0x10C));
}

#[test]
fn unresolved_symbol_aborts_with_line_number() {
    let err = assemble("addi $t0, $zero, 1\nbeq $t0, $zero, missing").unwrap_err();
    assert_eq!(
        err,
        AsmError::UnresolvedSymbol {
            line: 2,
            name: "missing".into()
        }
    );
    assert_eq!(err.line(), Some(2));
    assert!(err.is_fatal());
}

#[test]
fn permissive_mode_collects_warnings() {
    let p = assemble("add $t0, $nope, $t1\nmul $t0, $t1, $t2\naddi $t0, $zero, 0x12345").unwrap();
    assert_eq!(p.words.len(), 2);
    let lines: Vec<Option<usize>> = p.warnings.iter().map(AsmError::line).collect();
    assert_eq!(lines, vec![Some(1), Some(2), Some(3)]);
    assert!(matches!(p.warnings[1], AsmError::UnknownMnemonic { .. }));
    assert!(matches!(p.warnings[2], AsmError::MalformedImmediate { .. }));
}

#[test]
fn strict_mode_fails_on_first_warning() {
    let asm = Assembler::new(AsmConfig {
        strict: true,
        ..AsmConfig::default()
    });
    let err = asm
        .assemble(&["addi $t0, $zero, 1", "frob $t0", "add $t0, $x, $y"])
        .unwrap_err();
    assert_eq!(
        err,
        AsmError::UnknownMnemonic {
            line: 2,
            mnemonic: "frob".into()
        }
    );

    let err = asm.assemble(&["x: syscall", "x: syscall"]).unwrap_err();
    assert!(matches!(err, AsmError::DuplicateSymbol { line: 2, first: 1, .. }));
}

#[test]
fn program_size_is_bounded() {
    let asm = Assembler::new(AsmConfig {
        max_words: 2,
        ..AsmConfig::default()
    });
    assert!(asm.assemble(&[".word 1, 2"]).is_ok());
    assert_eq!(
        asm.assemble(&["syscall", ".word 1, 2"]).unwrap_err(),
        AsmError::ProgramTooLarge { limit: 2 }
    );
}

#[test]
fn listing_tracks_source_lines() {
    let p = assemble("# header\n\nmain: addi $t0, $zero, 1\n  .word 1, 2\n  syscall").unwrap();
    let got: Vec<(usize, u32, usize)> = p
        .listing
        .iter()
        .map(|l| (l.line, l.addr, l.words))
        .collect();
    assert_eq!(got, vec![(3, 0, 1), (4, 4, 2), (5, 12, 1)]);
    assert_eq!(p.source_at(8).map(|l| l.line), Some(4));
    assert_eq!(p.source_at(16), None);
}
