//! Descriptor tables emitted by `#[desc_gen]` and the C renderers that
//! consume them.

use std::io::{Result, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderType {
    C,
}

pub trait GenHeader {
    const NAME: &'static str;

    fn gen_c_header<W: Write>(out: &mut W) -> Result<()>;

    fn gen_header<W: Write>(header_type: &HeaderType, out: &mut W) -> Result<()> {
        writeln!(out)?;
        match header_type {
            HeaderType::C => Self::gen_c_header(out)?,
        }
        writeln!(out)
    }
}

/// Bit range `msb..=lsb` of a packed word group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescField {
    pub name: &'static str,
    pub lsb: usize,
    pub msb: usize,
}

impl DescField {
    pub const fn width(&self) -> usize {
        self.msb - self.lsb + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructField {
    pub name: &'static str,
    /// Rust type name, mapped to `<stdint.h>` names for the integer types.
    pub ty: &'static str,
    pub len: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: &'static str,
    pub value: usize,
}

pub fn c_word_type(bits: usize) -> &'static str {
    match bits {
        8 => "uint8_t",
        16 => "uint16_t",
        32 => "uint32_t",
        _ => "uint64_t",
    }
}

fn c_type(ty: &'static str) -> &'static str {
    match ty {
        "u8" => "uint8_t",
        "u16" => "uint16_t",
        "u32" => "uint32_t",
        "u64" => "uint64_t",
        other => other,
    }
}

/// Packed struct of `words` words, `word_bits` wide. Holes become anonymous
/// members that never straddle a word; `fields` must be in ascending order.
pub fn render_c_bitfield<W: Write>(
    out: &mut W,
    name: &str,
    word_bits: usize,
    words: usize,
    fields: &[DescField],
) -> Result<()> {
    let word_ty = c_word_type(word_bits);
    let hole = |out: &mut W, from: usize, to: usize| -> Result<usize> {
        let mut at = from;
        while at < to {
            let n = (to - at).min(word_bits - at % word_bits);
            writeln!(out, "    {} :{};", word_ty, n)?;
            at += n;
        }
        Ok(at)
    };

    writeln!(out, "typedef struct {{")?;
    let mut at = 0;
    for f in fields {
        hole(out, at, f.lsb)?;
        if f.width() == word_bits {
            writeln!(out, "    {} {};", word_ty, f.name)?;
        } else {
            writeln!(out, "    {} {}: {};", word_ty, f.name, f.width())?;
        }
        at = f.msb + 1;
    }
    at = hole(out, at, at.next_multiple_of(word_bits))?;
    let used = at / word_bits;
    if used < words {
        writeln!(out, "    {} padding[{}];", word_ty, words - used)?;
    }
    writeln!(out, "}} __attribute__((packed)) {};", name)
}

/// Plain struct, byte padded up to `padding_to` when `size` falls short.
pub fn render_c_struct<W: Write>(
    out: &mut W,
    name: &str,
    fields: &[StructField],
    size: usize,
    padding_to: Option<usize>,
) -> Result<()> {
    writeln!(out, "typedef struct {{")?;
    for f in fields {
        match f.len {
            Some(len) => writeln!(out, "    {} {}[{}];", c_type(f.ty), f.name, len)?,
            None => writeln!(out, "    {} {};", c_type(f.ty), f.name)?,
        }
    }
    if let Some(to) = padding_to.filter(|to| *to > size) {
        writeln!(out, "    uint8_t padding[{}];", to - size)?;
    }
    writeln!(out, "}} {};", name)
}

/// Enum constants are prefixed with the type name.
pub fn render_c_enum<W: Write>(out: &mut W, name: &str, variants: &[EnumVariant]) -> Result<()> {
    writeln!(out, "typedef enum {{")?;
    for v in variants {
        writeln!(out, "    {}_{} = {},", name, v.name, v.value)?;
    }
    writeln!(out, "}} {};", name)
}
