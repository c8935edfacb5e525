use serde::{Deserialize, Serialize};

/// One assembled slot of the unified instruction/data memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub value: u32,
    pub is_data: bool,
}

impl Word {
    pub fn instr(value: u32) -> Self {
        Self {
            value,
            is_data: false,
        }
    }

    pub fn data(value: u32) -> Self {
        Self {
            value,
            is_data: true,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("address {addr:#010x} outside program memory [{start:#010x}, {end:#010x})")]
    OutOfRange { addr: u32, start: u32, end: u32 },
    #[error("unaligned word access at {addr:#010x}")]
    Unaligned { addr: u32 },
}

pub trait Bus {
    fn fetch(&self, addr: u32) -> Result<Word, BusError>;
    fn read_u32(&self, addr: u32) -> Result<u32, BusError>;
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<(), BusError>;
    /// Whether `addr` falls inside the mapped range (alignment not checked).
    fn contains(&self, addr: u32) -> bool;
}

/// Word-addressed program image mapped at `base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramMemory {
    pub words: Vec<Word>,
    pub base: u32,
}

impl ProgramMemory {
    pub fn new(base: u32, words: Vec<Word>) -> Self {
        Self { words, base }
    }

    /// First address past the mapped range.
    pub fn end(&self) -> u32 {
        self.base
            .wrapping_add((self.words.len() as u32).wrapping_mul(4))
    }

    fn index(&self, addr: u32) -> Result<usize, BusError> {
        let off = addr.wrapping_sub(self.base);
        if addr < self.base || off as usize / 4 >= self.words.len() {
            return Err(BusError::OutOfRange {
                addr,
                start: self.base,
                end: self.end(),
            });
        }
        if off % 4 != 0 {
            return Err(BusError::Unaligned { addr });
        }
        Ok(off as usize / 4)
    }
}

impl Bus for ProgramMemory {
    fn fetch(&self, addr: u32) -> Result<Word, BusError> {
        Ok(self.words[self.index(addr)?])
    }

    fn read_u32(&self, addr: u32) -> Result<u32, BusError> {
        Ok(self.words[self.index(addr)?].value)
    }

    fn write_u32(&mut self, addr: u32, val: u32) -> Result<(), BusError> {
        let i = self.index(addr)?;
        self.words[i] = Word::data(val);
        Ok(())
    }

    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && ((addr - self.base) as usize / 4) < self.words.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem() -> ProgramMemory {
        ProgramMemory::new(0x100, vec![Word::instr(1), Word::instr(2), Word::data(3)])
    }

    #[test]
    fn maps_byte_addresses_to_words() {
        let m = mem();
        assert_eq!(m.end(), 0x10C);
        assert_eq!(m.read_u32(0x104).unwrap(), 2);
        assert!(m.fetch(0x108).unwrap().is_data);
        assert!(m.contains(0x108));
        assert!(!m.contains(0x10C));
        assert!(!m.contains(0xFC));
    }

    #[test]
    fn rejects_out_of_range_and_unaligned() {
        let mut m = mem();
        assert_eq!(
            m.read_u32(0x10C),
            Err(BusError::OutOfRange {
                addr: 0x10C,
                start: 0x100,
                end: 0x10C
            })
        );
        assert!(matches!(m.read_u32(0xFC), Err(BusError::OutOfRange { .. })));
        assert_eq!(m.read_u32(0x102), Err(BusError::Unaligned { addr: 0x102 }));
        assert!(m.write_u32(0x200, 0).is_err());
    }

    #[test]
    fn store_marks_word_as_data() {
        let mut m = mem();
        m.write_u32(0x100, 0xDEAD_BEEF).unwrap();
        assert_eq!(m.fetch(0x100).unwrap(), Word::data(0xDEAD_BEEF));
    }
}
