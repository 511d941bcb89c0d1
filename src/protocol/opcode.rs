//! Binary protocol opcodes

/// Command opcodes of the memcached binary protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Get = 0x00,
    Set = 0x01,
    Add = 0x02,
    Replace = 0x03,
    Delete = 0x04,
    Increment = 0x05,
    Decrement = 0x06,
    Quit = 0x07,
    Flush = 0x08,
    GetQ = 0x09,
    NoOp = 0x0A,
    Version = 0x0B,
    GetK = 0x0C,
    GetKQ = 0x0D,
    Append = 0x0E,
    Prepend = 0x0F,
    Stat = 0x10,
    SetQ = 0x11,
    AddQ = 0x12,
    ReplaceQ = 0x13,
    DeleteQ = 0x14,
    IncrementQ = 0x15,
    DecrementQ = 0x16,
    QuitQ = 0x17,
    FlushQ = 0x18,
    AppendQ = 0x19,
    PrependQ = 0x1A,

    // SASL authentication
    SaslList = 0x20,
    SaslStart = 0x21,
    SaslStep = 0x22,
}

impl OpCode {
    /// Convert a wire byte to an opcode
    pub fn from_u8(value: u8) -> Option<Self> {
        let opcode = match value {
            0x00 => OpCode::Get,
            0x01 => OpCode::Set,
            0x02 => OpCode::Add,
            0x03 => OpCode::Replace,
            0x04 => OpCode::Delete,
            0x05 => OpCode::Increment,
            0x06 => OpCode::Decrement,
            0x07 => OpCode::Quit,
            0x08 => OpCode::Flush,
            0x09 => OpCode::GetQ,
            0x0A => OpCode::NoOp,
            0x0B => OpCode::Version,
            0x0C => OpCode::GetK,
            0x0D => OpCode::GetKQ,
            0x0E => OpCode::Append,
            0x0F => OpCode::Prepend,
            0x10 => OpCode::Stat,
            0x11 => OpCode::SetQ,
            0x12 => OpCode::AddQ,
            0x13 => OpCode::ReplaceQ,
            0x14 => OpCode::DeleteQ,
            0x15 => OpCode::IncrementQ,
            0x16 => OpCode::DecrementQ,
            0x17 => OpCode::QuitQ,
            0x18 => OpCode::FlushQ,
            0x19 => OpCode::AppendQ,
            0x1A => OpCode::PrependQ,
            0x20 => OpCode::SaslList,
            0x21 => OpCode::SaslStart,
            0x22 => OpCode::SaslStep,
            _ => return None,
        };
        Some(opcode)
    }

    /// True for the quiet variants, which stay silent on the uninteresting outcome
    pub fn is_quiet(self) -> bool {
        matches!(
            self,
            OpCode::GetQ
                | OpCode::GetKQ
                | OpCode::SetQ
                | OpCode::AddQ
                | OpCode::ReplaceQ
                | OpCode::DeleteQ
                | OpCode::IncrementQ
                | OpCode::DecrementQ
                | OpCode::QuitQ
                | OpCode::FlushQ
                | OpCode::AppendQ
                | OpCode::PrependQ
        )
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> u8 {
        opcode as u8
    }
}
