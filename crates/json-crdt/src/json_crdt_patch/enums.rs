//! Enumerations for the JSON CRDT Patch protocol.

use crate::json_crdt_patch::patch::PatchError;

/// Reserved session IDs.
#[allow(non_snake_case)]
pub mod SESSION {
    /// Reserved by the protocol, owns the literal constants.
    pub const SYSTEM: u64 = 0;
    /// The only valid session ID when running in server-clock mode.
    pub const SERVER: u64 = 1;
    /// Smallest session ID a randomly generated session may take.
    pub const MIN_USER: u64 = 65_536;
    /// Maximum allowed session ID (53-bit safe integer).
    pub const MAX: u64 = 9007199254740991;
}

/// Reserved system-session times. Each one names a literal constant node
/// that exists in every model.
#[allow(non_snake_case)]
pub mod SYSTEM_SESSION_TIME {
    pub const ORIGIN: u64 = 0;
    pub const NULL: u64 = 1;
    pub const TRUE: u64 = 2;
    pub const FALSE: u64 = 3;
    pub const UNDEFINED: u64 = 4;
}

/// 3-bit node-type discriminant, as written by codecs.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonCrdtDataType {
    Con = 0b000,
    Val = 0b001,
    Obj = 0b010,
    Str = 0b100,
    Bin = 0b101,
    Arr = 0b110,
}

impl TryFrom<u8> for JsonCrdtDataType {
    type Error = PatchError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0b000 => Ok(Self::Con),
            0b001 => Ok(Self::Val),
            0b010 => Ok(Self::Obj),
            0b100 => Ok(Self::Str),
            0b101 => Ok(Self::Bin),
            0b110 => Ok(Self::Arr),
            _ => Err(PatchError::UnknownNode(v)),
        }
    }
}

/// 5-bit operation opcode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonCrdtPatchOpcode {
    NewCon = JsonCrdtDataType::Con as u8,              // 0
    NewVal = JsonCrdtDataType::Val as u8,              // 1
    NewObj = JsonCrdtDataType::Obj as u8,              // 2
    NewStr = JsonCrdtDataType::Str as u8,              // 4
    NewBin = JsonCrdtDataType::Bin as u8,              // 5
    NewArr = JsonCrdtDataType::Arr as u8,              // 6
    SetRoot = 0b00111,                                 // 7
    SetVal = 0b01000 | JsonCrdtDataType::Val as u8,    // 9
    InsObj = 0b01000 | JsonCrdtDataType::Obj as u8,    // 10
    InsStr = 0b01000 | JsonCrdtDataType::Str as u8,    // 12
    InsBin = 0b01000 | JsonCrdtDataType::Bin as u8,    // 13
    InsArr = 0b01000 | JsonCrdtDataType::Arr as u8,    // 14
    Del = 0b10000,                                     // 16
    Nop = 0b10001,                                     // 17
}

impl TryFrom<u8> for JsonCrdtPatchOpcode {
    type Error = PatchError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::NewCon),
            1 => Ok(Self::NewVal),
            2 => Ok(Self::NewObj),
            4 => Ok(Self::NewStr),
            5 => Ok(Self::NewBin),
            6 => Ok(Self::NewArr),
            7 => Ok(Self::SetRoot),
            9 => Ok(Self::SetVal),
            10 => Ok(Self::InsObj),
            12 => Ok(Self::InsStr),
            13 => Ok(Self::InsBin),
            14 => Ok(Self::InsArr),
            16 => Ok(Self::Del),
            17 => Ok(Self::Nop),
            _ => Err(PatchError::UnknownOpcode(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_tags_round_trip() {
        for tag in [0u8, 1, 2, 4, 5, 6] {
            let t = JsonCrdtDataType::try_from(tag).unwrap();
            assert_eq!(t as u8, tag);
        }
    }

    #[test]
    fn unknown_node_tag_is_rejected() {
        assert_eq!(
            JsonCrdtDataType::try_from(0b011),
            Err(PatchError::UnknownNode(3))
        );
        assert_eq!(
            JsonCrdtDataType::try_from(7).unwrap_err().to_string(),
            "UNKNOWN_NODE"
        );
    }

    #[test]
    fn opcodes_decode() {
        assert_eq!(
            JsonCrdtPatchOpcode::try_from(12).unwrap(),
            JsonCrdtPatchOpcode::InsStr
        );
        assert!(matches!(
            JsonCrdtPatchOpcode::try_from(3),
            Err(PatchError::UnknownOpcode(3))
        ));
    }
}
