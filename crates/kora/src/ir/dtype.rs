use std::fmt;

/// Scalar element types carried by operands and tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum DType {
    Bool,
    Ui8,
    Si8,
    Si32,
    Si64,
    F32,
}

impl DType {
    /// Storage size of a single element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::Bool | DType::Ui8 | DType::Si8 => 1,
            DType::Si32 | DType::F32 => 4,
            DType::Si64 => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, DType::Ui8 | DType::Si8 | DType::Si32 | DType::Si64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::Ui8 => "ui8",
            DType::Si8 => "si8",
            DType::Si32 => "si32",
            DType::Si64 => "si64",
            DType::F32 => "f32",
        };
        write!(f, "{name}")
    }
}
