use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::ir::{DType, OperationIndex};
use crate::util::index_map::EntityIndex;

/// Stable identifier of an operand within a model graph.
///
/// The same index refers to the same operand across the whole graph and
/// every per-backend slice of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperandIndex(pub u32);

impl fmt::Display for OperandIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl EntityIndex for OperandIndex {
    fn from_raw(raw: u32) -> Self {
        OperandIndex(raw)
    }

    fn raw(self) -> u32 {
        self.0
    }
}

/// Logical tensor shape as an ordered list of static extents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn dim(&self, axis: usize) -> usize {
        self.dims[axis]
    }

    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, "x")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}

/// Type, shape and allocation attributes of an operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandInfo {
    pub dtype: DType,
    pub shape: Shape,
    /// Variables keep their buffer across runs and are never deallocated.
    pub is_variable: bool,
    /// Dynamic operands get their buffer allocated at run time and released
    /// after their final use.
    pub is_dynamic: bool,
}

impl OperandInfo {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self {
            dtype,
            shape,
            is_variable: false,
            is_dynamic: false,
        }
    }

    pub fn variable(mut self) -> Self {
        self.is_variable = true;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    /// Total byte length of a densely packed tensor of this info.
    pub fn byte_len(&self) -> usize {
        self.shape.num_elements() * self.dtype.size_in_bytes()
    }
}

/// A typed, shaped tensor descriptor with def/use links into the graph.
#[derive(Clone)]
pub struct Operand {
    info: OperandInfo,
    data: Option<Arc<[u8]>>,
    def: Option<OperationIndex>,
    uses: SmallVec<[OperationIndex; 4]>,
}

impl Operand {
    pub fn new(info: OperandInfo) -> Self {
        Self {
            info,
            data: None,
            def: None,
            uses: SmallVec::new(),
        }
    }

    /// Attaches a constant payload; the byte length must match the info.
    pub fn with_data(mut self, data: Arc<[u8]>) -> Self {
        debug_assert_eq!(data.len(), self.info.byte_len());
        self.data = Some(data);
        self
    }

    pub fn info(&self) -> &OperandInfo {
        &self.info
    }

    pub fn data(&self) -> Option<&Arc<[u8]>> {
        self.data.as_ref()
    }

    pub fn is_constant(&self) -> bool {
        self.data.is_some()
    }

    pub fn def(&self) -> Option<OperationIndex> {
        self.def
    }

    pub fn uses(&self) -> &[OperationIndex] {
        &self.uses
    }

    pub(crate) fn set_def(&mut self, op: OperationIndex) {
        debug_assert!(self.def.is_none());
        self.def = Some(op);
    }

    pub(crate) fn insert_use(&mut self, op: OperationIndex) {
        if !self.uses.contains(&op) {
            self.uses.push(op);
        }
    }

    /// Drops def/use links, e.g. when copying into a partial graph where the
    /// links are rebuilt from the operations that land there.
    pub(crate) fn clear_def_use(&mut self) {
        self.def = None;
        self.uses.clear();
    }
}
