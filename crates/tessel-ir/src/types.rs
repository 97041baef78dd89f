use core::fmt::Display;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum FloatKind {
    F16,
    BF16,
    F32,
    F64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
}

/// The element type stored in buffers, tensors and memrefs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum ElemType {
    Float(FloatKind),
    Int(IntKind),
    Bool,
}

impl ElemType {
    /// Whether the element is a floating point type.
    pub fn is_float(&self) -> bool {
        matches!(self, ElemType::Float(_))
    }
}

/// A dense tensor type. Tiles are always fully static, only slices of a tile may have extents
/// marked [`TensorType::DYNAMIC`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub shape: Vec<i64>,
    pub elem: ElemType,
}

impl TensorType {
    /// Marker for an extent only known at run time.
    pub const DYNAMIC: i64 = i64::MIN;

    pub fn new(shape: Vec<i64>, elem: ElemType) -> Self {
        Self { shape, elem }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn is_static(&self) -> bool {
        !self.shape.contains(&Self::DYNAMIC)
    }

    /// Number of elements in the tensor, `None` if an extent is dynamic.
    pub fn num_elems(&self) -> Option<i64> {
        self.is_static().then(|| self.shape.iter().product())
    }
}

/// Strided layout of a memref. `None` marks a value only known at run time.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StridedLayout {
    pub offset: Option<i64>,
    pub strides: Vec<Option<i64>>,
}

impl StridedLayout {
    /// A layout where every stride and the offset are dynamic.
    pub fn dynamic(rank: usize) -> Self {
        Self {
            offset: None,
            strides: vec![None; rank],
        }
    }
}

/// A view into a buffer. A `None` layout is the dense row-major layout of a fresh allocation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemRefType {
    pub shape: Vec<Option<i64>>,
    pub elem: ElemType,
    pub layout: Option<StridedLayout>,
}

impl MemRefType {
    /// A dense, identity-layout memref with a static shape.
    pub fn contiguous(shape: &[i64], elem: ElemType) -> Self {
        Self {
            shape: shape.iter().copied().map(Some).collect(),
            elem,
            layout: None,
        }
    }

    /// A memref with an explicit strided layout.
    pub fn strided(shape: Vec<Option<i64>>, elem: ElemType, layout: StridedLayout) -> Self {
        Self {
            shape,
            elem,
            layout: Some(layout),
        }
    }

    /// A memref where shape, strides and offset are all unknown until run time.
    pub fn fully_dynamic(rank: usize, elem: ElemType) -> Self {
        Self::strided(vec![None; rank], elem, StridedLayout::dynamic(rank))
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// The strides of the memref. The identity layout only has known strides when the shape is
    /// fully static.
    pub fn strides(&self) -> Vec<Option<i64>> {
        match &self.layout {
            Some(layout) => layout.strides.clone(),
            None => {
                let mut strides = vec![None; self.rank()];
                let mut acc = Some(1i64);
                for (stride, dim) in strides.iter_mut().zip(&self.shape).rev() {
                    *stride = acc;
                    acc = acc.zip(*dim).map(|(acc, dim)| acc * dim);
                }
                strides
            }
        }
    }

    /// The offset of the memref in its buffer.
    pub fn offset(&self) -> Option<i64> {
        match &self.layout {
            Some(layout) => layout.offset,
            None => Some(0),
        }
    }
}

/// The type of a pointer produced by a `MakeTensorPtr` instruction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointerType {
    /// A tensor of scalar pointers, `tensor<128x64x!ptr<f32>>`.
    Structured(TensorType),
    /// A single pointer to a whole tensor, `!ptr<tensor<128x64xf32>>`.
    Block(TensorType),
}

impl PointerType {
    /// The element type pointed to. Block pointers read it from the pointee tensor, structured
    /// pointers from the pointer element of the outer tensor.
    pub fn element_type(&self) -> ElemType {
        match self {
            PointerType::Structured(tensor) => tensor.elem,
            PointerType::Block(pointee) => pointee.elem,
        }
    }

    /// The nominal shape of the tile addressed by the pointer.
    pub fn tile_shape(&self) -> &[i64] {
        match self {
            PointerType::Structured(tensor) => &tensor.shape,
            PointerType::Block(pointee) => &pointee.shape,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, PointerType::Block(_))
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Type {
    /// Machine sized signed integer used for offsets, sizes and strides.
    Index,
    Scalar(ElemType),
    /// An unranked linear buffer, the `base` of every pointer.
    Buffer(ElemType),
    Tensor(TensorType),
    MemRef(MemRefType),
    Pointer(PointerType),
}

impl Type {
    pub fn bool() -> Self {
        Type::Scalar(ElemType::Bool)
    }

    /// The element type of the type, if it has one.
    pub fn elem_type(&self) -> Option<ElemType> {
        match self {
            Type::Index => None,
            Type::Scalar(elem) | Type::Buffer(elem) => Some(*elem),
            Type::Tensor(tensor) => Some(tensor.elem),
            Type::MemRef(memref) => Some(memref.elem),
            Type::Pointer(ptr) => Some(ptr.element_type()),
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorType> {
        match self {
            Type::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }

    pub fn as_memref(&self) -> Option<&MemRefType> {
        match self {
            Type::MemRef(memref) => Some(memref),
            _ => None,
        }
    }
}

impl From<ElemType> for Type {
    fn from(value: ElemType) -> Self {
        Type::Scalar(value)
    }
}

impl From<TensorType> for Type {
    fn from(value: TensorType) -> Self {
        Type::Tensor(value)
    }
}

impl From<MemRefType> for Type {
    fn from(value: MemRefType) -> Self {
        Type::MemRef(value)
    }
}

impl From<PointerType> for Type {
    fn from(value: PointerType) -> Self {
        Type::Pointer(value)
    }
}

impl Display for FloatKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FloatKind::F16 => f.write_str("f16"),
            FloatKind::BF16 => f.write_str("bf16"),
            FloatKind::F32 => f.write_str("f32"),
            FloatKind::F64 => f.write_str("f64"),
        }
    }
}

impl Display for IntKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IntKind::I8 => f.write_str("i8"),
            IntKind::I16 => f.write_str("i16"),
            IntKind::I32 => f.write_str("i32"),
            IntKind::I64 => f.write_str("i64"),
        }
    }
}

impl Display for ElemType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ElemType::Float(kind) => write!(f, "{kind}"),
            ElemType::Int(kind) => write!(f, "{kind}"),
            ElemType::Bool => f.write_str("i1"),
        }
    }
}

fn fmt_dim(dim: Option<i64>) -> String {
    dim.map(|it| it.to_string()).unwrap_or_else(|| "?".into())
}

impl Display for TensorType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("tensor<")?;
        for dim in &self.shape {
            let dim = (*dim != Self::DYNAMIC).then_some(*dim);
            write!(f, "{}x", fmt_dim(dim))?;
        }
        write!(f, "{}>", self.elem)
    }
}

impl Display for StridedLayout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let strides = self
            .strides
            .iter()
            .map(|it| fmt_dim(*it))
            .collect::<Vec<_>>();
        write!(
            f,
            "strided<[{}], offset: {}>",
            strides.join(", "),
            fmt_dim(self.offset)
        )
    }
}

impl Display for MemRefType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("memref<")?;
        for dim in &self.shape {
            write!(f, "{}x", fmt_dim(*dim))?;
        }
        write!(f, "{}", self.elem)?;
        if let Some(layout) = &self.layout {
            write!(f, ", {layout}")?;
        }
        f.write_str(">")
    }
}

impl Display for PointerType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PointerType::Structured(tensor) => {
                f.write_str("tensor<")?;
                for dim in &tensor.shape {
                    write!(f, "{dim}x")?;
                }
                write!(f, "!ptr<{}>>", tensor.elem)
            }
            PointerType::Block(pointee) => write!(f, "!ptr<{pointee}>"),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Type::Index => f.write_str("index"),
            Type::Scalar(elem) => write!(f, "{elem}"),
            Type::Buffer(elem) => write!(f, "memref<*x{elem}>"),
            Type::Tensor(tensor) => write!(f, "{tensor}"),
            Type::MemRef(memref) => write!(f, "{memref}"),
            Type::Pointer(ptr) => write!(f, "{ptr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memref_prints_dynamic_markers() {
        let ty = MemRefType::strided(
            vec![Some(2), None],
            ElemType::Float(FloatKind::F32),
            StridedLayout {
                offset: None,
                strides: vec![None, Some(1)],
            },
        );
        assert_eq!(
            ty.to_string(),
            "memref<2x?xf32, strided<[?, 1], offset: ?>>"
        );
    }

    #[test]
    fn pointer_types_read_pointee_per_kind() {
        let tile = TensorType::new(vec![128, 64], ElemType::Float(FloatKind::BF16));
        let structured = PointerType::Structured(tile.clone());
        let block = PointerType::Block(tile);

        assert_eq!(structured.to_string(), "tensor<128x64x!ptr<bf16>>");
        assert_eq!(block.to_string(), "!ptr<tensor<128x64xbf16>>");
        assert_eq!(structured.tile_shape(), block.tile_shape());
        assert_eq!(structured.element_type(), block.element_type());
    }

    #[test]
    fn identity_layout_is_row_major() {
        let ty = MemRefType::contiguous(&[3, 4, 5], ElemType::Int(IntKind::I32));
        assert_eq!(ty.strides(), vec![Some(20), Some(5), Some(1)]);
        assert_eq!(ty.offset(), Some(0));

        let dynamic = MemRefType::fully_dynamic(2, ElemType::Int(IntKind::I32));
        assert_eq!(dynamic.strides(), vec![None, None]);
        assert_eq!(dynamic.offset(), None);
    }

    #[test]
    fn dynamic_tensor_extents_print_as_markers() {
        let slice = TensorType::new(
            vec![TensorType::DYNAMIC, 8],
            ElemType::Float(FloatKind::F16),
        );
        assert_eq!(slice.to_string(), "tensor<?x8xf16>");
        assert_eq!(slice.num_elems(), None);
    }
}
