use core::cell::RefCell;
use std::rc::Rc;

use derive_new::new;
use smallvec::{SmallVec, smallvec};
use tessel_ir::{ConstantValue, ElemType};

use crate::ExecError;

/// A multi-dimensional index or a list of extents.
pub type Dims = SmallVec<[i64; 4]>;

/// Linear storage shared by every view into it.
pub type Buffer = Rc<RefCell<Vec<ConstantValue>>>;

/// Create a buffer holding `values`.
pub fn buffer(values: Vec<ConstantValue>) -> Buffer {
    Rc::new(RefCell::new(values))
}

/// Visit every index of `shape` in row-major order.
pub fn for_each_index(
    shape: &[i64],
    mut f: impl FnMut(&[i64]) -> Result<(), ExecError>,
) -> Result<(), ExecError> {
    if shape.iter().any(|dim| *dim < 0) {
        return Err(ExecError::InvalidShape {
            shape: shape.to_vec(),
        });
    }
    if shape.contains(&0) {
        return Ok(());
    }

    let mut index: Dims = smallvec![0; shape.len()];
    loop {
        f(&index)?;

        let mut dim = shape.len();
        loop {
            if dim == 0 {
                return Ok(());
            }
            dim -= 1;
            index[dim] += 1;
            if index[dim] < shape[dim] {
                break;
            }
            index[dim] = 0;
        }
    }
}

fn check_rank(shape: &[i64], index: &[i64]) -> Result<(), ExecError> {
    if shape.len() != index.len() {
        return Err(ExecError::ShapeMismatch {
            lhs: shape.to_vec(),
            rhs: index.to_vec(),
        });
    }
    Ok(())
}

/// A strided view into a [`Buffer`]. Element `index` lives at `offset + Σ index[k] * strides[k]`.
#[derive(new, Debug, Clone)]
pub struct MemRef {
    pub buffer: Buffer,
    pub offset: i64,
    pub shape: Dims,
    pub strides: Dims,
}

impl MemRef {
    /// A fresh dense row-major memref of `shape`, filled with the zero of `elem`.
    pub fn alloc(shape: &[i64], elem: ElemType) -> Result<Self, ExecError> {
        if shape.iter().any(|dim| *dim < 0) {
            return Err(ExecError::InvalidShape {
                shape: shape.to_vec(),
            });
        }
        let mut strides: Dims = smallvec![1; shape.len()];
        for dim in (0..shape.len().saturating_sub(1)).rev() {
            strides[dim] = strides[dim + 1] * shape[dim + 1];
        }
        let len = shape.iter().product::<i64>() as usize;

        Ok(Self::new(
            buffer(vec![ConstantValue::zero(elem); len]),
            0,
            shape.into(),
            strides,
        ))
    }

    fn position(&self, index: &[i64]) -> Result<usize, ExecError> {
        check_rank(&self.shape, index)?;
        let mut position = self.offset;
        for ((i, dim), stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            if *i < 0 || i >= dim {
                return Err(ExecError::OutOfBounds {
                    position: *i,
                    len: *dim as usize,
                });
            }
            position += i * stride;
        }

        let len = self.buffer.borrow().len();
        if position < 0 || position as usize >= len {
            return Err(ExecError::OutOfBounds { position, len });
        }
        Ok(position as usize)
    }

    pub fn read(&self, index: &[i64]) -> Result<ConstantValue, ExecError> {
        let position = self.position(index)?;
        Ok(self.buffer.borrow()[position])
    }

    pub fn write(&self, index: &[i64], value: ConstantValue) -> Result<(), ExecError> {
        let position = self.position(index)?;
        self.buffer.borrow_mut()[position] = value;
        Ok(())
    }

    /// The window at `offsets` of size `sizes`, taking every `steps`-th element.
    pub fn subview(
        &self,
        offsets: &[i64],
        sizes: &[i64],
        steps: &[i64],
    ) -> Result<Self, ExecError> {
        check_rank(&self.shape, offsets)?;
        check_rank(&self.shape, sizes)?;
        check_rank(&self.shape, steps)?;

        let mut offset = self.offset;
        for (k, dim) in self.shape.iter().enumerate() {
            let (start, size, step) = (offsets[k], sizes[k], steps[k]);
            if size < 0 || step < 1 {
                return Err(ExecError::InvalidShape {
                    shape: sizes.to_vec(),
                });
            }
            let last = start + (size - 1).max(0) * step;
            if size > 0 && (start < 0 || last >= *dim) {
                return Err(ExecError::OutOfBounds {
                    position: last,
                    len: *dim as usize,
                });
            }
            offset += start * self.strides[k];
        }

        Ok(Self::new(
            self.buffer.clone(),
            offset,
            sizes.into(),
            self.strides
                .iter()
                .zip(steps)
                .map(|(stride, step)| stride * step)
                .collect(),
        ))
    }

    /// Read the whole view, row-major.
    pub fn to_vec(&self) -> Result<Vec<ConstantValue>, ExecError> {
        let mut values = Vec::new();
        for_each_index(&self.shape, |index| {
            values.push(self.read(index)?);
            Ok(())
        })?;
        Ok(values)
    }
}

/// A dense row-major tensor value.
#[derive(new, Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<i64>,
    pub data: Vec<ConstantValue>,
}

impl Tensor {
    pub fn get(&self, index: &[i64]) -> Result<ConstantValue, ExecError> {
        check_rank(&self.shape, index)?;
        let mut position = 0;
        for (i, dim) in index.iter().zip(&self.shape) {
            if *i < 0 || i >= dim {
                return Err(ExecError::OutOfBounds {
                    position: *i,
                    len: *dim as usize,
                });
            }
            position = position * dim + i;
        }
        self.data
            .get(position as usize)
            .copied()
            .ok_or(ExecError::OutOfBounds {
                position,
                len: self.data.len(),
            })
    }

    /// The window at `offsets` of size `sizes`.
    pub fn slice(&self, offsets: &[i64], sizes: &[i64]) -> Result<Self, ExecError> {
        check_rank(&self.shape, offsets)?;
        let mut data = Vec::new();
        let mut source: Dims = smallvec![0; sizes.len()];
        for_each_index(sizes, |index| {
            for (k, i) in index.iter().enumerate() {
                source[k] = offsets[k] + i;
            }
            data.push(self.get(&source)?);
            Ok(())
        })?;
        Ok(Self::new(sizes.to_vec(), data))
    }
}
