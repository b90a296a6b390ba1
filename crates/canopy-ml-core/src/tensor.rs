use crate::dtype::Float;
use crate::error::{TensorError, TensorResult};
use crate::shape::Shape;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops;

/// N-dimensional tensor — the numeric backbone of CanopyML.
///
/// Stores data in a flat contiguous `Vec<T>` with row-major (C-order) layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Tensor<T: Float> {
    data: Vec<T>,
    shape: Shape,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Tensor<T> {
    /// Create a tensor from raw data and shape.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> TensorResult<Self> {
        let s = Shape::new(shape);
        if data.len() != s.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: s.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape: s })
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![T::ZERO; s.numel()],
            shape: s,
        }
    }

    /// Create a 1-D tensor from a slice.
    pub fn from_slice(data: &[T]) -> Self {
        Tensor {
            data: data.to_vec(),
            shape: Shape::new(vec![data.len()]),
        }
    }

    /// Create a 2-D tensor from a nested slice.
    pub fn from_vec2d(data: &[Vec<T>]) -> TensorResult<Self> {
        if data.is_empty() {
            return Ok(Tensor::zeros(vec![0, 0]));
        }
        let rows = data.len();
        let cols = data[0].len();
        for row in data {
            if row.len() != cols {
                return Err(TensorError::InvalidOperation(
                    "All rows must have the same number of columns".to_string(),
                ));
            }
        }
        let flat: Vec<T> = data.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::new(flat, vec![rows, cols])
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_vec(&self) -> Vec<usize> {
        self.shape.to_vec()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Multi-dimensional indexing: compute flat offset from indices.
    pub fn get(&self, indices: &[usize]) -> TensorResult<T> {
        let strides = self.shape.strides();
        if indices.len() != self.ndim() {
            return Err(TensorError::DimensionMismatch(format!(
                "Expected {} indices, got {}",
                self.ndim(),
                indices.len()
            )));
        }
        let mut offset = 0;
        for (i, &idx) in indices.iter().enumerate() {
            let dim_size = self.shape.dim(i)?;
            if idx >= dim_size {
                return Err(TensorError::IndexOutOfBounds {
                    index: idx,
                    axis: i,
                    size: dim_size,
                });
            }
            offset += idx * strides[i];
        }
        Ok(self.data[offset])
    }

    /// Reshape the tensor (data remains the same, only shape changes).
    pub fn reshape(&self, new_shape: Vec<usize>) -> TensorResult<Tensor<T>> {
        let ns = Shape::new(new_shape);
        if self.numel() != ns.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: ns.to_vec(),
                got: self.shape_vec(),
            });
        }
        Ok(Tensor {
            data: self.data.clone(),
            shape: ns,
        })
    }

    // ─── Element-wise Unary Operations ──────────────────────────────────────

    pub fn apply<F: Fn(T) -> T>(&self, f: F) -> Tensor<T> {
        Tensor {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
        }
    }

    pub fn abs(&self) -> Tensor<T> { self.apply(T::abs) }
    pub fn exp(&self) -> Tensor<T> { self.apply(T::exp) }
    pub fn ln(&self) -> Tensor<T> { self.apply(T::ln) }

    /// Clamp values to [min, max].
    pub fn clamp(&self, min: T, max: T) -> Tensor<T> {
        self.apply(|x| x.max(min).min(max))
    }

    /// Sigmoid: 1 / (1 + exp(-x)).
    pub fn sigmoid(&self) -> Tensor<T> {
        self.apply(|x| T::ONE / (T::ONE + (-x).exp()))
    }

    // ─── Scalar Operations ──────────────────────────────────────────────────

    pub fn add_scalar(&self, s: T) -> Tensor<T> { self.apply(|x| x + s) }
    pub fn sub_scalar(&self, s: T) -> Tensor<T> { self.apply(|x| x - s) }
    pub fn mul_scalar(&self, s: T) -> Tensor<T> { self.apply(|x| x * s) }
    pub fn div_scalar(&self, s: T) -> Tensor<T> { self.apply(|x| x / s) }

    // ─── Element-wise Binary Operations (with broadcasting) ─────────────────

    fn broadcast_binary_op<F: Fn(T, T) -> T>(
        &self,
        other: &Tensor<T>,
        op: F,
    ) -> TensorResult<Tensor<T>> {
        // Fast path: same shape
        if self.shape == other.shape {
            let data: Vec<T> = self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| op(a, b))
                .collect();
            return Ok(Tensor {
                data,
                shape: self.shape.clone(),
            });
        }

        let out_shape = Shape::broadcast_shape(&self.shape, &other.shape)?;
        let out_numel = out_shape.numel();
        let out_strides = out_shape.strides();
        let a_strides = self.shape.strides();
        let b_strides = other.shape.strides();
        let a_dims = self.shape.dims();
        let b_dims = other.shape.dims();
        let out_dims = out_shape.dims();
        let ndim = out_dims.len();

        let mut data = Vec::with_capacity(out_numel);

        for flat_idx in 0..out_numel {
            // Convert flat index to multi-dim index
            let mut remaining = flat_idx;
            let mut a_offset = 0usize;
            let mut b_offset = 0usize;

            for d in 0..ndim {
                let idx = remaining / out_strides[d];
                remaining %= out_strides[d];

                let a_dim_offset = ndim as isize - a_dims.len() as isize;
                let a_d = d as isize - a_dim_offset;
                if a_d >= 0 {
                    let a_d = a_d as usize;
                    if a_dims[a_d] > 1 {
                        a_offset += idx * a_strides[a_d];
                    }
                }

                let b_dim_offset = ndim as isize - b_dims.len() as isize;
                let b_d = d as isize - b_dim_offset;
                if b_d >= 0 {
                    let b_d = b_d as usize;
                    if b_dims[b_d] > 1 {
                        b_offset += idx * b_strides[b_d];
                    }
                }
            }

            data.push(op(self.data[a_offset], other.data[b_offset]));
        }

        Ok(Tensor {
            data,
            shape: out_shape,
        })
    }

    pub fn add(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.broadcast_binary_op(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.broadcast_binary_op(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.broadcast_binary_op(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.broadcast_binary_op(other, |a, b| a / b)
    }

    // ─── Reduction Operations ───────────────────────────────────────────────

    /// Sum of all elements.
    pub fn sum_all(&self) -> T {
        self.data.iter().copied().sum()
    }

    /// Mean of all elements.
    pub fn mean_all(&self) -> T {
        self.sum_all() / T::from_usize(self.numel())
    }

    /// Max of all elements.
    pub fn max_all(&self) -> TensorResult<T> {
        self.data
            .iter()
            .copied()
            .reduce(T::max)
            .ok_or(TensorError::EmptyTensor)
    }

    /// Min of all elements.
    pub fn min_all(&self) -> TensorResult<T> {
        self.data
            .iter()
            .copied()
            .reduce(T::min)
            .ok_or(TensorError::EmptyTensor)
    }

    /// Sum along a specific axis, collapsing that dimension.
    pub fn sum_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        let dims = self.shape.dims();
        if axis >= dims.len() {
            return Err(TensorError::InvalidAxis {
                axis,
                ndim: self.ndim(),
            });
        }

        let outer: usize = dims[..axis].iter().product();
        let axis_size = dims[axis];
        let inner: usize = dims[axis + 1..].iter().product();

        let mut new_dims: Vec<usize> = dims.to_vec();
        new_dims.remove(axis);
        if new_dims.is_empty() {
            new_dims.push(1);
        }

        let mut result = vec![T::ZERO; outer * inner];
        for o in 0..outer {
            for a in 0..axis_size {
                for i in 0..inner {
                    let src = o * axis_size * inner + a * inner + i;
                    let dst = o * inner + i;
                    result[dst] = result[dst] + self.data[src];
                }
            }
        }

        Tensor::new(result, new_dims)
    }

    /// Mean along a specific axis.
    pub fn mean_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        let axis_size = self.shape.dim(axis)?;
        let s = self.sum_axis(axis)?;
        Ok(s.div_scalar(T::from_usize(axis_size)))
    }

    /// Argmax along axis — returns tensor of indices.
    pub fn argmax_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        let dims = self.shape.dims();
        if axis >= dims.len() {
            return Err(TensorError::InvalidAxis {
                axis,
                ndim: self.ndim(),
            });
        }

        let outer: usize = dims[..axis].iter().product();
        let axis_size = dims[axis];
        let inner: usize = dims[axis + 1..].iter().product();

        let mut new_dims: Vec<usize> = dims.to_vec();
        new_dims.remove(axis);
        if new_dims.is_empty() {
            new_dims.push(1);
        }

        let mut result = vec![T::ZERO; outer * inner];
        for o in 0..outer {
            for i in 0..inner {
                let mut best_idx = 0usize;
                let mut best_val = self.data[o * axis_size * inner + i];
                for a in 1..axis_size {
                    let v = self.data[o * axis_size * inner + a * inner + i];
                    if v > best_val {
                        best_val = v;
                        best_idx = a;
                    }
                }
                result[o * inner + i] = T::from_usize(best_idx);
            }
        }

        Tensor::new(result, new_dims)
    }

    /// Variance along axis (population variance).
    pub fn var_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        let mean = self.mean_axis(axis)?;
        let dims = self.shape.dims();
        let outer: usize = dims[..axis].iter().product();
        let axis_size = dims[axis];
        let inner: usize = dims[axis + 1..].iter().product();

        let mut result = vec![T::ZERO; outer * inner];
        for o in 0..outer {
            for a in 0..axis_size {
                for i in 0..inner {
                    let src = o * axis_size * inner + a * inner + i;
                    let mu = mean.data[o * inner + i];
                    let diff = self.data[src] - mu;
                    result[o * inner + i] = result[o * inner + i] + diff * diff;
                }
            }
        }
        for v in result.iter_mut() {
            *v = *v / T::from_usize(axis_size);
        }

        let mut new_dims: Vec<usize> = dims.to_vec();
        new_dims.remove(axis);
        if new_dims.is_empty() {
            new_dims.push(1);
        }
        Tensor::new(result, new_dims)
    }

    /// Max along axis, returning tensor with that dimension removed.
    pub fn max_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        let dims = self.shape.dims();
        if axis >= dims.len() {
            return Err(TensorError::InvalidAxis { axis, ndim: self.ndim() });
        }
        let outer: usize = dims[..axis].iter().product();
        let axis_size = dims[axis];
        let inner: usize = dims[axis + 1..].iter().product();
        let mut result = vec![T::NEG_INFINITY; outer * inner];
        for o in 0..outer {
            for a in 0..axis_size {
                for i in 0..inner {
                    let src = o * axis_size * inner + a * inner + i;
                    let dst = o * inner + i;
                    if self.data[src] > result[dst] {
                        result[dst] = self.data[src];
                    }
                }
            }
        }
        let mut new_dims: Vec<usize> = dims.to_vec();
        new_dims.remove(axis);
        if new_dims.is_empty() { new_dims.push(1); }
        Tensor::new(result, new_dims)
    }

    // ─── Softmax ────────────────────────────────────────────────────────────

    /// Softmax along an arbitrary axis.
    pub fn softmax_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        let dims = self.shape.dims();
        if axis >= dims.len() {
            return Err(TensorError::InvalidAxis { axis, ndim: self.ndim() });
        }
        let outer: usize = dims[..axis].iter().product();
        let axis_size = dims[axis];
        let inner: usize = dims[axis + 1..].iter().product();
        let mut data = self.data.clone();

        for o in 0..outer {
            for i in 0..inner {
                // Numerical stability: subtract max
                let mut max_val = T::NEG_INFINITY;
                for a in 0..axis_size {
                    let idx = o * axis_size * inner + a * inner + i;
                    if data[idx] > max_val { max_val = data[idx]; }
                }
                let mut sum = T::ZERO;
                for a in 0..axis_size {
                    let idx = o * axis_size * inner + a * inner + i;
                    data[idx] = (data[idx] - max_val).exp();
                    sum = sum + data[idx];
                }
                for a in 0..axis_size {
                    let idx = o * axis_size * inner + a * inner + i;
                    data[idx] = data[idx] / sum;
                }
            }
        }
        Ok(Tensor { data, shape: self.shape.clone() })
    }
}

// ─── Operator Overloads ─────────────────────────────────────────────────────

impl<T: Float> ops::Neg for &Tensor<T> {
    type Output = Tensor<T>;
    fn neg(self) -> Tensor<T> {
        self.apply(|x| -x)
    }
}

impl<T: Float> ops::Add for &Tensor<T> {
    type Output = TensorResult<Tensor<T>>;
    fn add(self, rhs: Self) -> TensorResult<Tensor<T>> {
        Tensor::add(self, rhs)
    }
}

impl<T: Float> ops::Sub for &Tensor<T> {
    type Output = TensorResult<Tensor<T>>;
    fn sub(self, rhs: Self) -> TensorResult<Tensor<T>> {
        Tensor::sub(self, rhs)
    }
}

impl<T: Float> ops::Mul for &Tensor<T> {
    type Output = TensorResult<Tensor<T>>;
    fn mul(self, rhs: Self) -> TensorResult<Tensor<T>> {
        Tensor::mul(self, rhs)
    }
}

impl<T: Float> PartialEq for Tensor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.data == other.data
    }
}

// ─── Display ────────────────────────────────────────────────────────────────

impl<T: Float> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ndim() == 1 {
            write!(f, "tensor([")?;
            for (i, v) in self.data.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                if i > 6 {
                    write!(f, "...")?;
                    break;
                }
                write!(f, "{:.4}", v)?;
            }
            return write!(f, "])");
        }
        if self.ndim() == 2 {
            let rows = self.shape.dims()[0];
            let cols = self.shape.dims()[1];
            writeln!(f, "tensor([")?;
            for i in 0..rows.min(8) {
                write!(f, "  [")?;
                for j in 0..cols.min(8) {
                    if j > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:.4}", self.data[i * cols + j])?;
                }
                if cols > 8 {
                    write!(f, ", ...")?;
                }
                writeln!(f, "],")?;
            }
            if rows > 8 {
                writeln!(f, "  ...")?;
            }
            return write!(f, "], shape={})", self.shape);
        }
        write!(f, "tensor(shape={}, numel={})", self.shape, self.numel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation() {
        let t: Tensor<f64> = Tensor::zeros(vec![3, 4]);
        assert_eq!(t.shape_vec(), vec![3, 4]);
        assert_eq!(t.numel(), 12);
        assert_eq!(t.data()[0], 0.0);
    }

    #[test]
    fn test_from_vec2d() {
        let t: Tensor<f64> = Tensor::from_vec2d(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
        ])
        .unwrap();
        assert_eq!(t.shape_vec(), vec![2, 3]);
        assert_eq!(t.get(&[1, 2]).unwrap(), 6.0);
    }

    #[test]
    fn test_from_vec2d_ragged() {
        let res: TensorResult<Tensor<f64>> =
            Tensor::from_vec2d(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(res.is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a: Tensor<f64> = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        let b: Tensor<f64> = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], vec![2, 2]).unwrap();
        let c = a.add(&b).unwrap();
        assert_eq!(c.data(), &[6.0, 8.0, 10.0, 12.0]);
        let d = (&a * &b).unwrap();
        assert_eq!(d.data(), &[5.0, 12.0, 21.0, 32.0]);
    }

    #[test]
    fn test_broadcasting() {
        let a: Tensor<f64> = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();
        let b: Tensor<f64> = Tensor::new(vec![10.0, 20.0, 30.0], vec![1, 3]).unwrap();
        let c = a.add(&b).unwrap();
        assert_eq!(c.shape_vec(), vec![2, 3]);
        assert_eq!(c.data(), &[11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);

        let col: Tensor<f64> = Tensor::new(vec![100.0, 200.0], vec![2, 1]).unwrap();
        let d = a.sub(&col).unwrap();
        assert_eq!(d.data(), &[-99.0, -98.0, -97.0, -196.0, -195.0, -194.0]);
    }

    #[test]
    fn test_sum_axis() {
        let a: Tensor<f64> = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();
        let s0 = a.sum_axis(0).unwrap();
        assert_eq!(s0.data(), &[5.0, 7.0, 9.0]);

        let s1 = a.sum_axis(1).unwrap();
        assert_eq!(s1.data(), &[6.0, 15.0]);
    }

    #[test]
    fn test_argmax_axis() {
        let a: Tensor<f64> = Tensor::new(vec![1.0, 9.0, 3.0, 7.0, 5.0, 6.0], vec![2, 3]).unwrap();
        let am = a.argmax_axis(1).unwrap();
        assert_eq!(am.data(), &[1.0, 0.0]);
    }

    #[test]
    fn test_var_and_max_axis() {
        let a: Tensor<f64> = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        let v = a.var_axis(0).unwrap();
        assert_eq!(v.data(), &[1.0, 1.0]);
        let m = a.max_axis(0).unwrap();
        assert_eq!(m.data(), &[3.0, 4.0]);
    }

    #[test]
    fn test_softmax_axis() {
        let a: Tensor<f64> = Tensor::new(vec![1.0, 2.0, 3.0, 3.0, 2.0, 1.0], vec![2, 3]).unwrap();
        let sm = a.softmax_axis(1).unwrap();
        for row in 0..2 {
            let sum: f64 = (0..3).map(|c| sm.get(&[row, c]).unwrap()).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
        assert!(sm.get(&[0, 2]).unwrap() > sm.get(&[0, 0]).unwrap());
    }

    #[test]
    fn test_sigmoid_clamp() {
        let a: Tensor<f64> = Tensor::from_slice(&[0.0]);
        let s = a.sigmoid();
        assert!((s.data()[0] - 0.5).abs() < 1e-9);

        let b: Tensor<f64> = Tensor::from_slice(&[-2.0, 0.5, 9.0]);
        let c = b.clamp(0.0, 1.0);
        assert_eq!(c.data(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_reductions() {
        let a: Tensor<f64> = Tensor::from_slice(&[2.0, 4.0, 6.0]);
        assert_eq!(a.sum_all(), 12.0);
        assert_eq!(a.mean_all(), 4.0);
        assert_eq!(a.max_all().unwrap(), 6.0);
        assert_eq!(a.min_all().unwrap(), 2.0);
    }

    #[test]
    fn test_partial_eq() {
        let a: Tensor<f64> = Tensor::from_slice(&[1.0, 2.0]);
        let b: Tensor<f64> = Tensor::from_slice(&[1.0, 2.0]);
        let c = a.reshape(vec![2, 1]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
