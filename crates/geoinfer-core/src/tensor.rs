use std::fmt;

use anyhow::{bail, ensure, Result};
use bytes::Bytes;
use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F16,
    F64,
    I64,
    I32,
    U8,
    Bool,
}

impl DType {
    pub fn byte_size(self) -> usize {
        match self {
            DType::F64 | DType::I64 => 8,
            DType::F32 | DType::I32 => 4,
            DType::F16 => 2,
            DType::U8 | DType::Bool => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::F64 => "f64",
            DType::I64 => "i64",
            DType::I32 => "i32",
            DType::U8 => "u8",
            DType::Bool => "bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn scalar() -> Self {
        Self(SmallVec::new())
    }
    pub fn dims(&self) -> &[usize] {
        &self.0
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    pub fn numel(&self) -> usize {
        self.0.iter().product::<usize>()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorDesc {
    pub dtype: DType,
    pub shape: Shape,
}

/// A dense host tensor. Elements are stored little-endian, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tensor {
    pub desc: TensorDesc,
    pub bytes: Bytes,
}

/// Element types that can be written into and read out of a [`Tensor`].
pub trait Element: Copy {
    const DTYPE: DType;

    fn write_le(self, out: &mut Vec<u8>);
    fn read_le(b: &[u8]) -> Self;
    fn to_f64(self) -> f64;
}

macro_rules! numeric_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
            fn read_le(b: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(b);
                <$ty>::from_le_bytes(raw)
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

numeric_element!(f32, DType::F32);
numeric_element!(f64, DType::F64);
numeric_element!(i64, DType::I64);
numeric_element!(i32, DType::I32);
numeric_element!(u8, DType::U8);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }
    fn read_le(b: &[u8]) -> Self {
        b[0] != 0
    }
    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }
}

impl Tensor {
    pub fn from_cpu_bytes(dtype: DType, shape: Shape, bytes: Bytes) -> Self {
        Self {
            desc: TensorDesc { dtype, shape },
            bytes,
        }
    }

    pub fn from_values<T: Element>(shape: Shape, values: &[T]) -> Result<Self> {
        ensure!(
            shape.numel() == values.len(),
            "shape {shape} holds {} elements, got {}",
            shape.numel(),
            values.len()
        );
        let mut out = Vec::with_capacity(values.len() * T::DTYPE.byte_size());
        for v in values {
            v.write_le(&mut out);
        }
        Ok(Self::from_cpu_bytes(T::DTYPE, shape, Bytes::from(out)))
    }

    pub fn scalar<T: Element>(value: T) -> Self {
        let mut out = Vec::with_capacity(T::DTYPE.byte_size());
        value.write_le(&mut out);
        Self::from_cpu_bytes(T::DTYPE, Shape::scalar(), Bytes::from(out))
    }

    /// Packs f32 pixel samples into a tensor of the requested element type.
    pub fn from_f32_samples(dtype: DType, shape: Shape, samples: &[f32]) -> Result<Self> {
        match dtype {
            DType::F32 => Self::from_values(shape, samples),
            DType::F64 => Self::from_values(shape, &cast_all(samples, |v| v as f64)),
            DType::I64 => Self::from_values(shape, &cast_all(samples, |v| v as i64)),
            DType::I32 => Self::from_values(shape, &cast_all(samples, |v| v as i32)),
            DType::U8 => Self::from_values(shape, &cast_all(samples, |v| v as u8)),
            DType::Bool => Self::from_values(shape, &cast_all(samples, |v| v != 0.0)),
            DType::F16 => bail!("f16 tensors are not supported yet"),
        }
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn expected_byte_len(&self) -> usize {
        self.desc.shape.numel() * self.desc.dtype.byte_size()
    }

    pub fn is_well_formed(&self) -> bool {
        self.byte_len() == self.expected_byte_len()
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        ensure!(
            self.desc.dtype == T::DTYPE,
            "tensor holds {} elements, requested {}",
            self.desc.dtype,
            T::DTYPE
        );
        self.decode::<T, T>(|v| v)
    }

    /// Decodes every element to f32, whatever the element type.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        match self.desc.dtype {
            DType::F32 => self.decode::<f32, f32>(|v| v),
            DType::F64 => self.decode::<f64, f32>(|v| v as f32),
            DType::I64 => self.decode::<i64, f32>(|v| v as f32),
            DType::I32 => self.decode::<i32, f32>(|v| v as f32),
            DType::U8 => self.decode::<u8, f32>(|v| v as f32),
            DType::Bool => self.decode::<bool, f32>(|v| v.to_f64() as f32),
            DType::F16 => bail!("f16 tensors are not supported yet"),
        }
    }

    fn decode<T: Element, U>(&self, map: impl Fn(T) -> U) -> Result<Vec<U>> {
        let size = T::DTYPE.byte_size();
        ensure!(
            self.is_well_formed(),
            "{} tensor of shape {} has {} bytes, expected {}",
            self.desc.dtype,
            self.desc.shape,
            self.byte_len(),
            self.expected_byte_len()
        );
        Ok(self
            .bytes
            .chunks_exact(size)
            .map(|b| map(T::read_le(b)))
            .collect())
    }
}

fn cast_all<T>(samples: &[f32], f: impl Fn(f32) -> T) -> Vec<T> {
    samples.iter().copied().map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numel_of_scalar_is_one() {
        assert_eq!(Shape::scalar().numel(), 1);
        assert_eq!(Shape::from_slice(&[3, 0]).numel(), 0);
    }

    #[test]
    fn packs_samples_into_requested_dtype() -> Result<()> {
        let t = Tensor::from_f32_samples(DType::I32, Shape::from_slice(&[1, 3]), &[1.9, -2.0, 7.0])?;
        assert_eq!(t.dtype(), DType::I32);
        assert_eq!(t.byte_len(), 12);
        assert_eq!(t.to_vec::<i32>()?, vec![1, -2, 7]);
        assert_eq!(t.to_f32_vec()?, vec![1.0, -2.0, 7.0]);
        Ok(())
    }

    #[test]
    fn rejects_element_count_mismatch() {
        let err = Tensor::from_values(Shape::from_slice(&[2, 2]), &[1.0f32; 3]).unwrap_err();
        assert!(err.to_string().contains("4 elements, got 3"));
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        let t = Tensor::from_cpu_bytes(DType::F32, Shape::from_slice(&[2]), Bytes::from_static(&[0; 5]));
        assert!(!t.is_well_formed());
        assert!(t.to_f32_vec().is_err());
    }

    #[test]
    fn f16_is_rejected() {
        assert!(Tensor::from_f32_samples(DType::F16, Shape::scalar(), &[1.0]).is_err());
    }

    #[test]
    fn shape_display() {
        assert_eq!(Shape::from_slice(&[1, 16, 16, 3]).to_string(), "[1, 16, 16, 3]");
        assert_eq!(Shape::scalar().to_string(), "[]");
    }
}
