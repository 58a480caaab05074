//! Shared primitive arrays.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::class::FieldType;
use crate::error::{BridgeError, Result};

/// Backing storage of a managed array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayData {
    Byte(Vec<u8>),
    Char(Vec<u16>),
    Int(Vec<i32>),
}

impl ArrayData {
    fn array_type(&self) -> FieldType {
        match self {
            ArrayData::Byte(_) => FieldType::ByteArray,
            ArrayData::Char(_) => FieldType::CharArray,
            ArrayData::Int(_) => FieldType::IntArray,
        }
    }

    fn len(&self) -> usize {
        match self {
            ArrayData::Byte(v) => v.len(),
            ArrayData::Char(v) => v.len(),
            ArrayData::Int(v) => v.len(),
        }
    }
}

/// Element types a managed array can hold.
pub trait Element: Copy + Default + Send + 'static {
    const ARRAY_TYPE: FieldType;

    fn slice(data: &ArrayData) -> Option<&[Self]>;
    fn slice_mut(data: &mut ArrayData) -> Option<&mut [Self]>;
    fn wrap(values: Vec<Self>) -> ArrayData;
}

macro_rules! element {
    ($ty:ty, $variant:ident, $array:ident) => {
        impl Element for $ty {
            const ARRAY_TYPE: FieldType = FieldType::$array;

            fn slice(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut ArrayData) -> Option<&mut [Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn wrap(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }
        }
    };
}

element!(u8, Byte, ByteArray);
element!(u16, Char, CharArray);
element!(i32, Int, IntArray);

/// A fixed-length managed array shared between objects and callers.
#[derive(Debug)]
pub struct Array {
    data: Mutex<ArrayData>,
}

pub type ArrayRef = Arc<Array>;

impl Array {
    pub fn new<T: Element>(values: Vec<T>) -> ArrayRef {
        Arc::new(Array {
            data: Mutex::new(T::wrap(values)),
        })
    }

    pub fn zeroed<T: Element>(len: usize) -> ArrayRef {
        Self::new(vec![T::default(); len])
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn array_type(&self) -> FieldType {
        self.lock().array_type()
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let data = self.lock();
        T::slice(&data)
            .map(<[T]>::to_vec)
            .ok_or_else(|| type_mismatch::<T>(&data))
    }

    /// Copy `out.len()` elements starting at `start` out of the array.
    pub fn get_region<T: Element>(&self, start: usize, out: &mut [T]) -> Result<()> {
        let data = self.lock();
        let values = T::slice(&data).ok_or_else(|| type_mismatch::<T>(&data))?;
        let region = region(values.len(), start, out.len())?;
        out.copy_from_slice(&values[region]);
        Ok(())
    }

    /// Copy `src` into the array starting at `start`.
    pub fn set_region<T: Element>(&self, start: usize, src: &[T]) -> Result<()> {
        let mut data = self.lock();
        let found = data.array_type();
        let values = T::slice_mut(&mut data).ok_or_else(|| {
            BridgeError::schema(T::ARRAY_TYPE.to_string(), format!("array holds {}", found))
        })?;
        let region = region(values.len(), start, src.len())?;
        values[region].copy_from_slice(src);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ArrayData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn region(len: usize, start: usize, count: usize) -> Result<std::ops::Range<usize>> {
    let end = start.checked_add(count).filter(|end| *end <= len).ok_or(
        BridgeError::OutOfRange {
            required: start.saturating_add(count),
            len,
        },
    )?;
    Ok(start..end)
}

fn type_mismatch<T: Element>(data: &ArrayData) -> BridgeError {
    BridgeError::schema(
        T::ARRAY_TYPE.to_string(),
        format!("array holds {}", data.array_type()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_copy() {
        let array = Array::new(vec![1u8, 2, 3, 4]);
        let mut out = [0u8; 2];
        array.get_region(1, &mut out).unwrap();
        assert_eq!(out, [2, 3]);

        array.set_region(2, &[9u8, 9]).unwrap();
        assert_eq!(array.to_vec::<u8>().unwrap(), vec![1, 2, 9, 9]);
    }

    #[test]
    fn test_region_out_of_range() {
        let array = Array::zeroed::<u8>(3);
        let mut out = [0u8; 4];
        let err = array.get_region(0, &mut out).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfRange { required: 4, len: 3 }));

        let err = array.set_region(2, &[1u8, 2]).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfRange { required: 4, len: 3 }));
    }

    #[test]
    fn test_element_type_mismatch() {
        let array = Array::zeroed::<i32>(2);
        let mut out = [0u8; 1];
        assert!(array.get_region(0, &mut out).unwrap_err().is_schema_mismatch());
        assert_eq!(array.array_type(), FieldType::IntArray);
    }
}
