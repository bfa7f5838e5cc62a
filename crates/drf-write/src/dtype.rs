//! Sample element model and its HDF5 type mapping.
//!
//! A channel's element type is fixed at compile time by the writer's type
//! parameter: a plain scalar for real channels, or [`Iq<T>`] for complex
//! ones. [`SampleDtype`] classifies that type once, in one place, and
//! everything downstream (dataset creation, property attributes,
//! configuration validation) works from the classification.

use crate::error::{DrfError, Result};
use hdf5::types::{CompoundField, CompoundType, TypeDescriptor};
use hdf5::H5Type;
use std::mem;

/// A complex sample: one in-phase and one quadrature component.
///
/// Stored as a two-field HDF5 compound named `r` and `i`, the element type
/// readers of complex channels expect.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Iq<T> {
    /// In-phase (real) component.
    pub r: T,
    /// Quadrature (imaginary) component.
    pub i: T,
}

impl<T> Iq<T> {
    /// Creates a complex sample from its components.
    pub fn new(r: T, i: T) -> Self {
        Self { r, i }
    }
}

unsafe impl<T: H5Type> H5Type for Iq<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Compound(CompoundType {
            fields: vec![
                CompoundField::typed::<T>("r", 0, 0),
                CompoundField::typed::<T>("i", mem::size_of::<T>(), 1),
            ],
            size: 2 * mem::size_of::<T>(),
        })
    }
}

/// The scalar kind underlying a channel's element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// Signed integer of the given byte width.
    Signed(usize),
    /// Unsigned integer of the given byte width.
    Unsigned(usize),
    /// IEEE float of the given byte width.
    Float(usize),
}

impl ScalarKind {
    /// Returns the scalar width in bytes.
    pub fn size(&self) -> usize {
        match *self {
            Self::Signed(size) | Self::Unsigned(size) | Self::Float(size) => size,
        }
    }
}

/// Classification of a channel element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleDtype {
    scalar: ScalarKind,
    is_complex: bool,
}

impl SampleDtype {
    /// Classifies the element type `T`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for element types the format does not admit:
    /// anything other than the supported scalars, plain or wrapped in
    /// [`Iq`].
    pub fn of<T: H5Type>() -> Result<Self> {
        Self::from_descriptor(&T::type_descriptor())
    }

    fn from_descriptor(descriptor: &TypeDescriptor) -> Result<Self> {
        match descriptor {
            TypeDescriptor::Integer(size) => Ok(Self {
                scalar: ScalarKind::Signed(*size as usize),
                is_complex: false,
            }),
            TypeDescriptor::Unsigned(size) => Ok(Self {
                scalar: ScalarKind::Unsigned(*size as usize),
                is_complex: false,
            }),
            TypeDescriptor::Float(size) => Ok(Self {
                scalar: ScalarKind::Float(*size as usize),
                is_complex: false,
            }),
            TypeDescriptor::Compound(compound) => Self::from_compound(compound),
            other => Err(DrfError::ConfigInvalid(format!(
                "unsupported sample element type {:?}",
                other
            ))),
        }
    }

    fn from_compound(compound: &CompoundType) -> Result<Self> {
        let [r, i] = compound.fields.as_slice() else {
            return Err(DrfError::ConfigInvalid(format!(
                "compound sample element must have exactly fields r and i, got {} fields",
                compound.fields.len()
            )));
        };
        if r.name != "r" || i.name != "i" || r.ty != i.ty {
            return Err(DrfError::ConfigInvalid(
                "compound sample element must be two identical scalars named r and i".to_string(),
            ));
        }
        let scalar = Self::from_descriptor(&r.ty)?;
        if scalar.is_complex {
            return Err(DrfError::ConfigInvalid(
                "nested complex sample elements are not supported".to_string(),
            ));
        }
        Ok(Self {
            scalar: scalar.scalar,
            is_complex: true,
        })
    }

    /// Returns the scalar kind of the element.
    pub fn scalar(&self) -> ScalarKind {
        self.scalar
    }

    /// Returns true for complex (I/Q) elements.
    pub fn is_complex(&self) -> bool {
        self.is_complex
    }

    /// Returns the full element width in bytes (both components when
    /// complex).
    pub fn element_size(&self) -> usize {
        if self.is_complex {
            2 * self.scalar.size()
        } else {
            self.scalar.size()
        }
    }

    /// Returns the `H5Tget_class`-style class of the stored element:
    /// 0 integer, 1 float, 6 compound.
    pub fn h5_class(&self) -> i64 {
        if self.is_complex {
            6
        } else {
            match self.scalar {
                ScalarKind::Signed(_) | ScalarKind::Unsigned(_) => 0,
                ScalarKind::Float(_) => 1,
            }
        }
    }

    /// Returns the `H5Tget_size`-style element size in bytes.
    pub fn h5_size(&self) -> u64 {
        self.element_size() as u64
    }

    /// Returns the `H5Tget_precision`-style scalar precision in bits.
    pub fn h5_precision(&self) -> u64 {
        self.scalar.size() as u64 * 8
    }

    /// Returns the `H5Tget_offset`-style bit offset, always zero for the
    /// supported types.
    pub fn h5_offset(&self) -> u64 {
        0
    }

    /// Returns the `H5Tget_order`-style byte order of the stored element:
    /// 0 little-endian. The format is self-describing, so the recorded
    /// order is whatever the library stores for the native type.
    pub fn h5_order(&self) -> i64 {
        0
    }
}
