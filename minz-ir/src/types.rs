//! The closed type sum of spec.md §3. Generalizes the teacher's closed,
//! fieldless `OpCode`/`RegisterId` enums (`enums.rs`) to a recursive sum
//! with payload, since MinZ types nest (pointers, arrays, structs) where
//! the teacher's instruction formats do not.

use std::fmt;
use std::rc::Rc;

/// Interned handle into a [`crate::module::Module`]'s type table, used
/// wherever two types need to be compared for identity rather than
/// walked structurally (spec.md §9: arena-indexed ids break cyclic
/// references between declarations and the symbol table).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// One fixed-point format: a signed integer storage width with an
/// implicit binary-point shift (spec.md §3: "f8.8, f.8, f.16, f16.8,
/// f8.16 — stored as signed integers with a known shift").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FixedPointFormat {
    /// Total storage width in bits (8, 16, or 24).
    pub storage_bits: u32,
    /// Number of fractional bits (the shift).
    pub frac_bits: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    pub name_id: u32,
    pub ty: TypeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitField {
    pub name_id: u32,
    pub width: u32,
}

/// The closed sum of spec.md §3's `## Types`. Struct/enum/bit-struct
/// field lists and function signatures are heap-allocated (`Rc<[_]>`)
/// since a `Type` value is cloned freely while being threaded through
/// semantic analysis, but the sum itself stays `Copy`-free, small, and
/// comparable by value — callers that need identity comparisons should
/// compare `TypeId`s from the module's type table instead.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    U8,
    U16,
    U24,
    I8,
    I16,
    I24,
    Bool,
    Void,
    Fixed(FixedPointFormat),
    Pointer { base: TypeId, mutable: bool },
    Array { element: TypeId, size: u32 },
    Struct { name_id: u32, fields: Rc<[Field]> },
    BitStruct { underlying: BitStructWidth, fields: Rc<[BitField]> },
    Enum { name_id: u32, variants: Rc<[u32]> },
    Function { params: Rc<[TypeId]>, ret: TypeId, error_enum: Option<TypeId> },
    ErrorWrapped { value_type: TypeId, error_enum: TypeId },
    Alias { name_id: u32, target: TypeId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitStructWidth {
    U8,
    U16,
}

impl BitStructWidth {
    pub fn bits(self) -> u32 {
        match self {
            BitStructWidth::U8 => 8,
            BitStructWidth::U16 => 16,
        }
    }
}

impl Type {
    /// Storage size in bytes, for every type whose layout does not
    /// require resolving through the module's type table (primitives,
    /// fixed-point, pointers, bit-structs). Aggregate sizes are computed
    /// by `Module::type_size` instead, since they need to recurse through
    /// `TypeId`s.
    pub fn leaf_size_bytes(&self) -> Option<u32> {
        match self {
            Type::U8 | Type::I8 | Type::Bool => Some(1),
            Type::U16 | Type::I16 => Some(2),
            Type::U24 | Type::I24 => Some(3),
            Type::Void => Some(0),
            Type::Fixed(fmt) => Some(fmt.storage_bits / 8),
            Type::Pointer { .. } => Some(2),
            Type::BitStruct { underlying, .. } => Some(underlying.bits() / 8),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::U8 | Type::U16 | Type::U24 | Type::I8 | Type::I16 | Type::I24
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::I8 | Type::I16 | Type::I24)
    }

    pub fn width(&self) -> Option<minz_support::width::Width> {
        match self {
            Type::U8 | Type::I8 | Type::Bool => Some(minz_support::width::Width::W8),
            Type::U16 | Type::I16 => Some(minz_support::width::Width::W16),
            Type::U24 | Type::I24 => Some(minz_support::width::Width::W24),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U24 => write!(f, "u24"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I24 => write!(f, "i24"),
            Type::Bool => write!(f, "bool"),
            Type::Void => write!(f, "void"),
            Type::Fixed(fmt_) => write!(f, "f{}.{}", fmt_.storage_bits - fmt_.frac_bits, fmt_.frac_bits),
            Type::Pointer { base, mutable } => {
                write!(f, "*{}T{}", if *mutable { "mut " } else { "" }, base.0)
            }
            Type::Array { element, size } => write!(f, "[T{}; {}]", element.0, size),
            Type::Struct { name_id, .. } => write!(f, "struct#{}", name_id),
            Type::BitStruct { underlying, .. } => write!(f, "bits_{}", underlying.bits()),
            Type::Enum { name_id, .. } => write!(f, "enum#{}", name_id),
            Type::Function { params, ret, error_enum } => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "T{}", p.0)?;
                }
                write!(f, ") -> T{}", ret.0)?;
                if let Some(e) = error_enum {
                    write!(f, " ? T{}", e.0)?;
                }
                Ok(())
            }
            Type::ErrorWrapped { value_type, error_enum } => {
                write!(f, "T{} ? T{}", value_type.0, error_enum.0)
            }
            Type::Alias { name_id, .. } => write!(f, "alias#{}", name_id),
        }
    }
}
