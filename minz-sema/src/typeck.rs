//! Bidirectional type checking helpers (spec.md §4.1): expressions carry
//! an expected type hint when available (assignment, return, argument).
//! Implicit coercions are limited to `widen(u8->u16)` and an explicit
//! `as` cast lowered to a no-op or truncation.

use minz_ir::{Module, Type, TypeId};

/// Whether `from` may be implicitly widened to `to` without an `as`
/// cast (spec.md §4.1: "Implicit coercions are limited to
/// widen(u8->u16)").
pub fn can_widen(module: &Module, from: TypeId, to: TypeId) -> bool {
    if from == to {
        return true;
    }
    matches!(
        (module.type_of(from), module.type_of(to)),
        (Type::U8, Type::U16)
            | (Type::U8, Type::U24)
            | (Type::U16, Type::U24)
            | (Type::I8, Type::I16)
            | (Type::I8, Type::I24)
            | (Type::I16, Type::I24)
    )
}

/// An explicit `as` cast between two integer types. Widening is a
/// no-op at the IR level (the wider register already holds a
/// zero/sign-extended value once lowered); narrowing truncates. Casts
/// outside the integer/bool domain are a `TypeError`, reported by the
/// caller.
pub fn is_valid_cast(module: &Module, from: TypeId, to: TypeId) -> bool {
    let from_ty = module.type_of(from);
    let to_ty = module.type_of(to);
    (from_ty.is_integer() || matches!(from_ty, Type::Bool))
        && (to_ty.is_integer() || matches!(to_ty, Type::Bool))
}

pub fn is_narrowing(module: &Module, from: TypeId, to: TypeId) -> bool {
    let from_bits = module.type_of(from).width().map(|w| w.bits()).unwrap_or(0);
    let to_bits = module.type_of(to).width().map(|w| w.bits()).unwrap_or(0);
    to_bits < from_bits
}
