//! Equality policies used by cells to suppress redundant writes.
//!
//! A write only invalidates subscribers when the policy reports the new value
//! as different from the current one. [`Runtime::create_cell`] uses
//! [`equals`]; [`Runtime::create_cell_with`] accepts any of the functions here
//! or a custom one.
//!
//! [`Runtime::create_cell`]: crate::Runtime::create_cell
//! [`Runtime::create_cell_with`]: crate::Runtime::create_cell_with

use std::rc::Rc;

/// Signature of an equality policy.
pub type EqualityFn<T> = fn(&T, &T) -> bool;

/// Value equality through `PartialEq`. The default.
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Every write notifies, even when the value is unchanged.
pub fn never_equal<T>(_: &T, _: &T) -> bool {
    false
}

/// Identity equality for shared values: two `Rc`s are equal only if they
/// point at the same allocation.
///
/// This is the closest Rust has to reference equality on object values.
/// Replacing the `Rc` notifies; mutating through interior mutability does not.
pub fn ptr_eq<U: ?Sized>(a: &Rc<U>, b: &Rc<U>) -> bool {
    Rc::ptr_eq(a, b)
}

/// `f64` equality that treats `NaN` as equal to itself, so writing `NaN`
/// twice does not notify twice.
pub fn f64_equals(a: &f64, b: &f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}
