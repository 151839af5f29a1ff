pub extern crate flame;
pub extern crate nalgebra;

#[allow(non_camel_case_types)]
pub type float = f64;
pub use std::f64::consts::E;
pub use std::f64::{INFINITY, NEG_INFINITY};

pub fn min<T: Copy + PartialOrd>(a: T, b: T) -> T {
    *nalgebra::partial_min(&a, &b).expect("NaN")
}

/// Clamps `v` to `[-limit, limit]`.
pub fn clamp_abs(v: float, limit: float) -> float {
    if v.abs() < limit {
        v
    } else {
        v.signum() * limit
    }
}

pub type Matrix<R, C> = nalgebra::OMatrix<float, R, C>;
pub type Mask<R, C> = nalgebra::OMatrix<bool, R, C>;

pub use nalgebra::Dyn as Dy;
