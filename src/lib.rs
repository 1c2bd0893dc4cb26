pub mod config;
pub mod error;
pub mod grad;
pub mod objective;
pub mod optimizer;
pub mod params;
pub mod utils;

pub use config::{Algorithm, OptimizerConfig};
pub use error::{Error, Result};
pub use objective::{Evaluation, FnObjective, GraphObjective, Objective};
pub use optimizer::{
    AdaDelta, Adam, GradientDescent, Optimizer, RmsProp, Rule, UpdateRule, WeightNoise,
};
pub use params::{Gradients, ParamSet};

/// Compare two arrays elementwise with `approx::assert_relative_eq!`.
/// Elements are widened to `f64` so `f32` results can be checked against literals.
#[macro_export]
macro_rules! assert_rel_eq_arr {
    ($actual:expr, $expected:expr) => {
        $crate::assert_rel_eq_arr!($actual, $expected, max_relative = 1e-5)
    };
    ($actual:expr, $expected:expr, $($opt:ident = $val:expr),+) => {
        assert_eq!($actual.shape(), $expected.shape());
        ndarray::Zip::from(&$actual)
            .and(&$expected)
            .for_each(|v, w| {
                approx::assert_relative_eq!(*v as f64, *w as f64, $($opt = $val),+);
            });
    };
}
