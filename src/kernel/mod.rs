//! Kernel functions for SVM

pub mod evaluator;
pub mod linear;
pub mod normalized;
pub mod polynomial;
pub mod rbf;
pub mod sigmoid;
pub mod spec;
pub mod traits;

pub use self::evaluator::*;
pub use self::linear::*;
pub use self::normalized::*;
pub use self::polynomial::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::spec::*;
pub use self::traits::*;
