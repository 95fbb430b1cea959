pub mod display;
pub mod expression;
pub mod node;
pub mod value;

pub use display::*;
pub use expression::*;
pub use node::*;
pub use value::*;
