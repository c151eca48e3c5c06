pub mod pipeline;
pub mod retention;
pub mod revenue;
pub mod unit_economics;
