pub mod differential_expression;
pub mod tier_comparison;
