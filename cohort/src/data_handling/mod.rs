pub mod clinical;
pub mod expression;
pub mod scores;
pub mod subtype;
