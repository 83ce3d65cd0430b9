pub mod check;
pub mod edit;
pub mod invoke;
pub mod metadata;
