pub mod grade;
pub mod keys;
pub mod recognize;
pub mod status;
