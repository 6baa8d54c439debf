mod integration;
pub mod support;
