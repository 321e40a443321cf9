pub mod fixtures;

pub mod manager_tests;
