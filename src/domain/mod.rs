pub mod lab;
pub mod submission;
pub mod university;
pub mod user;
