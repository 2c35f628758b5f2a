//! API endpoint handlers, one module per resource. Handlers open a
//! connection, call the domain module and map its errors.

pub mod catalog;
pub mod health;
pub mod lab_exams;
pub mod patients;
pub mod procedures;
pub mod quotes;
pub mod reports;
