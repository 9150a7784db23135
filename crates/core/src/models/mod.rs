pub mod assignment;
pub mod course;
pub mod credential;
pub mod grade;
pub mod platform;
pub mod sync;
pub mod user;
