//! REST API tests

mod auth_tests;
mod health_tests;
mod notification_tests;
mod presence_tests;
mod room_tests;
