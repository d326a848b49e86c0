//! Data Transfer Objects for REST responses.

pub mod guest_dto;

pub use guest_dto::*;
