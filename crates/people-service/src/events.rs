//! Event names and storage keys shared by the worker and the HTTP edge.

pub const GET_USER: &str = "get-user";
pub const CREATE_USER: &str = "create-user";
pub const DELETE_USER: &str = "delete-user";
pub const PUT_USER: &str = "put-user";

/// Every event the people worker answers.
pub const ALL: [&str; 4] = [GET_USER, CREATE_USER, DELETE_USER, PUT_USER];

/// Store key holding the `{"users": [...]}` blob.
pub const USERS_KEY: &str = "users";
