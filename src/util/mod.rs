//! Small seams shared by the auth operations and the route guard.

pub mod navigate;
