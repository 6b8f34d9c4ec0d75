//! Auth types the rest of the CRM links against.
//!
//! Provides the `CurrentUser` value handed to every protected operation and the
//! session-cookie builders.

pub mod cookie;
pub mod identity;
