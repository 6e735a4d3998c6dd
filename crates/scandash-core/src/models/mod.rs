//! Data models for the scanning service.
//!
//! This module contains the data structures exchanged with the remote API:
//!
//! - `user`: login response, users, roles and role assignments
//! - `scan`: scanned URL history and scan result kinds
//! - `report`: the consolidated scan payload and the printable report built from it

pub mod report;
pub mod scan;
pub mod user;

pub use report::{ConsolidatedInfo, Rating, ReportPage, ScanReport, DEFAULT_LINES_PER_PAGE};
pub use scan::{ScanKind, ScannedUrl, UrlHistory};
pub use user::{LoginResponse, LoginUser, NewUser, Role, RoleAssignment, UserDetail, UserSummary, UserUpdate};
