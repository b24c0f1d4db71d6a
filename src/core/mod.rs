/// Draft orders, file items and print settings
pub mod cart;
/// Vendor status transitions and pickup verification
pub mod fulfillment;
/// Session identity and roles
pub mod identity;
/// Stationery catalog
pub mod inventory;
/// Order read models and role-scoped queries
pub mod orders;
/// Pickup codes
pub mod otp;
/// Price sheet and totals
pub mod pricing;
/// Dashboard summaries and order search
pub mod report;
/// Order placement and OTP issuance
pub mod submission;
