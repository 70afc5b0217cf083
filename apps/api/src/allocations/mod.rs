pub mod handlers;
pub mod overlap;

/// Canonical staffing roles accepted when an allocation is edited.
/// Creation accepts any non-empty role; the update path validates against
/// this list (observed contract asymmetry, kept as-is).
pub const ALLOCATION_ROLES: &[&str] = &[
    "developer",
    "designer",
    "qa",
    "devops",
    "analyst",
    "architect",
    "manager",
];
