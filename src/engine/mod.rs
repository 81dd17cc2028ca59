pub mod assignment;
pub mod eligibility;
pub mod queue;
