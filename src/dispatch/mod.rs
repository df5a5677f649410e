pub mod coordinator;
pub mod eligibility;
pub mod outcome;
pub mod request;
