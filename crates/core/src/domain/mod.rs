pub mod contact;
pub mod deal;
pub mod lead_score;
pub mod property;
pub mod relationship;
pub mod task;
