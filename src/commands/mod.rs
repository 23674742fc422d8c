pub mod check;
pub mod rebaseline;
pub mod run;
