pub mod alert_policy;
pub mod history;
pub mod prober;
pub mod scheduler;
pub mod state;
