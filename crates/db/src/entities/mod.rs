pub mod focus;
pub mod goal;
pub mod label;
pub mod task;
pub mod task_label;
pub mod user;
