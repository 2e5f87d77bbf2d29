pub mod search;
pub mod section_ops;
pub mod task_ops;
