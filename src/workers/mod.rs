pub mod cleanup;

pub use cleanup::start_cleanup_worker;
