pub mod dispatch_queue;
pub mod run_loop;
pub mod serial_executor;
