pub mod tracing_publisher;
