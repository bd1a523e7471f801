//! Shared building blocks: bounded buffers and periodic background tasks.

pub mod ring_buffer;
pub mod scheduled_task;

pub use ring_buffer::RingBuffer;
pub use scheduled_task::ScheduledTask;
