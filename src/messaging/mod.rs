pub mod event;
pub mod router;

pub use event::SseEvent;
pub use router::MessageRouter;
