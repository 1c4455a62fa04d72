pub mod channel;
pub mod debounce;
pub mod envelope;
pub mod transport;
pub mod worker;

pub use channel::RpcChannel;
pub use debounce::Debouncer;
pub use debounce::RequestClass;
pub use envelope::Envelope;
pub use envelope::Request;
pub use envelope::Response;
pub use transport::DuplexTransport;
pub use transport::FrameTransport;
pub use worker::WorkerHandle;
pub use worker::WorkerService;

#[cfg(test)]
mod tests;
