pub mod backend;
pub mod controller;
pub mod proxy;
pub mod resolver;
pub mod specifier;
pub mod worker;

pub use backend::BackendRequest;
pub use controller::WorkerClient;
pub use backend::Compiler;
pub use backend::CompilerLoader;
pub use backend::WasmCompilerLoader;
pub use proxy::CompilerProxy;
pub use proxy::Outcome;
pub use resolver::ArtifactStore;
pub use resolver::DependencyRequest;
pub use resolver::PackageFeed;
pub use resolver::SpecifierResolver;
pub use specifier::VersionSpecifier;
pub use worker::WorkerSession;
