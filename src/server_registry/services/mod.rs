//! Application services for the scoped server registry.

mod registry;

pub use registry::{
    RegisterServerRequest, ServerRegistryService, ServerRegistryServiceError,
    ServerRegistryServiceResult, UpdateServerRequest,
};
