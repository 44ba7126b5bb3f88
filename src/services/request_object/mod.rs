pub mod core;
pub mod factory;
pub mod types;

pub use self::core::{Promotion, RequestObjectDecoder};
pub use factory::build_request_object_decoder;
pub use types::{
    AuthorizationParams, AuthorizationRequest, ClientContext, Payload, ProvenanceMarker, Provider,
    ProviderPolicy, REQUEST_PARAM, Whitelist,
};
