//! Protocol buffer messages spoken with the service bridge.
//!
//! Hand maintained, since only a handful of messages are needed. Public so
//! that tests elsewhere can play the part of the bridge.

#![allow(missing_docs, clippy::missing_docs_in_private_items)]

/// Envelope around a single service call.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(string, required, tag = "2")]
    pub service_name: String,
    #[prost(string, required, tag = "3")]
    pub method: String,
    #[prost(bytes = "vec", required, tag = "4")]
    pub request: Vec<u8>,
    /// The API ticket.
    #[prost(string, optional, tag = "5")]
    pub request_id: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplicationError {
    #[prost(int32, required, tag = "1")]
    pub code: i32,
    #[prost(string, required, tag = "2")]
    pub detail: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcError {
    #[prost(int32, required, tag = "1")]
    pub code: i32,
    #[prost(string, optional, tag = "2")]
    pub detail: Option<String>,
}

/// Envelope around a single service answer. At most one of the optional
/// fields is set.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Response {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub response: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub exception: Option<Vec<u8>>,
    #[prost(message, optional, tag = "3")]
    pub application_error: Option<ApplicationError>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub java_exception: Option<Vec<u8>>,
    #[prost(message, optional, tag = "5")]
    pub rpc_error: Option<RpcError>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLoginUrlRequest {
    #[prost(string, required, tag = "1")]
    pub destination_url: String,
    #[prost(string, optional, tag = "2")]
    pub auth_domain: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub federated_identity: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLoginUrlResponse {
    #[prost(string, required, tag = "1")]
    pub login_url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLogoutUrlRequest {
    #[prost(string, required, tag = "1")]
    pub destination_url: String,
    #[prost(string, optional, tag = "2")]
    pub auth_domain: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLogoutUrlResponse {
    #[prost(string, required, tag = "1")]
    pub logout_url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetServiceAccountNameRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetServiceAccountNameResponse {
    #[prost(string, optional, tag = "1")]
    pub service_account_name: Option<String>,
}
