//! gRPC definitions for the watermelon delivery services.
//!
//! The `UserHandling` service is the externally visible surface of the
//! user-handling service; an HTTP/JSON gateway maps REST verbs onto it
//! (`POST /v1/users`, `DELETE /v1/users/{nickname}`, `GET /v1/users`,
//! `GET /v1/auth/{token}`).
//!
//! ## Server-side
//!
//! ```ignore
//! use rpc::watermelon::v1::user_handling_server::{UserHandling, UserHandlingServer};
//! use rpc::watermelon::v1::{Key, ListUsersRequest, Response, User};
//! ```
//!
//! ## Client-side
//!
//! ```ignore
//! use rpc::watermelon::v1::user_handling_client::UserHandlingClient;
//!
//! let mut client = UserHandlingClient::connect("http://localhost:9090").await?;
//! ```

pub mod watermelon {
    pub mod v1 {
        tonic::include_proto!("watermelon.v1");
    }
}
