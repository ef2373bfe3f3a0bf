//! UserHandling gRPC service implementation.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use data::{Data, DataError, Method, User as Subscriber};
use messaging::Publisher;
use rpc::watermelon::v1::user_handling_server::UserHandling;
use rpc::watermelon::v1::{Key, ListUsersRequest, Response as UhResponse, User};
use tokio_stream::Stream;
use tonic::{Request, Response, Status};
use tracing::{error, info, warn};
use validator::ValidateEmail;

/// Deadline for membership reads.
const CTX_TIMEOUT: Duration = Duration::from_secs(3);

/// Type alias for the ListUsers streaming response
type UserStream = Pin<Box<dyn Stream<Item = Result<User, Status>> + Send>>;

/// gRPC service for subscription management.
///
/// Composes the data layer and the bus publisher behind their seams; the
/// service owns no state of its own.
pub struct UserHandlingService<D, P> {
    data: Arc<D>,
    publisher: Arc<P>,
}

impl<D, P> UserHandlingService<D, P>
where
    D: Data + 'static,
    P: Publisher + 'static,
{
    pub fn new(data: Arc<D>, publisher: Arc<P>) -> Self {
        Self { data, publisher }
    }

    fn internal(context: &str, e: impl std::fmt::Display) -> Status {
        error!("An error occurred while {}: {}", context, e);
        Status::internal(e.to_string())
    }
}

#[tonic::async_trait]
impl<D, P> UserHandling for UserHandlingService<D, P>
where
    D: Data + 'static,
    P: Publisher + 'static,
{
    async fn auth_user(
        &self,
        request: Request<Key>,
    ) -> Result<Response<UhResponse>, Status> {
        let key = request.into_inner().key;
        info!("Got a call for AuthUser method");

        let operation = match self.data.get_operation(&key).await {
            Ok(Some(operation)) => operation,
            // A missing key and a present-but-undecodable entry are both a
            // forged key as far as the caller is concerned.
            Ok(None) | Err(DataError::Corrupt(_)) => {
                return Err(Status::invalid_argument("Wrong key."));
            }
            Err(e) => return Err(Self::internal("accessing cache", e)),
        };

        match operation.method {
            Method::Add => self.data.add_user(&operation.user).await,
            Method::Delete => self.data.delete_user(&operation.user).await,
        }
        .map_err(|e| Self::internal("executing database operation", e))?;

        // Consume the key so a second click is a clean "Wrong key." instead
        // of a duplicate apply. Best-effort: the TTL bounds the residue.
        if let Err(e) = self.data.delete_operation(&key).await {
            warn!(error = %e, "Failed to consume confirmation key");
        }

        info!(
            "Successfully executed method {} for user {}.",
            operation.method, operation.user.nickname
        );
        Ok(Response::new(UhResponse {
            message: format!("Method {} was executed successfully.", operation.method),
        }))
    }

    async fn add_user(&self, request: Request<User>) -> Result<Response<UhResponse>, Status> {
        let user = request.into_inner();
        info!(
            "Got a call for AddUser method with nickname {:?} and email {:?}",
            user.nickname, user.email
        );

        // Validate before touching any state so a bad email leaves no trace
        // in the database or cache.
        if !user.email.validate_email() {
            return Err(Status::invalid_argument("Invalid email."));
        }

        let exists = self
            .data
            .check_nickname(&user.nickname)
            .await
            .map_err(|e| Self::internal("executing database operation", e))?;
        if exists {
            return Err(Status::already_exists(
                "User with this nickname already exists.",
            ));
        }

        let subscriber = Subscriber::new(&user.nickname, &user.email);
        let key = self
            .data
            .set_operation(&subscriber, Method::Add)
            .await
            .map_err(|e| Self::internal("accessing cache", e))?;

        self.publisher
            .publish_auth(&user.email, &key, Method::Add.as_str())
            .await
            .map_err(|e| Self::internal("sending message to MB", e))?;

        info!("Got a request to add user {}. The auth email is sent.", user.nickname);
        Ok(Response::new(UhResponse {
            message: "Auth email is sent.".to_string(),
        }))
    }

    async fn delete_user(&self, request: Request<User>) -> Result<Response<UhResponse>, Status> {
        let user = request.into_inner();
        info!(
            "Got a call for DeleteUser method with nickname {:?} and email {:?}",
            user.nickname, user.email
        );

        let exists = self
            .data
            .check_nickname(&user.nickname)
            .await
            .map_err(|e| Self::internal("executing database operation", e))?;
        if !exists {
            return Err(Status::not_found("There is no user with such nickname."));
        }

        let subscriber = Subscriber::new(&user.nickname, &user.email);
        let key = self
            .data
            .set_operation(&subscriber, Method::Delete)
            .await
            .map_err(|e| Self::internal("accessing cache", e))?;

        self.publisher
            .publish_auth(&user.email, &key, Method::Delete.as_str())
            .await
            .map_err(|e| Self::internal("sending message to MB", e))?;

        info!(
            "Got a request to delete user {}. The auth email is sent.",
            user.nickname
        );
        Ok(Response::new(UhResponse {
            message: "Auth email is sent.".to_string(),
        }))
    }

    type ListUsersStream = UserStream;

    async fn list_users(
        &self,
        _request: Request<ListUsersRequest>,
    ) -> Result<Response<Self::ListUsersStream>, Status> {
        info!("Got a call for ListUsers method.");

        let users = tokio::time::timeout(CTX_TIMEOUT, self.data.list_users())
            .await
            .map_err(|_| Status::deadline_exceeded("Listing users timed out."))?
            .map_err(|e| Self::internal("executing database operation", e))?;

        let stream = tokio_stream::iter(users.into_iter().map(|user| {
            Ok(User {
                nickname: user.nickname,
                email: user.email,
            })
        }));

        info!("The users list is successfully sent.");
        Ok(Response::new(Box::pin(stream)))
    }
}
