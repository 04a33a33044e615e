use std::collections::HashMap;
use std::sync::Arc;

use genesis_domain::EntityId;
use genesis_driver::DriverRegistry;
use genesis_iam::IamKernel;
use genesis_store::ResourceStore;

/// The subject a request authenticated as, resolved from the bearer token it
/// presented. Attached to the request by [`crate::auth::require_bearer_token`]
/// and pulled back out by handlers that need to run an IAM check.
#[derive(Debug, Clone, Copy)]
pub struct Subject(pub EntityId);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
    pub registry: Arc<DriverRegistry>,
    pub iam: Arc<IamKernel>,
    /// Maps a bearer token to the subject it authenticates — this
    /// illustrative slice has no OIDC token minting (out of scope per §1),
    /// so each caller is provisioned a static per-subject token instead of a
    /// single shared secret.
    pub auth_tokens: Arc<HashMap<String, EntityId>>,
}
