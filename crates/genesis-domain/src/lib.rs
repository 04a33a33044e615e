pub mod backoff;
pub mod compute;
pub mod envelope;
pub mod error;
pub mod iam;
pub mod kind;
pub mod lb;
pub mod network;
pub mod secret;
pub mod service;

pub use backoff::backoff_delay;
pub use compute::{HardwareProfile, MachinePool, MachinePoolDriverKind, Node};
pub use envelope::{Actual, EntityId, EntityKind, Envelope, ProjectId, Status, Target};
pub use error::DomainError;
pub use iam::{
    IamClient, OrgRole, Organization, OrganizationMember, Permission, PermissionBinding,
    PermissionTriple, Project, Role, RoleBinding, User, BOOTSTRAP_WILDCARD,
};
pub use kind::{CoreError, ErrorKind};
pub use lb::{BackendPool, LoadBalancer, Protocol, Route, RouteCondition, Vhost};
pub use network::{Interface, Network, NetworkTopology, Subnet};
pub use secret::{Certificate, Password};
pub use service::{
    render_unit, validate_hooks, DeploymentTarget, Hook, Service, ServiceKind, ServiceNode,
};

impl CoreError for DomainError {
    fn kind(&self) -> ErrorKind {
        DomainError::kind(self)
    }
}
