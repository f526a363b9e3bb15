//! Role-based access decisions.

use crate::auth::models::Identity;
use crate::database::models::Role;

/// Decides whether `identity` may reach a route guarded by `required_roles`.
///
/// An empty list admits any authenticated identity.
pub fn authorize(identity: &Identity, required_roles: &[Role]) -> bool {
    required_roles.is_empty() || required_roles.contains(&identity.role)
}
