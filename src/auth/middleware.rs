use crate::auth::models::{AuthenticatedUser, Role};

/// Map configured group names to roles.
///
/// Unknown names are ignored; the result is sorted and deduplicated.
pub fn map_groups_to_roles(groups: &[String]) -> Vec<Role> {
    let mut roles: Vec<Role> = groups
        .iter()
        .filter_map(|g| Role::from_str_ci(g))
        .collect();
    roles.sort();
    roles.dedup();
    roles
}

/// Build an `AuthenticatedUser` from a configured grant.
pub fn build_authenticated_user(user_id: String, groups: &[String]) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id,
        roles: map_groups_to_roles(groups),
    }
}
