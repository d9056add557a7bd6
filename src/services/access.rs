use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::entity::Role;
use crate::error::{AppError, AppResult};
use crate::repositories::WorkspaceRepository;

/// What a caller is about to do inside a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Read,
    Write,
    Delete,
}

impl Gate {
    fn admits(&self, role: Role) -> bool {
        match self {
            Gate::Read => true,
            Gate::Write => matches!(role, Role::Owner | Role::Admin),
            Gate::Delete => role == Role::Owner,
        }
    }
}

/// Decide a gate for a known membership.
///
/// Non-members get `NotFound` so the workspace stays invisible to them.
pub fn authorize(role: Option<Role>, gate: Gate) -> AppResult<Role> {
    let role = role.ok_or_else(|| AppError::NotFound("Workspace".to_string()))?;

    if !gate.admits(role) {
        return Err(AppError::PermissionDenied(format!(
            "{:?} role cannot {:?} in this workspace",
            role, gate
        )));
    }

    Ok(role)
}

/// Workspace access policy
pub struct AccessService;

impl AccessService {
    pub async fn check(
        db: &DatabaseConnection,
        user_id: Uuid,
        workspace_id: Uuid,
        gate: Gate,
    ) -> AppResult<Role> {
        let role = WorkspaceRepository::find_role(db, workspace_id, user_id).await?;
        authorize(role, gate)
    }

    /// Any member
    pub async fn check_read(
        db: &DatabaseConnection,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> AppResult<Role> {
        Self::check(db, user_id, workspace_id, Gate::Read).await
    }

    /// Admin or owner
    pub async fn check_write(
        db: &DatabaseConnection,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> AppResult<Role> {
        Self::check(db, user_id, workspace_id, Gate::Write).await
    }

    /// Apply one gate to every distinct workspace in `workspace_ids`
    pub async fn check_all<I>(
        db: &DatabaseConnection,
        user_id: Uuid,
        workspace_ids: I,
        gate: Gate,
    ) -> AppResult<()>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut seen = std::collections::HashSet::new();
        for workspace_id in workspace_ids {
            if seen.insert(workspace_id) {
                Self::check(db, user_id, workspace_id, gate).await?;
            }
        }
        Ok(())
    }

    /// Membership test used to filter sync feeds; lookup failures deny
    pub async fn is_member(db: &DatabaseConnection, user_id: Uuid, workspace_id: Uuid) -> bool {
        match WorkspaceRepository::find_role(db, workspace_id, user_id).await {
            Ok(role) => role.is_some(),
            Err(e) => {
                tracing::warn!(%user_id, %workspace_id, error = %e, "membership lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_gates_by_role() {
        assert!(authorize(Some(Role::Member), Gate::Read).is_ok());
        assert!(authorize(Some(Role::Admin), Gate::Write).is_ok());
        assert!(authorize(Some(Role::Owner), Gate::Delete).is_ok());

        let err = authorize(Some(Role::Member), Gate::Write).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
        let err = authorize(Some(Role::Admin), Gate::Delete).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
    }

    #[test]
    fn test_non_member_sees_not_found() {
        for gate in [Gate::Read, Gate::Write, Gate::Delete] {
            let err = authorize(None, gate).unwrap_err();
            assert_eq!(err.code(), ErrorCode::NotFound);
        }
    }
}
