use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
            ActionType::ManageOwnAccount,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
            ActionType::ManageOwnAccount,
            ActionType::ManageAllRecipes,
            ActionType::ManageAllAccounts,
            ActionType::ManageCatalog,
        ],
    ),
];

/// Reads never appear here: safe methods are open to anonymous callers, so
/// no action in the table guards a read path.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnRelations,
    ManageOwnAccount,

    ManageAllRecipes,
    ManageAllAccounts,
    ManageCatalog,
}

impl ActionType {
    pub fn permitted(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if session.role != *role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> SessionData {
        let is_admin = role == UserRole::Admin;
        SessionData {
            user_id: 1,
            username: String::from("anna"),
            role,
            is_admin,
        }
    }

    #[test]
    fn users_manage_only_their_own_resources() {
        let user = session(UserRole::User);
        assert!(ActionType::CreateRecipes.permitted(&user));
        assert!(ActionType::ManageOwnRecipes.permitted(&user));
        assert!(!ActionType::ManageAllRecipes.permitted(&user));
        assert!(!ActionType::ManageCatalog.permitted(&user));
    }

    #[test]
    fn admins_hold_every_action() {
        let admin = session(UserRole::Admin);
        assert!(ActionType::ManageAllRecipes.permitted(&admin));
        assert!(ActionType::ManageAllAccounts.permitted(&admin));
        assert!(ActionType::ManageCatalog.permitted(&admin));
    }
}
