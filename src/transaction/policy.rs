//! Who may see, create, change and delete which records.
//!
//! Every function takes the acting user explicitly. Checks that need to know
//! whether a user exists take a lookup closure so that they run against the
//! same database transaction as the write they guard.

use crate::{
    Error,
    auth::{Actor, UserID},
    error::ValidationErrors,
    transaction::Transaction,
};

/// The records an actor may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityScope {
    /// Every record, for privileged actors.
    All,
    /// Only the records owned by this user.
    OwnedBy(UserID),
}

impl VisibilityScope {
    /// The owner to filter queries on, `None` meaning no filter.
    pub fn owner_filter(&self) -> Option<UserID> {
        match self {
            VisibilityScope::All => None,
            VisibilityScope::OwnedBy(user_id) => Some(*user_id),
        }
    }
}

/// Get the records `actor` may see.
pub fn visibility_scope(actor: &Actor) -> VisibilityScope {
    if actor.is_privileged() {
        VisibilityScope::All
    } else {
        VisibilityScope::OwnedBy(actor.user_id)
    }
}

const UNKNOWN_USER: &str = "Specified user does not exist.";

/// Decide the owner of a new record.
///
/// Without a `requested` owner the actor owns the record. Naming yourself is
/// always allowed. Naming anyone else requires a privileged actor and a user
/// that exists according to `user_exists`.
///
/// # Errors
///
/// Returns [Error::Validation] on `user` if the owner is not allowed, or the
/// error from `user_exists`.
pub fn resolve_new_owner(
    actor: &Actor,
    requested: Option<UserID>,
    user_exists: impl FnOnce(UserID) -> Result<bool, Error>,
) -> Result<UserID, Error> {
    match requested {
        None => Ok(actor.user_id),
        Some(owner) if owner == actor.user_id => Ok(owner),
        Some(owner) if actor.is_privileged() => require_existing(owner, user_exists),
        Some(owner) => {
            tracing::warn!(
                "User {} tried to create a record for user {owner}",
                actor.user_id
            );
            Err(owner_error("You cannot create a record for another user."))
        }
    }
}

/// Decide the owner of `current` after an update by `actor`.
///
/// Ordinary actors may not change the owner. Sending their own ID again is
/// accepted and leaves the record unchanged. Privileged actors may reassign
/// the record to any existing user.
///
/// # Errors
///
/// Returns [Error::Validation] on `user` if the change is not allowed, or the
/// error from `user_exists`.
pub fn resolve_updated_owner(
    actor: &Actor,
    current: &Transaction,
    requested: Option<UserID>,
    user_exists: impl FnOnce(UserID) -> Result<bool, Error>,
) -> Result<UserID, Error> {
    match requested {
        None => Ok(current.owner),
        Some(owner) if owner == current.owner => Ok(owner),
        Some(owner) if actor.is_privileged() => require_existing(owner, user_exists),
        Some(owner) => {
            tracing::warn!(
                "User {} tried to reassign record {} to user {owner}",
                actor.user_id,
                current.id
            );
            Err(owner_error("You cannot change the user of a record."))
        }
    }
}

/// Check that `actor` may delete `target`.
///
/// # Errors
///
/// Returns [Error::PermissionDenied] unless the actor owns the record or is
/// privileged.
pub fn authorize_delete(actor: &Actor, target: &Transaction) -> Result<(), Error> {
    if actor.is_privileged() || target.owner == actor.user_id {
        Ok(())
    } else {
        tracing::warn!(
            "User {} tried to delete record {} owned by user {}",
            actor.user_id,
            target.id,
            target.owner
        );
        Err(Error::PermissionDenied(
            "You do not have permission to perform this action.".to_owned(),
        ))
    }
}

fn require_existing(
    owner: UserID,
    user_exists: impl FnOnce(UserID) -> Result<bool, Error>,
) -> Result<UserID, Error> {
    if user_exists(owner)? {
        Ok(owner)
    } else {
        Err(owner_error(UNKNOWN_USER))
    }
}

fn owner_error(message: &str) -> Error {
    Error::Validation(ValidationErrors::single("user", message))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use time::{OffsetDateTime, macros::date};

    use crate::{
        Error,
        auth::{Actor, UserID},
        error::ValidationErrors,
        transaction::{
            TaxKind, Transaction, TransactionKind,
            policy::{
                VisibilityScope, authorize_delete, resolve_new_owner, resolve_updated_owner,
                visibility_scope,
            },
        },
    };

    const ALICE: UserID = UserID::new(1);
    const BOB: UserID = UserID::new(2);
    const ADMIN: UserID = UserID::new(3);
    const NOBODY: UserID = UserID::new(99);

    fn exists(user_id: UserID) -> Result<bool, Error> {
        Ok(user_id != NOBODY)
    }

    fn never_called(_: UserID) -> Result<bool, Error> {
        panic!("user lookup should not be needed")
    }

    fn record_owned_by(owner: UserID) -> Transaction {
        let now = OffsetDateTime::now_utc();

        Transaction {
            id: 7,
            owner,
            title: "Rent".to_owned(),
            description: None,
            amount: dec!(100.00),
            kind: TransactionKind::Debit,
            tax: dec!(0.00),
            tax_kind: TaxKind::Flat,
            date: date!(2024 - 01 - 01),
            calculated_tax: dec!(0.00),
            total: dec!(100.00),
            created_at: now,
            updated_at: now,
        }
    }

    fn user_error(message: &str) -> Error {
        Error::Validation(ValidationErrors::single("user", message))
    }

    #[test]
    fn privileged_actors_see_everything() {
        assert_eq!(
            visibility_scope(&Actor::privileged(ADMIN)),
            VisibilityScope::All
        );
        assert_eq!(VisibilityScope::All.owner_filter(), None);
    }

    #[test]
    fn ordinary_actors_see_their_own_records() {
        let scope = visibility_scope(&Actor::ordinary(ALICE));

        assert_eq!(scope, VisibilityScope::OwnedBy(ALICE));
        assert_eq!(scope.owner_filter(), Some(ALICE));
    }

    #[test]
    fn new_records_default_to_actor() {
        assert_eq!(
            resolve_new_owner(&Actor::ordinary(ALICE), None, never_called),
            Ok(ALICE)
        );
        assert_eq!(
            resolve_new_owner(&Actor::ordinary(ALICE), Some(ALICE), never_called),
            Ok(ALICE)
        );
    }

    #[test]
    fn ordinary_actor_cannot_create_for_others() {
        assert_eq!(
            resolve_new_owner(&Actor::ordinary(ALICE), Some(BOB), never_called),
            Err(user_error("You cannot create a record for another user."))
        );
    }

    #[test]
    fn privileged_actor_creates_for_existing_users_only() {
        let admin = Actor::privileged(ADMIN);

        assert_eq!(resolve_new_owner(&admin, Some(BOB), exists), Ok(BOB));
        assert_eq!(
            resolve_new_owner(&admin, Some(NOBODY), exists),
            Err(user_error("Specified user does not exist."))
        );
    }

    #[test]
    fn owner_lookup_errors_propagate() {
        let result = resolve_new_owner(&Actor::privileged(ADMIN), Some(BOB), |_| {
            Err(Error::DatabaseLockError)
        });

        assert_eq!(result, Err(Error::DatabaseLockError));
    }

    #[test]
    fn ordinary_actor_cannot_reassign_record() {
        let record = record_owned_by(ALICE);

        assert_eq!(
            resolve_updated_owner(&Actor::ordinary(ALICE), &record, Some(BOB), never_called),
            Err(user_error("You cannot change the user of a record."))
        );
    }

    #[test]
    fn ordinary_actor_may_echo_own_id() {
        let record = record_owned_by(ALICE);
        let actor = Actor::ordinary(ALICE);

        assert_eq!(
            resolve_updated_owner(&actor, &record, Some(ALICE), never_called),
            Ok(ALICE)
        );
        assert_eq!(
            resolve_updated_owner(&actor, &record, None, never_called),
            Ok(ALICE)
        );
    }

    #[test]
    fn privileged_actor_reassigns_to_existing_users_only() {
        let record = record_owned_by(ALICE);
        let admin = Actor::privileged(ADMIN);

        assert_eq!(
            resolve_updated_owner(&admin, &record, Some(BOB), exists),
            Ok(BOB)
        );
        assert_eq!(
            resolve_updated_owner(&admin, &record, Some(NOBODY), exists),
            Err(user_error("Specified user does not exist."))
        );
        assert_eq!(
            resolve_updated_owner(&admin, &record, None, never_called),
            Ok(ALICE)
        );
    }

    #[test]
    fn delete_requires_ownership_or_privilege() {
        let record = record_owned_by(ALICE);

        assert_eq!(authorize_delete(&Actor::ordinary(ALICE), &record), Ok(()));
        assert_eq!(authorize_delete(&Actor::privileged(ADMIN), &record), Ok(()));
        assert!(matches!(
            authorize_delete(&Actor::ordinary(BOB), &record),
            Err(Error::PermissionDenied(_))
        ));
    }
}
