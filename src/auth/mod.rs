//! Identity for the ledger: users, passwords, the auth cookie, and the
//! middleware that turns a request's cookie into an explicit [Actor].

mod actor;
mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod register_user;
mod token;
mod user;

pub use actor::{Actor, Privilege};
pub use cookie::DEFAULT_COOKIE_DURATION;
pub(crate) use cookie::{invalidate_auth_cookie, set_auth_cookie};
pub use log_in::post_log_in;
pub use log_out::post_log_out;
pub use middleware::{AuthState, auth_guard};
pub use password::{PasswordHash, ValidatedPassword};
pub use register_user::register_user;
pub use user::{
    NewUser, User, UserID, create_user, create_user_table, get_user_by_id, get_user_by_username,
    user_exists,
};

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
#[cfg(test)]
pub(crate) use user::count_users;
