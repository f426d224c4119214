/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id credential hashing
/// - [`jwt`]: Token issuer for the access/refresh pair
/// - [`session`]: Session guard that authenticates calls and rotates the
///   access token
/// - [`ownership`]: Resolves how an actor relates to a task, comment or file
/// - [`authorization`]: Decision point turning relations into verdicts
///
/// # Flow
///
/// ```text
/// carrier tokens ─▶ SessionGuard ─▶ Identity ─▶ AccessControl ─▶ Verdict
///                                                 └─ OwnershipResolver
/// ```

pub mod authorization;
pub mod jwt;
pub mod ownership;
pub mod password;
pub mod session;
