/// Who is calling, and what they may touch
///
/// - [`password`]: Argon2id hashes for stored credentials
/// - [`jwt`]: HS256 bearer tokens issued at register/login
/// - [`middleware`]: bearer parsing into [`middleware::AuthContext`] and the
///   [`middleware::Principal`] role split
/// - [`authorization`]: membership resolution and the per-resource gate

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
