//! OAuth login against a single authorized identity
//!
//! The flow:
//!
//! 1. `GET /login` stores a random state in the session and links to
//!    [`OAuthProvider::authorization_url`].
//! 2. The provider redirects to `/oauth-callback?code=..&state=..`.
//! 3. The callback checks the state, then [`resolve_identity`] exchanges the
//!    code and fetches the identity, each call under a deadline.
//! 4. [`AuthorizedUser::match_or_claim`] decides: the authorized identity (or
//!    the first one ever seen) is signed in, anyone else gets the requesting
//!    address banned.

pub mod authorized;
pub mod github;
pub mod provider;
pub mod state;

pub use authorized::{AuthorizedUser, AuthorizedUserRecord, IdentityMatch};
pub use github::GitHubProvider;
pub use provider::{resolve_identity, OAuthProvider, OAuthUserInfo};
pub use state::{generate_state, state_matches};
