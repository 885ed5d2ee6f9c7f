//! Account operations, independent of HTTP.
//!
//! Each operation validates its input before touching the store and never
//! writes a partial update. Cookie handling stays in the handlers.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, ChangePasswordRequest, LoginRequest, PublicUser, RegisterRequest, UpdateProfileRequest},
        jwt::JwtKeys,
        password::{hash_password, is_long_enough, verify_against_dummy, verify_password},
        repo::UserStore,
        repo_types::NewUser,
    },
    error::ApiError,
};

const PASSWORD_TOO_SHORT: &str = "Password must be up to 6 characters";
const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Surrounding whitespace is dropped; case is kept exactly as sent.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

/// Trimmed value, or `None` when absent or blank.
fn text(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Passwords are taken verbatim; only emptiness counts as missing.
fn secret(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

pub async fn register(
    users: &dyn UserStore,
    keys: &JwtKeys,
    req: RegisterRequest,
) -> Result<AuthResponse, ApiError> {
    let (Some(name), Some(email), Some(password)) =
        (text(&req.name), text(&req.email), secret(&req.password))
    else {
        return Err(ApiError::validation("Please fill in all required fields"));
    };
    let email = normalize_email(email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::validation("Please enter a valid email"));
    }
    if !is_long_enough(password) {
        return Err(ApiError::validation(PASSWORD_TOO_SHORT));
    }

    // Friendly early answer; the store's unique constraint is the real guard.
    if users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::conflict("Email has already been registered"));
    }

    let user = users
        .create(NewUser {
            name: name.to_string(),
            email,
            password_hash: hash_password(password)?,
        })
        .await?;
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

pub async fn login(
    users: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<AuthResponse, ApiError> {
    let (Some(email), Some(password)) = (text(&req.email), secret(&req.password)) else {
        return Err(ApiError::validation("Please add email and password"));
    };
    let email = normalize_email(email);

    let Some(user) = users.find_by_email(&email).await? else {
        verify_against_dummy(password);
        warn!(email = %email, "login unknown email");
        return Err(ApiError::authentication(INVALID_CREDENTIALS));
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::authentication(INVALID_CREDENTIALS));
    }

    let token = keys.sign(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

pub async fn get_profile(users: &dyn UserStore, caller_id: Uuid) -> Result<PublicUser, ApiError> {
    users
        .find_by_id(caller_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// `true` only for a token that verifies; absent or bad tokens are `false`.
pub fn session_status(keys: &JwtKeys, token: Option<&str>) -> bool {
    match token {
        None => false,
        Some(token) => match keys.verify(token) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "session status: token rejected");
                false
            }
        },
    }
}

pub async fn update_profile(
    users: &dyn UserStore,
    caller_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<PublicUser, ApiError> {
    let mut user = users
        .find_by_id(caller_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(name) = text(&req.name) {
        user.name = name.to_string();
    }
    if let Some(photo) = text(&req.photo) {
        user.photo = Some(photo.to_string());
    }
    if let Some(phone) = text(&req.phone) {
        user.phone = Some(phone.to_string());
    }
    if let Some(bio) = text(&req.bio) {
        user.bio = Some(bio.to_string());
    }

    let saved = users
        .save(&user)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!(user_id = %saved.id, "profile updated");
    Ok(saved.into())
}

pub async fn change_password(
    users: &dyn UserStore,
    caller_id: Uuid,
    req: ChangePasswordRequest,
) -> Result<(), ApiError> {
    let mut user = users
        .find_by_id(caller_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found, please signup"))?;

    let (Some(old_password), Some(new_password)) =
        (secret(&req.old_password), secret(&req.password))
    else {
        return Err(ApiError::validation("Please add old and new password"));
    };
    if !is_long_enough(new_password) {
        return Err(ApiError::validation(PASSWORD_TOO_SHORT));
    }

    if !verify_password(old_password, &user.password_hash)? {
        warn!(user_id = %user.id, "change password: old password mismatch");
        return Err(ApiError::authentication("Old password is incorrect"));
    }

    user.password_hash = hash_password(new_password)?;
    users
        .save(&user)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found, please signup"))?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo::MemoryUserStore, config::JwtConfig};

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_seconds: 86_400,
        })
    }

    fn register_req(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ann@x.com"));
        assert!(!is_valid_email("ann"));
        assert!(!is_valid_email("ann@x"));
        assert!(!is_valid_email("a nn@x.com"));
        assert_eq!(normalize_email("  Ann@X.com "), "Ann@X.com");
    }

    #[tokio::test]
    async fn register_returns_public_fields_and_token() {
        let store = MemoryUserStore::default();
        let keys = keys();
        let res = register(&store, &keys, register_req("Ann", "ann@x.com", "secret1"))
            .await
            .expect("register");
        assert!(!res.user.id.is_nil());
        assert_eq!(res.user.email, "ann@x.com");
        assert_eq!(keys.verify(&res.token).unwrap().sub, res.user.id);

        let stored = store.find_by_id(res.user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");
    }

    #[tokio::test]
    async fn register_requires_every_field() {
        let store = MemoryUserStore::default();
        let mut req = register_req("Ann", "ann@x.com", "secret1");
        req.name = Some("   ".into());
        let err = register(&store, &keys(), req).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Please fill in all required fields"));

        let err = register(&store, &keys(), RegisterRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn register_password_length_boundary() {
        let store = MemoryUserStore::default();
        let err = register(&store, &keys(), register_req("A", "a@x.com", "12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == PASSWORD_TOO_SHORT));
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());

        register(&store, &keys(), register_req("A", "a@x.com", "123456"))
            .await
            .expect("six characters is enough");
    }

    #[tokio::test]
    async fn register_keeps_email_case() {
        let store = MemoryUserStore::default();
        let keys = keys();
        let res = register(&store, &keys, register_req("Ann", "Ann@X.com", "secret1"))
            .await
            .expect("register");
        assert_eq!(res.user.email, "Ann@X.com");

        let stored = store.find_by_id(res.user.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "Ann@X.com");
        login(&store, &keys, login_req("Ann@X.com", "secret1"))
            .await
            .expect("login with the address as registered");
    }

    #[tokio::test]
    async fn register_rejects_malformed_email() {
        let store = MemoryUserStore::default();
        let err = register(&store, &keys(), register_req("A", "not-an-email", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn register_duplicate_email_conflicts() {
        let store = MemoryUserStore::default();
        let first = register(&store, &keys(), register_req("Ann", "ann@x.com", "secret1"))
            .await
            .unwrap();

        let err = register(&store, &keys(), register_req("Other", " ann@x.com ", "secret9"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let stored = store.find_by_id(first.user.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ann");
        assert!(verify_password("secret1", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let store = MemoryUserStore::default();
        register(&store, &keys(), register_req("Ann", "ann@x.com", "secret1"))
            .await
            .unwrap();

        let wrong_password = login(&store, &keys(), login_req("ann@x.com", "nope123"))
            .await
            .unwrap_err();
        let unknown_email = login(&store, &keys(), login_req("bob@x.com", "secret1"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password.status_code(), unknown_email.status_code());
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, ApiError::Authentication(_)));
        assert!(matches!(unknown_email, ApiError::Authentication(_)));
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let store = MemoryUserStore::default();
        let err = login(
            &store,
            &keys(),
            LoginRequest {
                email: Some("ann@x.com".into()),
                password: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Please add email and password"));
    }

    #[test]
    fn session_status_cases() {
        let keys = keys();
        assert!(!session_status(&keys, None));

        let token = keys.sign(Uuid::new_v4()).unwrap();
        assert!(session_status(&keys, Some(&token)));

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(!session_status(&keys, Some(&tampered)));
        assert!(!session_status(&keys, Some("garbage")));
    }

    #[tokio::test]
    async fn get_profile_unknown_caller() {
        let store = MemoryUserStore::default();
        let err = get_profile(&store, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn bio_only_updates_leave_other_fields() {
        let store = MemoryUserStore::default();
        let ann = register(&store, &keys(), register_req("Ann", "ann@x.com", "secret1"))
            .await
            .unwrap()
            .user;

        let first = update_profile(
            &store,
            ann.id,
            UpdateProfileRequest {
                phone: Some("+1 555".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(first.phone.as_deref(), Some("+1 555"));

        for bio in ["first bio", "second bio"] {
            let updated = update_profile(
                &store,
                ann.id,
                UpdateProfileRequest {
                    bio: Some(bio.into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
            assert_eq!(updated.bio.as_deref(), Some(bio));
            assert_eq!(updated.name, "Ann");
            assert_eq!(updated.email, "ann@x.com");
            assert_eq!(updated.phone.as_deref(), Some("+1 555"));
            assert!(updated.photo.is_none());
        }
    }

    #[tokio::test]
    async fn empty_update_values_keep_existing() {
        let store = MemoryUserStore::default();
        let ann = register(&store, &keys(), register_req("Ann", "ann@x.com", "secret1"))
            .await
            .unwrap()
            .user;
        let updated = update_profile(
            &store,
            ann.id,
            UpdateProfileRequest {
                name: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Ann");
    }

    #[tokio::test]
    async fn update_profile_unknown_caller_is_not_found() {
        let store = MemoryUserStore::default();
        let err = update_profile(&store, Uuid::new_v4(), UpdateProfileRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn change_password_then_login() {
        let store = MemoryUserStore::default();
        let keys = keys();
        let ann = register(&store, &keys, register_req("Ann", "ann@x.com", "secret1"))
            .await
            .unwrap()
            .user;

        change_password(
            &store,
            ann.id,
            ChangePasswordRequest {
                old_password: Some("secret1".into()),
                password: Some("secret2".into()),
            },
        )
        .await
        .expect("change password");

        assert!(login(&store, &keys, login_req("ann@x.com", "secret1"))
            .await
            .is_err());
        login(&store, &keys, login_req("ann@x.com", "secret2"))
            .await
            .expect("new password works");
    }

    #[tokio::test]
    async fn change_password_rejections() {
        let store = MemoryUserStore::default();
        let ann = register(&store, &keys(), register_req("Ann", "ann@x.com", "secret1"))
            .await
            .unwrap()
            .user;

        let err = change_password(
            &store,
            Uuid::new_v4(),
            ChangePasswordRequest {
                old_password: Some("secret1".into()),
                password: Some("secret2".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = change_password(
            &store,
            ann.id,
            ChangePasswordRequest {
                old_password: Some("secret1".into()),
                password: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Please add old and new password"));

        let err = change_password(
            &store,
            ann.id,
            ChangePasswordRequest {
                old_password: Some("wrong-one".into()),
                password: Some("secret2".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Authentication(ref m) if m == "Old password is incorrect"));

        let stored = store.find_by_id(ann.id).await.unwrap().unwrap();
        assert!(verify_password("secret1", &stored.password_hash).unwrap());
    }
}
