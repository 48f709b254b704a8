use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use gameshelf_library::double_option;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::errors::ServerError;

lazy_static! {
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{3,30}$").unwrap();
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_REGEX.is_match(username) {
        Ok(())
    } else {
        Err(ValidationError::new("username"))
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSchema {
    /// 3 to 30 letters, digits, underscores or dashes
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSchema {
    /// Email or username
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSchema {
    /// `null` removes the avatar
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub avatar: Option<Option<String>>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub is_public: Option<bool>,
}

/// Query parameters of the explore listing. Unparseable numbers fall back to the defaults.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ExploreParams {
    /// A RAWG ordering, defaults to -relevance
    pub ordering: Option<String>,
    /// Defaults to 20, at most 50
    pub page_size: Option<String>,
    /// Defaults to 1
    pub page: Option<String>,
}

/// A JSON body whose parse failures are reported like any other [ServerError]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|e| ServerError::Validation {
                message: "Request body is invalid".to_string(),
                errors: vec![e.body_text()],
            })?;

        Ok(Self(extracted_json.0))
    }
}

/// A JSON body that also passes its [Validate] rules
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;
        value.validate()?;

        Ok(Self(value))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterSchema {
        RegisterSchema {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: password.to_string(),
        }
    }

    #[test]
    fn test_register_schema() {
        assert!(register("ana_99", "ana@example.com", "hunter22")
            .validate()
            .is_ok());

        assert!(register("an", "ana@example.com", "hunter22")
            .validate()
            .is_err());
        assert!(register("ana bob", "ana@example.com", "hunter22")
            .validate()
            .is_err());
        assert!(register(&"a".repeat(31), "ana@example.com", "hunter22")
            .validate()
            .is_err());
        assert!(register("ana", "not-an-email", "hunter22")
            .validate()
            .is_err());
        assert!(register("ana", "ana@example.com", "short").validate().is_err());
    }

    #[test]
    fn test_profile_avatar_can_be_cleared() {
        let cleared: ProfileSchema = serde_json::from_str(r#"{ "avatar": null }"#).unwrap();
        let untouched: ProfileSchema = serde_json::from_str(r#"{ "bio": "hi" }"#).unwrap();

        assert_eq!(cleared.avatar, Some(None));
        assert_eq!(untouched.avatar, None);
    }
}
