//! Client credentials attached to channel factories

use trustline_tokens::Password;

/// A user name and password
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserNameCredential {
    /// The user name
    pub user_name: String,
    /// The password
    pub password: Password,
}

/// Credentials presented directly by the client
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DefaultCredentials {
    /// User name credentials, if any
    pub user_name: Option<UserNameCredential>,
}

impl DefaultCredentials {
    /// Credentials presenting a user name and password
    pub fn with_user_name(user_name: impl Into<String>, password: impl Into<Password>) -> Self {
        Self {
            user_name: Some(UserNameCredential {
                user_name: user_name.into(),
                password: password.into(),
            }),
        }
    }
}

/// Credentials which present a token issued by a token service
///
/// Wraps the default credentials that were in place when federation was
/// configured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FederatedCredentials {
    base: DefaultCredentials,
}

impl FederatedCredentials {
    /// Federated credentials layered over `base`
    pub fn new(base: DefaultCredentials) -> Self {
        Self { base }
    }

    /// The credentials that were replaced by federation
    pub fn base(&self) -> &DefaultCredentials {
        &self.base
    }
}

/// The credentials a channel factory attaches to the channels it creates
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCredentials {
    /// Credentials presented directly by the client
    Default(DefaultCredentials),
    /// Credentials which present an issued token
    Federated(FederatedCredentials),
}

impl Default for ClientCredentials {
    fn default() -> Self {
        Self::Default(DefaultCredentials::default())
    }
}

impl ClientCredentials {
    /// Whether these are federated credentials
    pub fn is_federated(&self) -> bool {
        matches!(self, Self::Federated(_))
    }

    /// The directly presented credentials
    pub fn defaults(&self) -> &DefaultCredentials {
        match self {
            Self::Default(d) => d,
            Self::Federated(f) => f.base(),
        }
    }
}

impl From<DefaultCredentials> for ClientCredentials {
    fn from(c: DefaultCredentials) -> Self {
        Self::Default(c)
    }
}

impl From<FederatedCredentials> for ClientCredentials {
    fn from(c: FederatedCredentials) -> Self {
        Self::Federated(c)
    }
}
