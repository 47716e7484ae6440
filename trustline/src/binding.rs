//! Transport bindings

use aliri_clock::DurationSecs;
use serde::{Deserialize, Serialize};
use url::Url;

/// A binding type with a well-known configuration name
pub trait BindingType {
    /// The name used for this binding in client configuration
    const NAME: &'static str;
}

/// A plain HTTP binding without message security
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicHttpBinding {}

/// An HTTP binding with WS-* message security
///
/// Token services are reached through this binding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsHttpBinding {
    /// How long a request may take before it is abandoned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_timeout: Option<DurationSecs>,
}

/// An HTTP binding which requires a token issued by a token service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsFederationHttpBinding {
    /// The address of the token service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_address: Option<Url>,
    /// The binding used to reach the token service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_binding: Option<Box<Binding>>,
    /// The type of token to request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// A binary TCP binding
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetTcpBinding {}

impl BindingType for BasicHttpBinding {
    const NAME: &'static str = "basicHttpBinding";
}

impl BindingType for WsHttpBinding {
    const NAME: &'static str = "ws2007HttpBinding";
}

impl BindingType for WsFederationHttpBinding {
    const NAME: &'static str = "ws2007FederationHttpBinding";
}

impl BindingType for NetTcpBinding {
    const NAME: &'static str = "netTcpBinding";
}

/// A configured binding
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Binding {
    /// See [`BasicHttpBinding`]
    #[serde(rename = "basicHttpBinding")]
    BasicHttp(BasicHttpBinding),
    /// See [`WsHttpBinding`]
    #[serde(rename = "ws2007HttpBinding")]
    WsHttp(WsHttpBinding),
    /// See [`WsFederationHttpBinding`]
    #[serde(rename = "ws2007FederationHttpBinding")]
    WsFederationHttp(WsFederationHttpBinding),
    /// See [`NetTcpBinding`]
    #[serde(rename = "netTcpBinding")]
    NetTcp(NetTcpBinding),
}

impl Binding {
    /// The configuration name of the binding
    pub fn name(&self) -> &'static str {
        match self {
            Self::BasicHttp(_) => BasicHttpBinding::NAME,
            Self::WsHttp(_) => WsHttpBinding::NAME,
            Self::WsFederationHttp(_) => WsFederationHttpBinding::NAME,
            Self::NetTcp(_) => NetTcpBinding::NAME,
        }
    }

    /// Whether the binding's name matches `name`, ignoring ASCII case
    pub fn matches_name(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
    }

    /// The federation settings, if this is a federation binding
    pub fn as_federation(&self) -> Option<&WsFederationHttpBinding> {
        match self {
            Self::WsFederationHttp(b) => Some(b),
            _ => None,
        }
    }
}

impl From<BasicHttpBinding> for Binding {
    fn from(b: BasicHttpBinding) -> Self {
        Self::BasicHttp(b)
    }
}

impl From<WsHttpBinding> for Binding {
    fn from(b: WsHttpBinding) -> Self {
        Self::WsHttp(b)
    }
}

impl From<WsFederationHttpBinding> for Binding {
    fn from(b: WsFederationHttpBinding) -> Self {
        Self::WsFederationHttp(b)
    }
}

impl From<NetTcpBinding> for Binding {
    fn from(b: NetTcpBinding) -> Self {
        Self::NetTcp(b)
    }
}
