use std::{
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use aliri_clock::DurationSecs;
use async_trait::async_trait;
use trustline_tokens::SecurityToken;
use url::Url;

use crate::{
    binding::{Binding, WsFederationHttpBinding, WsHttpBinding},
    channel::{Channel, ChannelLink, ChannelRequest, Contract, Transport},
    config::ClientEndpoint,
    error::{BoxError, Error},
    factory::ChannelFactory,
    issuer::SecurityTokenProvider,
};

pub const SERVICE_ADDRESS: &str = "http://host/svc";

/// Opens links which answer every request with its own body
#[derive(Debug)]
pub struct LoopbackTransport;

#[derive(Debug)]
struct LoopbackLink;

#[async_trait]
impl ChannelLink for LoopbackLink {
    async fn invoke(&self, _action: &str, body: Vec<u8>) -> Result<Vec<u8>, BoxError> {
        Ok(body)
    }
}

impl Transport for LoopbackTransport {
    fn open(&self, _: ChannelRequest<'_>) -> Result<Box<dyn ChannelLink>, BoxError> {
        Ok(Box::new(LoopbackLink))
    }
}

pub struct Echo;

#[derive(Debug)]
pub struct EchoClient {
    channel: Channel,
}

impl EchoClient {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub async fn echo(&self, message: &str) -> color_eyre::Result<String> {
        let reply = self
            .channel
            .invoke("Echo", message.as_bytes().to_vec())
            .await
            .map_err(color_eyre::eyre::Report::msg)?;
        Ok(String::from_utf8(reply)?)
    }
}

impl Contract for Echo {
    const NAME: &'static str = "tests.Echo";
    type Client = EchoClient;

    fn client(channel: Channel) -> Self::Client {
        EchoClient { channel }
    }
}

/// A contract with no configured endpoint
pub struct Echo2;

impl Contract for Echo2 {
    const NAME: &'static str = "tests.Unconfigured";
    type Client = EchoClient;

    fn client(channel: Channel) -> Self::Client {
        EchoClient { channel }
    }
}

pub fn endpoint<C: Contract>(name: &str, binding: Binding) -> ClientEndpoint {
    ClientEndpoint {
        name: name.to_owned(),
        contract: C::NAME.to_owned(),
        address: Url::parse(SERVICE_ADDRESS).expect("valid url"),
        binding,
    }
}

pub fn factory<C: Contract>(binding: Binding) -> ChannelFactory<C> {
    ChannelFactory::new(endpoint::<C>("test", binding), Arc::new(LoopbackTransport))
}

pub fn federation_binding() -> WsFederationHttpBinding {
    WsFederationHttpBinding {
        issuer_address: Some(Url::parse("http://host/sts").expect("valid url")),
        issuer_binding: Some(Box::new(WsHttpBinding::default().into())),
        token_type: None,
    }
}

/// Issues numbered tokens and records each request
#[derive(Debug, Default)]
pub struct CountingIssuer {
    calls: AtomicUsize,
    act_as: Mutex<Vec<Option<String>>>,
    fail: bool,
}

impl CountingIssuer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn act_as(&self) -> Vec<Option<String>> {
        self.act_as.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecurityTokenProvider for CountingIssuer {
    async fn issue_token(
        &self,
        _binding: &WsFederationHttpBinding,
        _service_address: &Url,
        act_as: Option<&SecurityToken>,
    ) -> Result<SecurityToken, Error> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.act_as
            .lock()
            .unwrap()
            .push(act_as.map(|t| t.material().as_str().to_owned()));

        tokio::task::yield_now().await;

        if self.fail {
            return Err(Error::transport(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "sts unavailable",
            )));
        }

        Ok(SecurityToken::valid_for(
            format!("issued-{n}"),
            DurationSecs(3600),
        ))
    }
}
