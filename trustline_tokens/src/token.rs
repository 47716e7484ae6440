use aliri_clock::{Clock, DurationSecs, System, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{TokenMaterial, TokenMaterialRef};

/// A security token granted by a token issuer
///
/// Tokens are immutable once issued. Every token carries the absolute time
/// at which it stops being valid.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityToken {
    material: Box<TokenMaterialRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    valid_from: UnixTime,
    valid_to: UnixTime,
}

/// A token's validity status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token's validity period has not yet begun
    NotYetValid,
    /// The token is valid
    Valid,
    /// The token is no longer valid
    Expired,
}

impl SecurityToken {
    /// Constructs a token valid over the interval `valid_from..valid_to`
    pub fn new(
        material: impl Into<TokenMaterial>,
        valid_from: UnixTime,
        valid_to: UnixTime,
    ) -> Self {
        Self {
            material: material.into().into_boxed_ref(),
            token_type: None,
            valid_from,
            valid_to,
        }
    }

    /// Constructs a token valid from now for the given duration
    pub fn valid_for(material: impl Into<TokenMaterial>, lifetime: DurationSecs) -> Self {
        Self::valid_for_with_clock(material, lifetime, &System)
    }

    /// Constructs a token valid from the current time, as reported by the
    /// provided clock, for the given duration
    pub fn valid_for_with_clock<C: Clock>(
        material: impl Into<TokenMaterial>,
        lifetime: DurationSecs,
        clock: &C,
    ) -> Self {
        let now = clock.now();
        Self::new(material, now, now + lifetime)
    }

    /// Sets the token type URI reported by the issuer
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// Gets the raw token material
    #[inline]
    pub fn material(&self) -> &TokenMaterialRef {
        &self.material
    }

    /// Gets the token type, if the issuer reported one
    #[inline]
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    /// Gets the time from which the token is valid
    #[inline]
    pub fn valid_from(&self) -> UnixTime {
        self.valid_from
    }

    /// Gets the time at which the token expires
    #[inline]
    pub fn valid_to(&self) -> UnixTime {
        self.valid_to
    }

    /// Gets the interval during which the token is valid
    #[inline]
    pub fn valid_interval(&self) -> std::ops::Range<UnixTime> {
        self.valid_from..self.valid_to
    }

    /// Gets the token's current status
    #[inline]
    pub fn status(&self) -> TokenStatus {
        self.status_with_clock(&System)
    }

    /// Gets the token's status based on the current time as reported by the
    /// provided clock
    #[inline]
    pub fn status_with_clock<C: Clock>(&self, clock: &C) -> TokenStatus {
        self.status_at(clock.now())
    }

    /// Gets the token's status as of the provided time
    #[inline]
    pub fn status_at(&self, time: UnixTime) -> TokenStatus {
        if time >= self.valid_to {
            TokenStatus::Expired
        } else if time < self.valid_from {
            TokenStatus::NotYetValid
        } else {
            TokenStatus::Valid
        }
    }

    /// Whether the token has expired as of the provided time
    #[inline]
    pub fn is_expired_at(&self, time: UnixTime) -> bool {
        time >= self.valid_to
    }

    /// Gets a duration for how much longer the token will be valid
    #[inline]
    pub fn until_expired(&self) -> DurationSecs {
        self.until_expired_with_clock(&System)
    }

    /// Gets a duration for how much longer the token will be valid based on
    /// the current time as reported by the provided clock
    #[inline]
    pub fn until_expired_with_clock<C: Clock>(&self, clock: &C) -> DurationSecs {
        self.until_expired_at(clock.now())
    }

    /// Gets a duration for how much longer the token would be valid as of the
    /// provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        if time < self.valid_to {
            self.valid_to - time
        } else {
            DurationSecs(0)
        }
    }
}
