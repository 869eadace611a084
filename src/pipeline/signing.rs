// src/pipeline/signing.rs

//! Code-signing credentials for the packaging tool.
//!
//! The packaging tool reads two environment variables: a certificate
//! reference ([`CSC_LINK`]) and its passphrase ([`CSC_KEY_PASSWORD`]).
//! Credentials are only ever injected into the environment of the signed
//! stages' commands; they are never written to disk or into the build log.

use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{PacklineError, Result};

pub const CSC_LINK: &str = "CSC_LINK";
pub const CSC_KEY_PASSWORD: &str = "CSC_KEY_PASSWORD";

/// Signing intent plus the optional credential pair.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SigningConfig {
    pub enabled: bool,
    pub certificate: Option<String>,
    pub passphrase: Option<String>,
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("enabled", &self.enabled)
            .field("certificate", &self.certificate)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// What the signed stages will actually do.
#[derive(Clone, PartialEq, Eq)]
pub enum SigningMode {
    Disabled,
    /// Both values empty: the tool picks the certificate from the platform
    /// credential store; nothing is injected.
    CredentialStore,
    /// Both values present: injected as `CSC_LINK` / `CSC_KEY_PASSWORD`.
    CredentialFile { link: String, passphrase: String },
}

impl fmt::Debug for SigningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningMode::Disabled => f.write_str("Disabled"),
            SigningMode::CredentialStore => f.write_str("CredentialStore"),
            SigningMode::CredentialFile { link, .. } => f
                .debug_struct("CredentialFile")
                .field("link", link)
                .finish_non_exhaustive(),
        }
    }
}

impl SigningConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(certificate: Option<String>, passphrase: Option<String>) -> Self {
        Self {
            enabled: true,
            certificate,
            passphrase,
        }
    }

    /// Decide the signing mode.
    ///
    /// Exactly one of the pair being set is rejected with
    /// [`PacklineError::InvalidSigning`], so a half-configured signer never
    /// reaches the packaging tool.
    pub fn resolve(&self) -> Result<SigningMode> {
        if !self.enabled {
            return Ok(SigningMode::Disabled);
        }

        let link = self
            .certificate
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let passphrase = self.passphrase.as_deref().filter(|s| !s.is_empty());

        match (link, passphrase) {
            (None, None) => Ok(SigningMode::CredentialStore),
            (Some(link), Some(passphrase)) => Ok(SigningMode::CredentialFile {
                link: link.to_string(),
                passphrase: passphrase.to_string(),
            }),
            (Some(_), None) => Err(PacklineError::InvalidSigning(format!(
                "{CSC_LINK} is set but {CSC_KEY_PASSWORD} is empty"
            ))),
            (None, Some(_)) => Err(PacklineError::InvalidSigning(format!(
                "{CSC_KEY_PASSWORD} is set but {CSC_LINK} is empty"
            ))),
        }
    }
}

impl SigningMode {
    /// Environment overrides for signed stages.
    pub fn env(&self) -> BTreeMap<String, String> {
        match self {
            SigningMode::CredentialFile { link, passphrase } => BTreeMap::from([
                (CSC_LINK.to_string(), link.clone()),
                (CSC_KEY_PASSWORD.to_string(), passphrase.clone()),
            ]),
            SigningMode::Disabled | SigningMode::CredentialStore => BTreeMap::new(),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SigningMode::Disabled => "code signing disabled",
            SigningMode::CredentialStore => "code signing enabled (platform certificate store)",
            SigningMode::CredentialFile { .. } => "code signing enabled (certificate file)",
        }
    }
}
